use chrono::prelude::*;
use serde::{Deserialize, Serialize};

/// User role enumeration for role-based access control
///
/// Role names are normalized into this closed enum once, when a record is
/// read or a form is submitted. Stored data written by older builds used
/// both `ADMIN` and `Admin`, so the aliases accept either casing.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserRole {
    #[serde(rename = "ADMIN", alias = "Admin", alias = "admin")]
    Admin,
    #[serde(rename = "FACULTY", alias = "Faculty", alias = "faculty")]
    Faculty,
    #[serde(rename = "STUDENT", alias = "Student", alias = "student")]
    Student,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Faculty => "FACULTY",
            UserRole::Student => "STUDENT",
        }
    }

    /// Case-insensitive parse of a role name; `None` for custom role names
    pub fn parse(name: &str) -> Option<UserRole> {
        match name.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(UserRole::Admin),
            "FACULTY" => Some(UserRole::Faculty),
            "STUDENT" => Some(UserRole::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
    Pending,
}

impl UserStatus {
    pub fn to_str(&self) -> &str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Pending => "pending",
        }
    }
}

/// Per-user workspace preferences
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact_sidebar: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_alerts: Option<bool>,
}

/// A portal account (stored under `registered_users`)
///
/// - `password`: argon2 PHC string, never plain text
/// - `student_number`: student number for students, faculty id for faculty,
///   absent for admins
/// - `department`: program for students, department for faculty
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_number: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp::deserialize"
    )]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<UserPreferences>,
}

/// Permission set attached to a role name (stored under `role_configs`)
///
/// `is_system` marks the three built-in roles, which cannot be renamed or
/// deleted.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfig {
    #[serde(alias = "role")]
    pub name: String,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub is_system: bool,
}

/// Review lifecycle shared by content, subjects, topics and assessments
///
/// `RemovalPending` only ever appears on topics.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStatus {
    Draft,
    Pending,
    RevisionRequested,
    Approved,
    RemovalPending,
}

impl ContentStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ContentStatus::Draft => "DRAFT",
            ContentStatus::Pending => "PENDING",
            ContentStatus::RevisionRequested => "REVISION_REQUESTED",
            ContentStatus::Approved => "APPROVED",
            ContentStatus::RemovalPending => "REMOVAL_PENDING",
        }
    }
}

/// Reviewer feedback attached on approve or revision request
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionNote {
    pub id: String,
    pub admin_id: String,
    pub admin_name: String,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentFormat {
    #[default]
    Text,
    Pdf,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentKind {
    #[default]
    Module,
    Reviewer,
    Guide,
}

/// Review material (stored under `system_content`)
///
/// `subject` holds whatever the editor wrote (historically a name or an
/// id); `topic_id` points into the subject's topic tree.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub subject: String,
    #[serde(default)]
    pub topic_id: String,
    #[serde(rename = "type", default)]
    pub kind: ContentKind,
    #[serde(default)]
    pub format: ContentFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub status: ContentStatus,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub submission_count: u32,
    #[serde(default)]
    pub revision_count: u32,
    pub date_created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub revision_notes: Vec<RevisionNote>,
}

/// Node of a subject's curriculum tree
///
/// A node without `status` predates the review workflow and counts as not
/// approved.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    /// Rich-text body (sanitised HTML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ContentFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ContentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sub_topics: Vec<Topic>,
}

/// Curriculum subject shell (stored under `psychology_core_subjects`)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSubject {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ContentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revision_notes: Vec<RevisionNote>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentType {
    PreAssessment,
    Quiz,
    PostAssessment,
}

impl AssessmentType {
    pub fn label(&self) -> &str {
        match self {
            AssessmentType::PreAssessment => "Pre-Assessment",
            AssessmentType::Quiz => "Quiz",
            AssessmentType::PostAssessment => "Post-Assessment",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleType {
    #[default]
    Flexible,
    Synced,
}

/// Multiple-choice question; `correct_answer` indexes into `options`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MCQQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub points: u32,
}

/// Exam definition (stored under `system_assessments`)
///
/// `subject_id` is authoritative; `subject` is a display-name cache kept
/// for records written before ids were recorded.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: AssessmentType,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    pub items: usize,
    pub time_limit: u32,
    pub status: ContentStatus,
    #[serde(default)]
    pub schedule_type: ScheduleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_date: Option<String>,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub questions: Vec<MCQQuestion>,
    pub date_created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub revision_notes: Vec<RevisionNote>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhitelistStatus {
    Registered,
    Pending,
}

/// Pre-registration allow-list row (stored under `whitelist_entries`)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntry {
    pub id: String,
    pub email: String,
    pub student_number: String,
    pub name: String,
    pub status: WhitelistStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub date_added: NaiveDate,
}

/// Audit trail entry (stored under `system_logs`, newest first)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Institution-wide switches (stored under `global_system_settings`)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub institutional_passing_grade: u8,
    pub require_content_approval: bool,
    pub maintenance_mode: bool,
    pub allow_public_registration: bool,
    pub institution_name: String,
    pub academic_year: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            institutional_passing_grade: 75,
            require_content_approval: true,
            maintenance_mode: false,
            allow_public_registration: false,
            institution_name: "Cavite State University - Bacoor".to_string(),
            academic_year: "2023-2024".to_string(),
        }
    }
}

/// Colour themes offered in the workspace settings
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    #[serde(rename = "CVSU Standard")]
    CvsuStandard,
    #[serde(rename = "Forest Green")]
    ForestGreen,
    #[serde(rename = "Modern Dark")]
    ModernDark,
    #[serde(rename = "Midnight Purple")]
    MidnightPurple,
}

impl Theme {
    pub const ALL: [Theme; 4] = [
        Theme::CvsuStandard,
        Theme::ForestGreen,
        Theme::ModernDark,
        Theme::MidnightPurple,
    ];

    /// HSL triple applied as the primary colour
    pub fn primary_hsl(&self) -> &str {
        match self {
            Theme::CvsuStandard => "221.2 83.2% 53.3%",
            Theme::ForestGreen => "142.1 76.2% 36.3%",
            Theme::ModernDark => "222.2 47.4% 11.2%",
            Theme::MidnightPurple => "262.1 83.3% 57.8%",
        }
    }
}

/// Accepts RFC 3339 timestamps and maps anything else (`"Never"`, locale
/// strings from older exports) to `None`.
mod lenient_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.and_then(|value| {
            DateTime::parse_from_rfc3339(&value)
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_ignores_case_and_whitespace() {
        assert_eq!(UserRole::parse(" faculty "), Some(UserRole::Faculty));
        assert_eq!(UserRole::parse("Admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("Registrar"), None);
    }

    #[test]
    fn legacy_user_record_deserializes() {
        let raw = r#"{
            "id": "1",
            "name": "ADMIN",
            "email": "admin@cvsu.edu.ph",
            "role": "Admin",
            "status": "ACTIVE",
            "lastLogin": "Never"
        }"#;
        let user: User = serde_json::from_str(raw).unwrap();
        assert_eq!(user.role, UserRole::Admin);
        assert_eq!(user.last_login, None);
        assert_eq!(user.password, None);
    }

    #[test]
    fn topic_without_status_keeps_none() {
        let raw = r#"{"id": "t-1", "title": "Freud", "subTopics": [{"id": "t-2", "title": "Id"}]}"#;
        let topic: Topic = serde_json::from_str(raw).unwrap();
        assert_eq!(topic.status, None);
        assert_eq!(topic.sub_topics.len(), 1);
    }

    #[test]
    fn theme_uses_display_names_on_the_wire() {
        let json = serde_json::to_string(&Theme::ForestGreen).unwrap();
        assert_eq!(json, "\"Forest Green\"");
    }
}
