use crate::access::NavItem;
use crate::models::{
    ActivityLog, Assessment, AssessmentType, ContentFormat, ContentItem, ContentKind,
    ContentStatus, CurriculumSubject, GlobalSettings, MCQQuestion, ScheduleType, Theme, User,
    UserPreferences, UserRole, UserStatus, WhitelistStatus,
};
use crate::workflow::ReviewAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// DTOs are the shapes exchanged with the screens. They are kept apart from
// the persisted models so that, for example, password hashes never leave
// the crate.

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// List query shared by every paginated screen
#[derive(Serialize, Deserialize, Validate, Debug, Default, Clone)]
pub struct RequestQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<usize>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,

    /// Free-text filter; each list decides which fields it searches
    pub search: Option<String>,
}

impl RequestQueryDto {
    pub fn search_term(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PaginationDto {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct PageDto<T> {
    pub status: String,
    pub data: Vec<T>,
    pub pagination: PaginationDto,
}

/// Slices an already filtered list into the requested page
///
/// Pages past the end come back empty rather than as an error.
pub fn paginate<T>(items: Vec<T>, query: &RequestQueryDto) -> PageDto<T> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let total = items.len();

    let data = items
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    PageDto {
        status: "success".to_string(),
        data,
        pagination: PaginationDto {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        },
    }
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Response {
            status: "success",
            message: message.into(),
        }
    }
}

// ============================================================================
// Authentication DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// What the shell needs after login: who, what they may do, and the
/// sidebar built from it
#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub status: String,
    pub user: FilterUserDto,
    pub permissions: Vec<String>,
    pub navigation: Vec<NavItem>,
    pub theme: Theme,
}

// ============================================================================
// User DTOs
// ============================================================================

/// User data safe to hand to screens (no password hash)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterUserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub student_number: Option<String>,
    pub department: Option<String>,
    pub phone_number: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub settings: Option<UserPreferences>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_owned(),
            name: user.name.to_owned(),
            email: user.email.to_owned(),
            role: user.role.to_str().to_string(),
            status: user.status.to_str().to_string(),
            student_number: user.student_number.clone(),
            department: user.department.clone(),
            phone_number: user.phone_number.clone(),
            last_login: user.last_login,
            settings: user.settings.clone(),
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: FilterUserDto,
}

/// New account form
///
/// Students and faculty must carry an id number and a department (program
/// for students); administrators carry neither.
#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_member_details"))]
pub struct CreateUserDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    pub role: UserRole,

    pub student_number: Option<String>,

    pub department: Option<String>,

    pub phone_number: Option<String>,
}

fn validate_member_details(dto: &CreateUserDto) -> Result<(), ValidationError> {
    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
    let message = match dto.role {
        UserRole::Admin => return Ok(()),
        UserRole::Student => "Student Number and Program are required for students.",
        UserRole::Faculty => "Faculty ID and Department are required for faculty.",
    };
    if present(&dto.student_number) && present(&dto.department) {
        Ok(())
    } else {
        Err(ValidationError::new("member_details").with_message(message.into()))
    }
}

/// Profile edit; `role` and `status` are only honoured for `edit_users`
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    pub phone_number: Option<String>,

    pub department: Option<String>,

    pub student_number: Option<String>,

    pub role: Option<UserRole>,

    pub status: Option<UserStatus>,
}

#[derive(Debug, Validate, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPasswordUpdateDto {
    #[validate(length(min = 6, message = "new password must be at least 6 characters"))]
    pub new_password: String,

    #[validate(must_match(other = "new_password", message = "new passwords do not match"))]
    pub new_password_confirm: String,
}

// ============================================================================
// Role DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RoleNameDto {
    #[validate(length(min = 1, max = 40, message = "Role name is required"))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RoleListDto {
    pub status: String,
    pub roles: Vec<crate::models::RoleConfig>,
    /// `true` when the list is the built-in default, not yet saved
    pub defaults: bool,
}

// ============================================================================
// Review DTOs
// ============================================================================

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDto {
    pub action: ReviewAction,

    #[validate(length(max = 2000, message = "Note must be at most 2000 characters"))]
    pub note: Option<String>,
}

impl ReviewDto {
    pub fn note(&self) -> &str {
        self.note.as_deref().unwrap_or("")
    }
}

// ============================================================================
// Curriculum DTOs
// ============================================================================

/// Subject shell metadata form
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SubjectInputDto {
    /// Absent for a new subject
    pub id: Option<String>,

    #[validate(length(min = 1, message = "Subject name is required."))]
    pub name: String,

    pub description: String,

    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,
}

fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_color").with_message("Color must be a hex value".into()))
    }
}

/// Topic editor form
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicInputDto {
    #[validate(length(min = 1, message = "Topic title is required."))]
    pub title: String,

    pub description: Option<String>,

    pub format: Option<ContentFormat>,

    pub file_url: Option<String>,

    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubjectResponseDto {
    pub status: String,
    pub data: CurriculumSubject,
}

/// Curriculum size per subject, for the repository overview
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStatsDto {
    pub subject_id: String,
    pub topic_count: usize,
    pub approved_topic_count: usize,
    pub removal_pending_count: usize,
    pub fully_approved: bool,
}

// ============================================================================
// Content DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInputDto {
    pub id: Option<String>,

    #[validate(length(min = 1, message = "Title is required."))]
    pub title: String,

    pub subject: String,

    #[serde(default)]
    pub topic_id: String,

    #[serde(rename = "type", default)]
    pub kind: ContentKind,

    #[serde(default)]
    pub format: ContentFormat,

    pub content: Option<String>,

    pub file_url: Option<String>,
}

/// Content list row with a plain-text preview instead of the body
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummaryDto {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub status: ContentStatus,
    pub author_name: String,
    pub submission_count: u32,
    pub revision_count: u32,
    pub excerpt: String,
    pub last_updated: DateTime<Utc>,
}

impl ContentSummaryDto {
    pub fn from_item(item: &ContentItem) -> Self {
        ContentSummaryDto {
            id: item.id.clone(),
            title: item.title.clone(),
            subject: item.subject.clone(),
            status: item.status,
            author_name: item.author_name.clone(),
            submission_count: item.submission_count,
            revision_count: item.revision_count,
            excerpt: item
                .content
                .as_deref()
                .map(|c| crate::utils::text::excerpt(c, 120))
                .unwrap_or_default(),
            last_updated: item.last_updated,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContentResponseDto {
    pub status: String,
    pub data: ContentItem,
}

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct ContentStatsDto {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub revision: usize,
}

// ============================================================================
// Assessment DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MCQQuestionDto {
    pub id: Option<String>,

    #[validate(length(min = 1, message = "Question text is required."))]
    pub text: String,

    #[validate(length(equal = 4, message = "Each question needs exactly four options."))]
    pub options: Vec<String>,

    #[validate(range(max = 3, message = "Correct answer must point at one of the four options."))]
    pub correct_answer: usize,

    #[validate(range(min = 1, message = "Points must be at least 1."))]
    pub points: u32,
}

impl MCQQuestionDto {
    pub fn into_question(self) -> MCQQuestion {
        MCQQuestion {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            text: self.text,
            options: self.options,
            correct_answer: self.correct_answer,
            points: self.points,
        }
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentInputDto {
    pub id: Option<String>,

    #[validate(length(min = 1, message = "Title is required."))]
    pub title: String,

    #[serde(rename = "type")]
    pub kind: AssessmentType,

    #[validate(length(min = 1, message = "Please select a Subject."))]
    pub subject: String,

    pub subject_id: Option<String>,

    pub topic_id: Option<String>,

    pub content_id: Option<String>,

    #[validate(range(min = 1, max = 600, message = "Time limit must be between 1 and 600 minutes."))]
    pub time_limit: u32,

    #[serde(default)]
    pub schedule_type: ScheduleType,

    pub schedule_date: Option<String>,

    #[validate(nested)]
    #[serde(default)]
    pub questions: Vec<MCQQuestionDto>,
}

impl AssessmentInputDto {
    /// Topic id with blank strings treated as unset
    pub fn topic(&self) -> Option<&str> {
        self.topic_id.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct AssessmentResponseDto {
    pub status: String,
    pub data: Assessment,
}

// ============================================================================
// Whitelist DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntryDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Student number is required"))]
    pub student_number: String,

    #[validate(email(message = "Email is invalid"))]
    pub email: String,

    pub status: Option<WhitelistStatus>,
}

/// Which sheet header feeds which whitelist field
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMappingDto {
    #[validate(length(min = 1, message = "Please map all required fields."))]
    pub name: String,

    #[validate(length(min = 1, message = "Please map all required fields."))]
    pub student_number: String,

    #[validate(length(min = 1, message = "Please map all required fields."))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BulkImportResultDto {
    pub added: usize,
    pub skipped: usize,
}

// ============================================================================
// Settings & Backup DTOs
// ============================================================================

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettingsDto {
    #[validate(range(max = 100, message = "Passing grade must be between 0 and 100."))]
    pub institutional_passing_grade: u8,

    pub require_content_approval: bool,

    pub maintenance_mode: bool,

    pub allow_public_registration: bool,

    #[validate(length(min = 1, message = "Institution name is required."))]
    pub institution_name: String,

    #[validate(length(min = 1, message = "Academic year is required."))]
    pub academic_year: String,
}

impl From<GlobalSettingsDto> for GlobalSettings {
    fn from(dto: GlobalSettingsDto) -> Self {
        GlobalSettings {
            institutional_passing_grade: dto.institutional_passing_grade,
            require_content_approval: dto.require_content_approval,
            maintenance_mode: dto.maintenance_mode,
            allow_public_registration: dto.allow_public_registration,
            institution_name: dto.institution_name,
            academic_year: dto.academic_year,
        }
    }
}

/// Full-system export document
///
/// Collections are carried as raw JSON so that whatever is stored is
/// exported unchanged, including records this build would reject.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupDocument {
    pub users: serde_json::Value,
    pub content: serde_json::Value,
    pub assessments: serde_json::Value,
    pub subjects: serde_json::Value,
    pub whitelist: serde_json::Value,
    pub global_settings: serde_json::Value,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ImportReportDto {
    pub status: String,
    /// Collections overwritten, in write order
    pub restored: Vec<String>,
    /// Set when the signed-in account is missing from the imported users
    pub warning: Option<String>,
}

// ============================================================================
// Dashboard DTOs
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatsDto {
    pub total_students: usize,
    pub pending_approvals: usize,
    pub content_materials: usize,
    pub subject_shells: usize,
    pub modular_units: usize,
    pub recent_activity: Vec<ActivityLog>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paginate_reports_totals_and_clamps() {
        let query = RequestQueryDto {
            page: Some(3),
            limit: Some(4),
            search: None,
        };
        let page = paginate((1..=10).collect::<Vec<_>>(), &query);
        assert_eq!(page.data, vec![9, 10]);
        assert_eq!(
            page.pagination,
            PaginationDto {
                page: 3,
                limit: 4,
                total: 10,
                total_pages: 3
            }
        );

        let past_end = paginate(vec![1, 2], &query);
        assert!(past_end.data.is_empty());
    }

    #[test]
    fn huge_page_numbers_come_back_empty() {
        let query = RequestQueryDto {
            page: Some(usize::MAX),
            limit: Some(2),
            search: None,
        };
        assert!(query.validate().is_ok());
        let page = paginate((1..=10).collect::<Vec<_>>(), &query);
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total, 10);
        assert_eq!(page.pagination.page, usize::MAX);
    }

    #[test]
    fn member_details_required_for_students_and_faculty() {
        let mut dto = CreateUserDto {
            name: "Ana Cruz".to_string(),
            email: "ana.cruz@cvsu.edu.ph".to_string(),
            password: "secret1".to_string(),
            role: UserRole::Student,
            student_number: Some("202210001".to_string()),
            department: None,
            phone_number: None,
        };
        let err = dto.validate().unwrap_err();
        assert!(err.to_string().contains("Student Number and Program are required"));

        dto.department = Some("BS Psychology".to_string());
        assert!(dto.validate().is_ok());

        dto.role = UserRole::Admin;
        dto.student_number = None;
        dto.department = None;
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn question_needs_four_options_and_a_valid_answer() {
        let mut question = MCQQuestionDto {
            id: None,
            text: "Who proposed the id, ego and superego?".to_string(),
            options: vec!["Freud".into(), "Jung".into(), "Adler".into()],
            correct_answer: 0,
            points: 1,
        };
        assert!(question.validate().is_err());

        question.options.push("Horney".into());
        assert!(question.validate().is_ok());

        question.correct_answer = 4;
        assert!(question.validate().is_err());
    }

    #[test]
    fn subject_color_must_be_hex() {
        let mut dto = SubjectInputDto {
            id: None,
            name: "Developmental Psychology".to_string(),
            description: String::new(),
            color: "#1e40af".to_string(),
        };
        assert!(dto.validate().is_ok());
        dto.color = "blue".to_string();
        assert!(dto.validate().is_err());
    }
}
