use serde::{Deserialize, Serialize};
use std::fmt;

/// Error payload handed to whatever surface renders notifications
///
/// Example JSON:
/// ```text
/// {
///   "status": "fail",
///   "kind": "validation",
///   "message": "Subject name is required."
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Catalog of user-facing error messages
///
/// Keeping the wording in one enum means every screen shows the same text
/// for the same failure, and tests can compare variants instead of strings.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Session errors
    InvalidCredentials,
    AccountInactive,
    UserNotAuthenticated,

    // Authorization errors
    PermissionDenied,
    SystemRoleProtected,
    CannotDeleteSelf,

    // Lookup errors
    UserNotFound,
    RoleNotFound,
    SubjectNotFound,
    TopicNotFound,
    ContentNotFound,
    AssessmentNotFound,
    WhitelistEntryNotFound,

    // Workflow errors
    NotAwaitingReview,
    AlreadyPending,
    TopicRemovalPending,
    TopicNotMarkedForRemoval,
    InvalidTransition(String),
    DuplicatePreAssessment,
    DuplicatePostAssessment,
    DuplicateQuiz,
    QuizTopicRequired,

    // Uniqueness errors
    EmailAlreadyExists,
    RoleAlreadyExists,
    StudentNumberExists,
    UnknownPermission(String),

    // Import errors
    MissingBackupKeys(Vec<String>),
    UnmappedColumns,
    UnknownColumn(String),
    EmptySheet,

    // Else
    StorageError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidCredentials => {
                "Invalid credentials or account not registered.".to_string()
            }
            ErrorMessage::AccountInactive => {
                "Account is inactive. Please contact your administrator.".to_string()
            }
            ErrorMessage::UserNotAuthenticated => "Authentication required. Please log in.".to_string(),
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::SystemRoleProtected => {
                "System roles cannot be renamed or deleted.".to_string()
            }
            ErrorMessage::CannotDeleteSelf => "You cannot remove your own account.".to_string(),
            ErrorMessage::UserNotFound => "User not found.".to_string(),
            ErrorMessage::RoleNotFound => "Role not found.".to_string(),
            ErrorMessage::SubjectNotFound => "Subject not found.".to_string(),
            ErrorMessage::TopicNotFound => "Topic not found.".to_string(),
            ErrorMessage::ContentNotFound => "Content item not found.".to_string(),
            ErrorMessage::AssessmentNotFound => "Assessment not found.".to_string(),
            ErrorMessage::WhitelistEntryNotFound => "Whitelist entry not found.".to_string(),
            ErrorMessage::NotAwaitingReview => "Only pending submissions can be reviewed.".to_string(),
            ErrorMessage::AlreadyPending => "This item is already awaiting review.".to_string(),
            ErrorMessage::TopicRemovalPending => {
                "This topic is marked for removal. Restore it first.".to_string()
            }
            ErrorMessage::TopicNotMarkedForRemoval => {
                "Only topics marked for removal can be restored.".to_string()
            }
            ErrorMessage::InvalidTransition(status) => {
                format!("This action is not available while the item is {}.", status)
            }
            ErrorMessage::DuplicatePreAssessment => {
                "A Pre-Assessment already exists for this subject.".to_string()
            }
            ErrorMessage::DuplicatePostAssessment => {
                "A Post-Assessment already exists for this subject.".to_string()
            }
            ErrorMessage::DuplicateQuiz => "A Quiz already exists for this specific topic.".to_string(),
            ErrorMessage::QuizTopicRequired => "Please select a Topic for the Quiz.".to_string(),
            ErrorMessage::EmailAlreadyExists => "Email already exists".to_string(),
            ErrorMessage::RoleAlreadyExists => "A role with this name already exists.".to_string(),
            ErrorMessage::StudentNumberExists => {
                "This student number is already whitelisted.".to_string()
            }
            ErrorMessage::UnknownPermission(id) => format!("Unknown permission: {}", id),
            ErrorMessage::MissingBackupKeys(keys) => {
                format!("Invalid backup format. Missing keys: {}", keys.join(", "))
            }
            ErrorMessage::UnmappedColumns => "Please map all required fields.".to_string(),
            ErrorMessage::UnknownColumn(column) => format!("Column not found in file: {}", column),
            ErrorMessage::EmptySheet => "The file appears to be empty.".to_string(),
            ErrorMessage::StorageError => "Storage error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Failure classes surfaced to the user
///
/// None of them is fatal: every handler returning an error leaves the
/// persisted collections as they were before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing required field or workflow rule violation (inline message)
    Validation,
    /// Unparseable import file or missing backup keys (dismissible notice)
    MalformedInput,
    NotFound,
    PermissionDenied,
    /// The persistence port failed to read or write
    Storage,
}

/// Error type returned by handlers, repositories and the storage port
#[derive(Debug, Clone, PartialEq)]
pub struct AppError {
    pub message: String,
    pub kind: ErrorKind,
}

impl AppError {
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        AppError {
            message: message.into(),
            kind,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::new(message, ErrorKind::Validation)
    }

    pub fn malformed_input(message: impl Into<String>) -> Self {
        AppError::new(message, ErrorKind::MalformedInput)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::new(message, ErrorKind::NotFound)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        AppError::new(message, ErrorKind::PermissionDenied)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        AppError::new(message, ErrorKind::Storage)
    }

    /// Shape used when handing the error to a notification surface
    pub fn into_response(self) -> ErrorResponse {
        ErrorResponse {
            status: "fail".to_string(),
            kind: self.kind,
            message: self.message,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppError: message: {}, kind: {:?}", self.message, self.kind)
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::storage(format!("{}: {}", ErrorMessage::StorageError, err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::storage(format!("{}: {}", ErrorMessage::StorageError, err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_backup_keys_are_named_in_order() {
        let message = ErrorMessage::MissingBackupKeys(vec![
            "subjects".to_string(),
            "whitelist".to_string(),
        ]);
        assert_eq!(
            message.to_string(),
            "Invalid backup format. Missing keys: subjects, whitelist"
        );
    }

    #[test]
    fn response_keeps_kind_and_message() {
        let response = AppError::not_found(ErrorMessage::SubjectNotFound.to_string()).into_response();
        assert_eq!(response.status, "fail");
        assert_eq!(response.kind, ErrorKind::NotFound);
        assert_eq!(response.to_string(), r#"{"status":"fail","kind":"not_found","message":"Subject not found."}"#);
    }
}
