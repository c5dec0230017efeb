use super::DBClient;
use crate::error::AppError;
use crate::models::{Theme, User};
use crate::store::keys;

/// Current-session record and theme preference
pub trait SessionExt {
    fn get_session_user(&self) -> Result<Option<User>, AppError>;

    fn set_session_user(&self, user: &User) -> Result<(), AppError>;

    fn clear_session(&self) -> Result<(), AppError>;

    /// Active theme, falling back to the institutional default
    fn get_theme(&self) -> Result<Theme, AppError>;

    fn set_theme(&self, theme: Theme) -> Result<(), AppError>;
}

impl SessionExt for DBClient {
    fn get_session_user(&self) -> Result<Option<User>, AppError> {
        self.load(keys::SESSION_USER)
    }

    fn set_session_user(&self, user: &User) -> Result<(), AppError> {
        self.save(keys::SESSION_USER, user)
    }

    fn clear_session(&self) -> Result<(), AppError> {
        self.remove(keys::SESSION_USER)
    }

    fn get_theme(&self) -> Result<Theme, AppError> {
        self.load_or_default(keys::THEME)
    }

    fn set_theme(&self, theme: Theme) -> Result<(), AppError> {
        self.save(keys::THEME, &theme)
    }
}
