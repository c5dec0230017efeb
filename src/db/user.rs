use super::DBClient;
use crate::error::{AppError, ErrorMessage};
use crate::models::{User, UserRole};
use crate::store::keys;

/// User collection operations
pub trait UserExt {
    /// Whole user table; empty when nothing was ever stored
    fn load_users(&self) -> Result<Vec<User>, AppError>;

    /// Overwrite the whole user table
    fn save_users(&self, users: &[User]) -> Result<(), AppError>;

    /// Single user by id
    fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Single user by email, compared case-insensitively
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Number of accounts holding `role`
    fn get_user_count_by_role(&self, role: UserRole) -> Result<usize, AppError>;

    /// Fails when `email` belongs to a user other than `user_id`
    fn check_email_duplicate(&self, user_id: Option<&str>, email: &str) -> Result<(), AppError>;
}

impl UserExt for DBClient {
    fn load_users(&self) -> Result<Vec<User>, AppError> {
        self.load_or_default(keys::USERS)
    }

    fn save_users(&self, users: &[User]) -> Result<(), AppError> {
        self.save(keys::USERS, users)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.load_users()?.into_iter().find(|u| u.id == user_id))
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .load_users()?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    fn get_user_count_by_role(&self, role: UserRole) -> Result<usize, AppError> {
        Ok(self.load_users()?.iter().filter(|u| u.role == role).count())
    }

    fn check_email_duplicate(&self, user_id: Option<&str>, email: &str) -> Result<(), AppError> {
        let exists = self
            .load_users()?
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id.as_str()) != user_id);

        if exists {
            return Err(AppError::validation(ErrorMessage::EmailAlreadyExists.to_string()));
        }

        Ok(())
    }
}
