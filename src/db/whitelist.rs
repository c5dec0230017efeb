use super::DBClient;
use crate::error::AppError;
use crate::models::WhitelistEntry;
use crate::store::keys;

pub trait WhitelistExt {
    fn load_whitelist(&self) -> Result<Vec<WhitelistEntry>, AppError>;

    fn save_whitelist(&self, entries: &[WhitelistEntry]) -> Result<(), AppError>;

    /// Whether `student_number` is already on the list (ignoring `except_id`)
    fn student_number_exists(
        &self,
        student_number: &str,
        except_id: Option<&str>,
    ) -> Result<bool, AppError>;
}

impl WhitelistExt for DBClient {
    fn load_whitelist(&self) -> Result<Vec<WhitelistEntry>, AppError> {
        self.load_or_default(keys::WHITELIST)
    }

    fn save_whitelist(&self, entries: &[WhitelistEntry]) -> Result<(), AppError> {
        self.save(keys::WHITELIST, entries)
    }

    fn student_number_exists(
        &self,
        student_number: &str,
        except_id: Option<&str>,
    ) -> Result<bool, AppError> {
        Ok(self
            .load_whitelist()?
            .iter()
            .any(|e| e.student_number == student_number && Some(e.id.as_str()) != except_id))
    }
}
