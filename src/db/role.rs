use super::DBClient;
use crate::error::AppError;
use crate::models::RoleConfig;
use crate::store::keys;

/// Role configuration operations
pub trait RoleExt {
    /// Stored role list, or `None` if no administrator ever saved one
    ///
    /// The distinction matters: without a stored list, permission
    /// resolution falls back to the built-in table.
    fn load_role_configs(&self) -> Result<Option<Vec<RoleConfig>>, AppError>;

    fn save_role_configs(&self, roles: &[RoleConfig]) -> Result<(), AppError>;
}

impl RoleExt for DBClient {
    fn load_role_configs(&self) -> Result<Option<Vec<RoleConfig>>, AppError> {
        self.load(keys::ROLE_CONFIGS)
    }

    fn save_role_configs(&self, roles: &[RoleConfig]) -> Result<(), AppError> {
        self.save(keys::ROLE_CONFIGS, roles)
    }
}
