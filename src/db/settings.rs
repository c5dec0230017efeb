use super::DBClient;
use crate::error::AppError;
use crate::models::GlobalSettings;
use crate::store::keys;

pub trait SettingsExt {
    /// Stored institutional settings, or the defaults
    fn load_global_settings(&self) -> Result<GlobalSettings, AppError>;

    fn save_global_settings(&self, settings: &GlobalSettings) -> Result<(), AppError>;
}

impl SettingsExt for DBClient {
    fn load_global_settings(&self) -> Result<GlobalSettings, AppError> {
        self.load_or_default(keys::GLOBAL_SETTINGS)
    }

    fn save_global_settings(&self, settings: &GlobalSettings) -> Result<(), AppError> {
        self.save(keys::GLOBAL_SETTINGS, settings)
    }
}
