use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use crate::{
    AppState,
    access::perm,
    db::{SessionExt, SettingsExt, UserExt},
    dtos::{BackupDocument, GlobalSettingsDto, ImportReportDto, Response},
    error::{AppError, ErrorMessage},
    handler::{authorize, db_error, record_activity, validate_input},
    models::{
        Assessment, ContentItem, CurriculumSubject, GlobalSettings, Theme, User, UserPreferences,
        WhitelistEntry,
    },
    store::keys,
};

pub const BACKUP_VERSION: &str = "1.2.1";

/// Sections that must be present (possibly null) in every backup
const REQUIRED_SECTIONS: [&str; 5] = ["users", "content", "assessments", "subjects", "whitelist"];

pub fn get_global_settings(app_state: &AppState) -> Result<GlobalSettings, AppError> {
    app_state
        .db_client
        .load_global_settings()
        .map_err(|e| db_error("loading global settings", e))
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn save_global_settings(
    app_state: &AppState,
    actor: &User,
    body: GlobalSettingsDto,
) -> Result<GlobalSettings, AppError> {
    validate_input(&body, "save_global_settings")?;
    authorize(app_state, actor, perm::SYSTEM_SETTINGS)?;

    app_state.latency.pause().await;

    let settings = GlobalSettings::from(body);
    app_state
        .db_client
        .save_global_settings(&settings)
        .map_err(|e| db_error("saving global settings", e))?;

    record_activity(app_state, actor, "Modified Global Settings", "System Controls");
    tracing::info!("save_global_settings successful");
    Ok(settings)
}

/// Stores the actor's own workspace preferences on their account and on
/// the session
#[instrument(skip(app_state, actor, preferences), fields(actor = %actor.id))]
pub async fn save_preferences(
    app_state: &AppState,
    actor: &User,
    preferences: UserPreferences,
) -> Result<Response, AppError> {
    app_state.latency.pause().await;

    let db = &app_state.db_client;
    let mut users = db.load_users().map_err(|e| db_error("loading users", e))?;
    let user = users
        .iter_mut()
        .find(|u| u.id == actor.id)
        .ok_or_else(|| AppError::not_found(ErrorMessage::UserNotFound.to_string()))?;
    user.settings = Some(preferences);
    let session_user = User {
        password: None,
        ..user.clone()
    };
    db.save_users(&users).map_err(|e| db_error("saving users", e))?;
    db.set_session_user(&session_user)
        .map_err(|e| db_error("refreshing session", e))?;

    record_activity(app_state, actor, "Updated Settings", "User Preferences");
    tracing::info!("save_preferences successful");
    Ok(Response::success("Workspace preferences updated."))
}

pub fn get_theme(app_state: &AppState) -> Result<Theme, AppError> {
    app_state.db_client.get_theme()
}

pub fn set_theme(app_state: &AppState, theme: Theme) -> Result<Theme, AppError> {
    app_state
        .db_client
        .set_theme(theme)
        .map_err(|e| db_error("saving theme", e))?;
    tracing::info!(primary = theme.primary_hsl(), "Theme applied");
    Ok(theme)
}

/// Pretty-printed JSON snapshot of every institutional collection
///
/// Collections are exported exactly as stored; absent ones come out as
/// `null`.
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn export_backup(app_state: &AppState, actor: &User) -> Result<String, AppError> {
    authorize(app_state, actor, perm::MANAGE_BACKUP)?;

    let db = &app_state.db_client;
    let raw = |key: &str| -> Result<Value, AppError> {
        Ok(db
            .load_raw(key)
            .map_err(|e| db_error("reading collection for backup", e))?
            .unwrap_or(Value::Null))
    };
    let document = BackupDocument {
        users: raw(keys::USERS)?,
        content: raw(keys::CONTENT)?,
        assessments: raw(keys::ASSESSMENTS)?,
        subjects: raw(keys::SUBJECTS)?,
        whitelist: raw(keys::WHITELIST)?,
        global_settings: raw(keys::GLOBAL_SETTINGS)?,
        version: BACKUP_VERSION.to_string(),
        timestamp: Utc::now(),
    };

    let json = serde_json::to_string_pretty(&document)?;
    tracing::info!(bytes = json.len(), "export_backup successful");
    Ok(json)
}

/// A section ready to be written, already checked against its model
struct Section {
    name: &'static str,
    key: &'static str,
    value: Value,
}

/// Unwraps a section that older exports stored as a JSON string and checks
/// that it reads as `T`
fn prepare<T: DeserializeOwned>(
    backup: &mut serde_json::Map<String, Value>,
    name: &'static str,
    key: &'static str,
) -> Result<Option<Section>, AppError> {
    let value = match backup.remove(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(embedded)) => serde_json::from_str(&embedded).map_err(|e| {
            AppError::malformed_input(format!("Backup section {} is not valid JSON: {}", name, e))
        })?,
        Some(value) => value,
    };
    serde_json::from_value::<T>(value.clone()).map_err(|e| {
        tracing::warn!("Backup section {} rejected: {}", name, e);
        AppError::malformed_input(format!("Backup section {} is invalid: {}", name, e))
    })?;
    Ok(Some(Section { name, key, value }))
}

/// Restores a backup produced by [`export_backup`] (or the older web
/// exports)
///
/// **Steps:**
/// 1. Parse the document; anything that is not a JSON object is malformed
/// 2. Require `users`, `content`, `assessments`, `subjects` and `whitelist`;
///    the error names every missing key
/// 3. Check each present, non-null section against its model type.
///    Sections stored as a JSON string (older exports) are unwrapped first
/// 4. Overwrite the collections in that order, then global settings
/// 5. Re-bind the signed-in account by email
///
/// Steps 1 to 3 finish before the first write, so a bad file leaves storage
/// untouched. The writes in step 4 are separate overwrites and are not
/// rolled back if storage fails half-way.
///
/// # Errors
/// - `MalformedInput`: unparsable JSON or a section of the wrong shape
/// - `Validation`: required sections missing
/// - `PermissionDenied`: the actor lacks `manage_backup`
/// - `Storage`: a write failed part-way through step 4
///
/// A missing session account is not an error; it comes back as
/// `ImportReportDto::warning`.
#[instrument(skip(app_state, actor, raw), fields(actor = %actor.id, bytes = raw.len()))]
pub async fn import_backup(
    app_state: &AppState,
    actor: &User,
    raw: &str,
) -> Result<ImportReportDto, AppError> {
    authorize(app_state, actor, perm::MANAGE_BACKUP)?;

    let mut backup = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(AppError::malformed_input("Failed to parse backup file."));
        }
        Err(e) => {
            tracing::warn!("Backup is not JSON: {}", e);
            return Err(AppError::malformed_input("Failed to parse backup file."));
        }
    };

    let missing: Vec<String> = REQUIRED_SECTIONS
        .iter()
        .filter(|name| !backup.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        tracing::warn!(?missing, "Backup rejected");
        return Err(AppError::malformed_input(
            ErrorMessage::MissingBackupKeys(missing).to_string(),
        ));
    }

    let sections: Vec<Section> = [
        prepare::<Vec<User>>(&mut backup, "users", keys::USERS)?,
        prepare::<Vec<ContentItem>>(&mut backup, "content", keys::CONTENT)?,
        prepare::<Vec<Assessment>>(&mut backup, "assessments", keys::ASSESSMENTS)?,
        prepare::<Vec<CurriculumSubject>>(&mut backup, "subjects", keys::SUBJECTS)?,
        prepare::<Vec<WhitelistEntry>>(&mut backup, "whitelist", keys::WHITELIST)?,
        prepare::<GlobalSettings>(&mut backup, "global_settings", keys::GLOBAL_SETTINGS)?,
    ]
    .into_iter()
    .flatten()
    .collect();

    let imported_users: Option<Vec<User>> = sections
        .iter()
        .find(|s| s.name == "users")
        .map(|s| serde_json::from_value(s.value.clone()))
        .transpose()?;

    app_state.latency.pause().await;

    let db = &app_state.db_client;
    let mut restored = Vec::with_capacity(sections.len());
    for section in &sections {
        db.save_raw(section.key, &section.value)
            .map_err(|e| db_error("restoring backup section", e))?;
        restored.push(section.name.to_string());
    }

    let mut warning = None;
    if let Some(users) = imported_users {
        match users
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(&actor.email))
        {
            Some(user) => {
                db.set_session_user(&User {
                    password: None,
                    ..user
                })
                .map_err(|e| db_error("re-binding session", e))?;
            }
            None => {
                tracing::warn!("Signed-in account missing from imported users");
                warning = Some(
                    "Active user not found in imported backup. Profile might be inconsistent."
                        .to_string(),
                );
            }
        }
    }

    record_activity(app_state, actor, "System Restore", "Institutional Data Import");
    tracing::info!(?restored, "import_backup successful");
    Ok(ImportReportDto {
        status: "success".to_string(),
        restored,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ContentExt, SubjectExt};
    use crate::error::ErrorKind;
    use crate::handler::test_support::{admin, faculty, state_with_users, student};
    use crate::seed;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn settings_form() -> GlobalSettingsDto {
        GlobalSettingsDto {
            institutional_passing_grade: 80,
            require_content_approval: true,
            maintenance_mode: true,
            allow_public_registration: false,
            institution_name: "Cavite State University - Bacoor".to_string(),
            academic_year: "2024-2025".to_string(),
        }
    }

    #[tokio::test]
    async fn global_settings_default_then_persist() {
        let state = state_with_users();
        assert_eq!(get_global_settings(&state).unwrap(), GlobalSettings::default());

        let saved = save_global_settings(&state, &admin(), settings_form()).await.unwrap();
        assert_eq!(saved.institutional_passing_grade, 80);
        assert_eq!(get_global_settings(&state).unwrap(), saved);

        let err = save_global_settings(&state, &faculty(), settings_form())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn preferences_land_on_account_and_session() {
        let state = state_with_users();
        let prefs = UserPreferences {
            compact_sidebar: Some(true),
            ..Default::default()
        };
        save_preferences(&state, &student(), prefs.clone()).await.unwrap();

        let stored = state.db_client.get_user("3").unwrap().unwrap();
        assert_eq!(stored.settings, Some(prefs.clone()));
        let session = state.db_client.get_session_user().unwrap().unwrap();
        assert_eq!(session.settings, Some(prefs));
    }

    #[test]
    fn theme_defaults_and_switches() {
        let state = state_with_users();
        assert_eq!(get_theme(&state).unwrap(), Theme::CvsuStandard);
        set_theme(&state, Theme::ModernDark).unwrap();
        assert_eq!(get_theme(&state).unwrap(), Theme::ModernDark);
    }

    #[tokio::test]
    async fn export_then_import_restores_collections() {
        let state = state_with_users();
        state.db_client.save_subjects(&seed::initial_subjects()).unwrap();
        let exported = export_backup(&state, &admin()).await.unwrap();

        let document: Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(document["version"], BACKUP_VERSION);
        assert_eq!(document["content"], Value::Null);

        state.db_client.save_subjects(&[]).unwrap();
        let report = import_backup(&state, &admin(), &exported).await.unwrap();
        assert_eq!(report.restored, vec!["users", "subjects"]);
        assert_eq!(report.warning, None);
        assert_eq!(state.db_client.load_subjects().unwrap().len(), 4);
        let session = state.db_client.get_session_user().unwrap().unwrap();
        assert_eq!(session.id, "1");
    }

    #[tokio::test]
    async fn missing_sections_reject_before_any_write() {
        let state = state_with_users();
        let raw = json!({"users": [], "content": [], "assessments": []}).to_string();
        let err = import_backup(&state, &admin(), &raw).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);
        assert_eq!(err.message, "Invalid backup format. Missing keys: subjects, whitelist");
        assert_eq!(state.db_client.load_users().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn invalid_section_rejects_the_whole_file() {
        let state = state_with_users();
        let raw = json!({
            "users": [],
            "content": [],
            "assessments": [],
            "subjects": [],
            "whitelist": [{"id": "1", "name": "No number"}],
        })
        .to_string();
        let err = import_backup(&state, &admin(), &raw).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);
        assert_eq!(state.db_client.load_users().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn string_sections_are_unwrapped_and_missing_actor_warns() {
        let state = state_with_users();
        let raw = json!({
            "users": "[]",
            "content": "[]",
            "assessments": null,
            "subjects": [],
            "whitelist": [],
        })
        .to_string();
        let report = import_backup(&state, &admin(), &raw).await.unwrap();
        assert_eq!(report.restored, vec!["users", "content", "subjects", "whitelist"]);
        assert!(report.warning.is_some());
        assert!(state.db_client.load_users().unwrap().is_empty());
        assert!(state.db_client.load_content().unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_is_malformed_input() {
        let state = state_with_users();
        let err = import_backup(&state, &admin(), "not a backup").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);

        let err = import_backup(&state, &faculty(), "{}").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }
}
