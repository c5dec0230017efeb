//! User-action handlers, one module per screen.
//!
//! Every handler follows the same shape: validate the input, check the
//! actor's permission, await the simulated latency, load the collection,
//! apply the change, write the whole collection back and append an activity
//! entry. A handler that returns an error has not written anything.

pub mod activity;
pub mod assessments;
pub mod auth;
pub mod content;
pub mod dashboard;
pub mod roles;
pub mod settings;
pub mod subjects;
pub mod users;
pub mod whitelist;

use validator::Validate;

use crate::{
    AppState, access,
    db::{ActivityExt, RoleExt},
    error::AppError,
    models::User,
};

/// Effective permission set of `actor` under the stored role configuration
pub fn permissions_of(app_state: &AppState, actor: &User) -> Result<Vec<String>, AppError> {
    let configs = app_state
        .db_client
        .load_role_configs()
        .map_err(|e| db_error("loading role configs", e))?;
    Ok(access::resolve_permissions(actor.role.to_str(), configs.as_deref()))
}

/// Fails unless `actor` holds `permission`
pub(crate) fn authorize(
    app_state: &AppState,
    actor: &User,
    permission: &str,
) -> Result<Vec<String>, AppError> {
    let permissions = permissions_of(app_state, actor)?;
    access::require_permission(&permissions, permission)?;
    Ok(permissions)
}

/// Fails unless `actor` holds at least one of `permissions`
pub(crate) fn authorize_any(
    app_state: &AppState,
    actor: &User,
    permissions: &[&str],
) -> Result<Vec<String>, AppError> {
    let held = permissions_of(app_state, actor)?;
    if !permissions.iter().any(|p| held.iter().any(|h| h == p)) {
        // Report the first listed permission as the missing one.
        access::require_permission(&held, permissions.first().copied().unwrap_or_default())?;
    }
    Ok(held)
}

pub(crate) fn validate_input<T: Validate>(body: &T, operation: &str) -> Result<(), AppError> {
    body.validate().map_err(|e| {
        tracing::warn!("Invalid {} input: {}", operation, e);
        AppError::from(e)
    })
}

/// Logs a repository failure and passes it through unchanged
pub(crate) fn db_error(context: &str, e: AppError) -> AppError {
    tracing::error!("DB error, {}: {}", context, e);
    e
}

/// Appends to the audit trail
///
/// The primary write has already happened when this runs, so a failure here
/// is logged and swallowed rather than reported as a failed operation.
pub(crate) fn record_activity(app_state: &AppState, actor: &User, action: &str, entity: &str) {
    if let Err(e) = app_state
        .db_client
        .append_log(&actor.id, &actor.name, action, entity)
    {
        tracing::error!("DB error, appending activity log: {}", e);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        AppState,
        config::Config,
        db::UserExt,
        models::{User, UserRole, UserStatus},
        store::MemoryStore,
    };

    pub fn state() -> AppState {
        AppState::new(Config::default(), MemoryStore::new())
    }

    pub fn user(id: &str, name: &str, role: UserRole) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@cvsu.edu.ph", name.to_lowercase().replace(' ', ".")),
            name: name.to_string(),
            password: None,
            role,
            status: UserStatus::Active,
            student_number: None,
            last_login: None,
            phone_number: None,
            department: None,
            settings: None,
        }
    }

    pub fn admin() -> User {
        user("1", "ADMIN", UserRole::Admin)
    }

    pub fn faculty() -> User {
        user("2", "PROFESSOR", UserRole::Faculty)
    }

    pub fn student() -> User {
        user("3", "Maria Santos", UserRole::Student)
    }

    /// State whose user table holds the admin, faculty and student accounts
    pub fn state_with_users() -> AppState {
        let state = state();
        state
            .db_client
            .save_users(&[admin(), faculty(), student()])
            .unwrap();
        state
    }
}
