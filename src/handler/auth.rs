use chrono::Utc;
use tracing::instrument;

use crate::{
    AppState, access,
    db::{SessionExt, UserExt},
    dtos::{FilterUserDto, LoginUserDto, Response, SessionDto},
    error::{AppError, ErrorMessage},
    handler::{db_error, permissions_of, validate_input},
    models::{User, UserStatus},
    seed,
    store::keys,
    utils::password,
};

/// Writes the built-in administrator and faculty accounts if no user table
/// exists yet; returns whether anything was written
pub fn seed_default_users(app_state: &AppState) -> Result<bool, AppError> {
    let db = &app_state.db_client;
    if db.has_key(keys::USERS)? {
        return Ok(false);
    }
    db.save_users(&seed::default_users()?)
        .map_err(|e| db_error("seeding default users", e))?;
    tracing::info!("Seeded default user accounts");
    Ok(true)
}

/// Session payload for `user`: permissions, sidebar and theme are
/// recomputed on every call
pub fn session_for(app_state: &AppState, user: &User) -> Result<SessionDto, AppError> {
    let permissions = permissions_of(app_state, user)?;
    let navigation = access::filter_navigation(&permissions, access::NAVIGATION_ITEMS)
        .into_iter()
        .copied()
        .collect();
    let theme = app_state.db_client.get_theme()?;

    Ok(SessionDto {
        status: "success".to_string(),
        user: FilterUserDto::filter_user(user),
        permissions,
        navigation,
        theme,
    })
}

/// Sign in by email (case-insensitive) and password
///
/// Unknown email, wrong password and a stored value that is not a password
/// hash all produce the same message. Inactive and pending accounts are
/// refused even with the right password.
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn login(app_state: &AppState, body: LoginUserDto) -> Result<SessionDto, AppError> {
    validate_input(&body, "login")?;
    seed_default_users(app_state)?;

    app_state.latency.pause().await;

    let db = &app_state.db_client;
    let mut users = db
        .load_users()
        .map_err(|e| db_error("loading users", e))?;
    let invalid = || AppError::validation(ErrorMessage::InvalidCredentials.to_string());

    let index = users
        .iter()
        .position(|u| u.email.eq_ignore_ascii_case(body.email.trim()))
        .ok_or_else(|| {
            tracing::warn!("Login failed: unknown email");
            invalid()
        })?;

    let stored = users[index].password.as_deref().ok_or_else(invalid)?;
    let matched = match password::compare(&body.password, stored) {
        Ok(matched) => matched,
        Err(ErrorMessage::InvalidHashFormat) => {
            tracing::warn!(user_id = %users[index].id, "Stored password is not a hash");
            false
        }
        Err(e) => return Err(AppError::validation(e.to_string())),
    };
    if !matched {
        tracing::warn!("Login failed: wrong password");
        return Err(invalid());
    }

    if users[index].status != UserStatus::Active {
        tracing::warn!(user_id = %users[index].id, "Login refused for inactive account");
        return Err(AppError::validation(ErrorMessage::AccountInactive.to_string()));
    }

    users[index].last_login = Some(Utc::now());
    db.save_users(&users)
        .map_err(|e| db_error("stamping last login", e))?;

    let session_user = User {
        password: None,
        ..users[index].clone()
    };
    db.set_session_user(&session_user)
        .map_err(|e| db_error("storing session", e))?;

    tracing::info!(user_id = %session_user.id, "Login successful");
    session_for(app_state, &session_user)
}

#[instrument(skip(app_state))]
pub async fn logout(app_state: &AppState) -> Result<Response, AppError> {
    app_state
        .db_client
        .clear_session()
        .map_err(|e| db_error("clearing session", e))?;
    tracing::info!("logout successful");
    Ok(Response::success("Signed out."))
}

/// The signed-in account, or `UserNotAuthenticated`
pub fn current_user(app_state: &AppState) -> Result<User, AppError> {
    app_state
        .db_client
        .get_session_user()?
        .ok_or_else(|| AppError::permission_denied(ErrorMessage::UserNotAuthenticated.to_string()))
}

pub fn current_session(app_state: &AppState) -> Result<SessionDto, AppError> {
    let user = current_user(app_state)?;
    session_for(app_state, &user)
}
