use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    access::perm,
    db::{SessionExt, UserExt},
    dtos::{
        CreateUserDto, FilterUserDto, PageDto, RequestQueryDto, Response, UpdateUserDto,
        UserPasswordUpdateDto, UserResponseDto, paginate,
    },
    error::{AppError, ErrorMessage},
    handler::{authorize, db_error, permissions_of, record_activity, validate_input},
    models::{User, UserRole, UserStatus},
    utils::{password, text::matches_query},
};

fn not_found() -> AppError {
    AppError::not_found(ErrorMessage::UserNotFound.to_string())
}

fn respond(user: &User) -> UserResponseDto {
    UserResponseDto {
        status: "success".to_string(),
        data: FilterUserDto::filter_user(user),
    }
}

/// Self-service is always allowed; anything else needs `permission`
fn authorize_self_or(
    app_state: &AppState,
    actor: &User,
    user_id: &str,
    permission: &str,
) -> Result<bool, AppError> {
    if actor.id == user_id {
        let held = permissions_of(app_state, actor)?;
        return Ok(held.iter().any(|p| p == permission));
    }
    authorize(app_state, actor, permission)?;
    Ok(true)
}

/// Paginated user list, searchable by name or email
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn list_users(
    app_state: &AppState,
    actor: &User,
    query: RequestQueryDto,
) -> Result<PageDto<FilterUserDto>, AppError> {
    validate_input(&query, "list_users")?;
    authorize(app_state, actor, perm::VIEW_USERS)?;

    let users = app_state
        .db_client
        .load_users()
        .map_err(|e| db_error("loading users", e))?;
    let filtered: Vec<FilterUserDto> = users
        .iter()
        .filter(|u| matches_query(query.search_term(), &[&u.name, &u.email]))
        .map(FilterUserDto::filter_user)
        .collect();

    tracing::info!("list_users successful");
    Ok(paginate(filtered, &query))
}

pub async fn get_user(
    app_state: &AppState,
    actor: &User,
    user_id: &str,
) -> Result<UserResponseDto, AppError> {
    authorize_self_or(app_state, actor, user_id, perm::VIEW_USERS)?;
    let user = app_state
        .db_client
        .get_user(user_id)
        .map_err(|e| db_error("getting user", e))?
        .ok_or_else(not_found)?;
    Ok(respond(&user))
}

/// Registers a new account (active immediately)
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id, email = %body.email))]
pub async fn create_user(
    app_state: &AppState,
    actor: &User,
    body: CreateUserDto,
) -> Result<UserResponseDto, AppError> {
    validate_input(&body, "create_user")?;
    authorize(app_state, actor, perm::EDIT_USERS)?;

    let db = &app_state.db_client;
    db.check_email_duplicate(None, &body.email)?;
    let hashed_password =
        password::hash(&body.password).map_err(|e| AppError::validation(e.to_string()))?;

    app_state.latency.pause().await;

    let member_field = |value: Option<String>| match body.role {
        UserRole::Admin => None,
        _ => value.map(|v| v.trim().to_string()),
    };
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: body.email.trim().to_string(),
        name: body.name.trim().to_string(),
        password: Some(hashed_password),
        role: body.role,
        status: UserStatus::Active,
        student_number: member_field(body.student_number.clone()),
        last_login: None,
        phone_number: body.phone_number.clone(),
        department: member_field(body.department.clone()),
        settings: None,
    };

    let mut users = db.load_users().map_err(|e| db_error("loading users", e))?;
    users.push(user.clone());
    db.save_users(&users).map_err(|e| db_error("saving users", e))?;

    record_activity(app_state, actor, "Created User Account", &user.name);
    tracing::info!(user_id = %user.id, "create_user successful");
    Ok(respond(&user))
}

/// Profile edit
///
/// Users may edit their own profile; editing anyone else, or changing a
/// role or status, needs `edit_users`. Editing yourself also refreshes the
/// stored session.
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn update_user(
    app_state: &AppState,
    actor: &User,
    user_id: &str,
    body: UpdateUserDto,
) -> Result<UserResponseDto, AppError> {
    validate_input(&body, "update_user")?;
    let can_manage = authorize_self_or(app_state, actor, user_id, perm::EDIT_USERS)?;
    if !can_manage && (body.role.is_some() || body.status.is_some()) {
        return Err(AppError::permission_denied(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let db = &app_state.db_client;
    db.check_email_duplicate(Some(user_id), &body.email)?;

    app_state.latency.pause().await;

    let mut users = db.load_users().map_err(|e| db_error("loading users", e))?;
    let user = users
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or_else(not_found)?;

    user.name = body.name.trim().to_string();
    user.email = body.email.trim().to_string();
    user.phone_number = body.phone_number;
    user.department = body.department;
    user.student_number = body.student_number;
    if let Some(role) = body.role {
        user.role = role;
    }
    if let Some(status) = body.status {
        user.status = status;
    }
    let updated = user.clone();

    db.save_users(&users).map_err(|e| db_error("saving users", e))?;
    if actor.id == updated.id {
        db.set_session_user(&User {
            password: None,
            ..updated.clone()
        })
        .map_err(|e| db_error("refreshing session", e))?;
    }

    record_activity(app_state, actor, "Updated User Profile", &updated.name);
    tracing::info!("update_user successful");
    Ok(respond(&updated))
}

/// ACTIVE <-> INACTIVE; a pending account becomes active
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn toggle_user_status(
    app_state: &AppState,
    actor: &User,
    user_id: &str,
) -> Result<UserResponseDto, AppError> {
    authorize(app_state, actor, perm::EDIT_USERS)?;
    app_state.latency.pause().await;

    let db = &app_state.db_client;
    let mut users = db.load_users().map_err(|e| db_error("loading users", e))?;
    let user = users
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or_else(not_found)?;
    user.status = match user.status {
        UserStatus::Active => UserStatus::Inactive,
        UserStatus::Inactive | UserStatus::Pending => UserStatus::Active,
    };
    let updated = user.clone();
    db.save_users(&users).map_err(|e| db_error("saving users", e))?;

    record_activity(
        app_state,
        actor,
        "Changed User Status",
        &format!("{} ({})", updated.name, updated.status.to_str()),
    );
    tracing::info!(user_id, status = updated.status.to_str(), "toggle_user_status successful");
    Ok(respond(&updated))
}

/// Sets a new password; own account, or anyone with `edit_users`
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn change_password(
    app_state: &AppState,
    actor: &User,
    user_id: &str,
    body: UserPasswordUpdateDto,
) -> Result<Response, AppError> {
    validate_input(&body, "change_password")?;
    authorize_self_or(app_state, actor, user_id, perm::EDIT_USERS)?;
    let hashed_password =
        password::hash(&body.new_password).map_err(|e| AppError::validation(e.to_string()))?;

    app_state.latency.pause().await;

    let db = &app_state.db_client;
    let mut users = db.load_users().map_err(|e| db_error("loading users", e))?;
    let user = users
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or_else(not_found)?;
    user.password = Some(hashed_password);
    let name = user.name.clone();
    db.save_users(&users).map_err(|e| db_error("saving users", e))?;

    record_activity(app_state, actor, "Changed Password", &name);
    tracing::info!("change_password successful");
    Ok(Response::success(format!("Password updated for {}.", name)))
}

/// Removes an account for good; the signed-in user cannot remove themselves
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn delete_user(
    app_state: &AppState,
    actor: &User,
    user_id: &str,
) -> Result<Response, AppError> {
    authorize(app_state, actor, perm::DELETE_USERS)?;
    if actor.id == user_id {
        return Err(AppError::validation(ErrorMessage::CannotDeleteSelf.to_string()));
    }

    app_state.latency.pause().await;

    let db = &app_state.db_client;
    let mut users = db.load_users().map_err(|e| db_error("loading users", e))?;
    let index = users
        .iter()
        .position(|u| u.id == user_id)
        .ok_or_else(not_found)?;
    let removed = users.remove(index);
    db.save_users(&users).map_err(|e| db_error("saving users", e))?;

    record_activity(app_state, actor, "Deleted User Account", &removed.name);
    tracing::info!(user_id, "delete_user successful");
    Ok(Response::success(format!(
        "Account for {} has been removed.",
        removed.name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ActivityExt;
    use crate::error::ErrorKind;
    use crate::handler::test_support::{admin, faculty, state_with_users, student};

    fn new_student() -> CreateUserDto {
        CreateUserDto {
            name: "Ana Cruz".to_string(),
            email: "ana.cruz@cvsu.edu.ph".to_string(),
            password: "secret123".to_string(),
            role: UserRole::Student,
            student_number: Some("202210001".to_string()),
            department: Some("BS Psychology".to_string()),
            phone_number: None,
        }
    }

    fn profile(user: &User) -> UpdateUserDto {
        UpdateUserDto {
            name: user.name.clone(),
            email: user.email.clone(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn search_filters_by_name_or_email() {
        let state = state_with_users();
        let query = RequestQueryDto {
            search: Some("prof".to_string()),
            ..Default::default()
        };
        let page = list_users(&state, &admin(), query).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.data[0].name, "PROFESSOR");
    }

    #[tokio::test]
    async fn far_out_page_is_empty() {
        let state = state_with_users();
        let query = RequestQueryDto {
            page: Some(usize::MAX),
            limit: Some(2),
            ..Default::default()
        };
        let page = list_users(&state, &admin(), query).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total, 3);
    }

    #[tokio::test]
    async fn students_cannot_list_users() {
        let state = state_with_users();
        let err = list_users(&state, &student(), RequestQueryDto::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn created_user_has_hashed_password_and_is_logged() {
        let state = state_with_users();
        let created = create_user(&state, &admin(), new_student()).await.unwrap();
        assert_eq!(created.data.status, "active");

        let stored = state.db_client.get_user(&created.data.id).unwrap().unwrap();
        assert!(password::compare("secret123", stored.password.as_deref().unwrap()).unwrap());

        let logs = state.db_client.load_logs().unwrap();
        assert_eq!(logs[0].action, "Created User Account: Ana Cruz");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_writing() {
        let state = state_with_users();
        let mut body = new_student();
        body.email = "PROFESSOR@cvsu.edu.ph".to_string();
        let err = create_user(&state, &admin(), body).await.unwrap_err();
        assert_eq!(err.message, ErrorMessage::EmailAlreadyExists.to_string());
        assert_eq!(state.db_client.load_users().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn self_edit_refreshes_session_but_cannot_change_role() {
        let state = state_with_users();
        let me = faculty();

        let mut body = profile(&me);
        body.role = Some(UserRole::Admin);
        let err = update_user(&state, &me, &me.id, body).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);

        let mut body = profile(&me);
        body.name = "Dr. Reyes".to_string();
        update_user(&state, &me, &me.id, body).await.unwrap();
        let session = state.db_client.get_session_user().unwrap().unwrap();
        assert_eq!(session.name, "Dr. Reyes");
    }

    #[tokio::test]
    async fn status_toggles_between_active_and_inactive() {
        let state = state_with_users();
        let first = toggle_user_status(&state, &admin(), "3").await.unwrap();
        assert_eq!(first.data.status, "inactive");
        let second = toggle_user_status(&state, &admin(), "3").await.unwrap();
        assert_eq!(second.data.status, "active");
    }

    #[tokio::test]
    async fn password_change_for_someone_else_needs_edit_users() {
        let state = state_with_users();
        let body = UserPasswordUpdateDto {
            new_password: "newpass1".to_string(),
            new_password_confirm: "newpass1".to_string(),
        };
        let err = change_password(&state, &student(), "2", body.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);

        change_password(&state, &student(), "3", body).await.unwrap();
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let state = state_with_users();
        let err = delete_user(&state, &admin(), "1").await.unwrap_err();
        assert_eq!(err.message, ErrorMessage::CannotDeleteSelf.to_string());

        delete_user(&state, &admin(), "3").await.unwrap();
        assert!(state.db_client.get_user("3").unwrap().is_none());
        assert_eq!(
            delete_user(&state, &admin(), "3").await.unwrap_err().kind,
            ErrorKind::NotFound
        );
    }
}
