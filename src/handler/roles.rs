use tracing::instrument;

use crate::{
    AppState, access,
    access::perm,
    db::RoleExt,
    dtos::{RoleListDto, RoleNameDto},
    error::{AppError, ErrorMessage},
    handler::{authorize, db_error, record_activity, validate_input},
    models::{RoleConfig, User},
};

/// Stored role list, or the built-in defaults when nothing was saved yet
fn load_roles(app_state: &AppState) -> Result<(Vec<RoleConfig>, bool), AppError> {
    let stored = app_state
        .db_client
        .load_role_configs()
        .map_err(|e| db_error("loading role configs", e))?;
    Ok(match stored {
        Some(roles) => (roles, false),
        None => (access::default_role_configs(), true),
    })
}

fn position_of(roles: &[RoleConfig], name: &str) -> Result<usize, AppError> {
    roles
        .iter()
        .position(|r| r.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| AppError::not_found(ErrorMessage::RoleNotFound.to_string()))
}

fn ensure_unique(roles: &[RoleConfig], name: &str, except: Option<usize>) -> Result<(), AppError> {
    let taken = roles
        .iter()
        .enumerate()
        .any(|(i, r)| Some(i) != except && r.name.trim().eq_ignore_ascii_case(name.trim()));
    if taken {
        return Err(AppError::validation(ErrorMessage::RoleAlreadyExists.to_string()));
    }
    Ok(())
}

fn ensure_editable(role: &RoleConfig) -> Result<(), AppError> {
    if role.is_system {
        tracing::warn!(role = %role.name, "attempt to alter a system role");
        return Err(AppError::validation(ErrorMessage::SystemRoleProtected.to_string()));
    }
    Ok(())
}

/// Persists the whole list; the first mutation also materializes the
/// defaults
fn persist(app_state: &AppState, roles: &[RoleConfig]) -> Result<(), AppError> {
    app_state
        .db_client
        .save_role_configs(roles)
        .map_err(|e| db_error("saving role configs", e))
}

fn respond(roles: Vec<RoleConfig>, defaults: bool) -> RoleListDto {
    RoleListDto {
        status: "success".to_string(),
        roles,
        defaults,
    }
}

pub async fn list_roles(app_state: &AppState, actor: &User) -> Result<RoleListDto, AppError> {
    authorize(app_state, actor, perm::MANAGE_ROLES)?;
    let (roles, defaults) = load_roles(app_state)?;
    Ok(respond(roles, defaults))
}

/// Adds a custom role with no permissions
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id, role = %body.name))]
pub async fn create_role(
    app_state: &AppState,
    actor: &User,
    body: RoleNameDto,
) -> Result<RoleListDto, AppError> {
    validate_input(&body, "create_role")?;
    authorize(app_state, actor, perm::MANAGE_ROLES)?;

    let (mut roles, _) = load_roles(app_state)?;
    let name = body.name.trim().to_string();
    ensure_unique(&roles, &name, None)?;

    app_state.latency.pause().await;

    roles.push(RoleConfig {
        name: name.clone(),
        permissions: vec![],
        is_system: false,
    });
    persist(app_state, &roles)?;

    record_activity(app_state, actor, "Created Role", &name);
    tracing::info!("create_role successful");
    Ok(respond(roles, false))
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn rename_role(
    app_state: &AppState,
    actor: &User,
    role_name: &str,
    body: RoleNameDto,
) -> Result<RoleListDto, AppError> {
    validate_input(&body, "rename_role")?;
    authorize(app_state, actor, perm::MANAGE_ROLES)?;

    let (mut roles, _) = load_roles(app_state)?;
    let index = position_of(&roles, role_name)?;
    ensure_editable(&roles[index])?;
    let new_name = body.name.trim().to_string();
    ensure_unique(&roles, &new_name, Some(index))?;

    app_state.latency.pause().await;

    let old_name = std::mem::replace(&mut roles[index].name, new_name.clone());
    persist(app_state, &roles)?;

    record_activity(
        app_state,
        actor,
        "Renamed Role",
        &format!("{} -> {}", old_name, new_name),
    );
    tracing::info!("rename_role successful");
    Ok(respond(roles, false))
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn delete_role(
    app_state: &AppState,
    actor: &User,
    role_name: &str,
) -> Result<RoleListDto, AppError> {
    authorize(app_state, actor, perm::MANAGE_ROLES)?;

    let (mut roles, _) = load_roles(app_state)?;
    let index = position_of(&roles, role_name)?;
    ensure_editable(&roles[index])?;

    app_state.latency.pause().await;

    let removed = roles.remove(index);
    persist(app_state, &roles)?;

    record_activity(app_state, actor, "Deleted Role", &removed.name);
    tracing::info!("delete_role successful");
    Ok(respond(roles, false))
}

/// Flips one permission in a role's set
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn toggle_permission(
    app_state: &AppState,
    actor: &User,
    role_name: &str,
    permission: &str,
) -> Result<RoleListDto, AppError> {
    authorize(app_state, actor, perm::MANAGE_ROLES)?;
    if !access::is_known_permission(permission) {
        return Err(AppError::validation(
            ErrorMessage::UnknownPermission(permission.to_string()).to_string(),
        ));
    }

    let (mut roles, _) = load_roles(app_state)?;
    let index = position_of(&roles, role_name)?;

    app_state.latency.pause().await;

    let permissions = &mut roles[index].permissions;
    match permissions.iter().position(|p| p == permission) {
        Some(at) => {
            permissions.remove(at);
        }
        None => permissions.push(permission.to_string()),
    }
    persist(app_state, &roles)?;

    let name = roles[index].name.clone();
    record_activity(app_state, actor, "Updated Role Permissions", &name);
    tracing::info!(role = role_name, permission, "toggle_permission successful");
    Ok(respond(roles, false))
}

/// Grants or revokes every permission of one catalog module at once
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn set_module_permissions(
    app_state: &AppState,
    actor: &User,
    role_name: &str,
    module_id: &str,
    enabled: bool,
) -> Result<RoleListDto, AppError> {
    authorize(app_state, actor, perm::MANAGE_ROLES)?;
    let module = access::module_permissions(module_id).ok_or_else(|| {
        AppError::validation(ErrorMessage::UnknownPermission(module_id.to_string()).to_string())
    })?;

    let (mut roles, _) = load_roles(app_state)?;
    let index = position_of(&roles, role_name)?;

    app_state.latency.pause().await;

    let permissions = &mut roles[index].permissions;
    if enabled {
        for id in module {
            if !permissions.iter().any(|p| p == id) {
                permissions.push(id.to_string());
            }
        }
    } else {
        permissions.retain(|p| !module.iter().any(|id| *id == p.as_str()));
    }
    persist(app_state, &roles)?;

    let name = roles[index].name.clone();
    record_activity(app_state, actor, "Updated Role Permissions", &name);
    tracing::info!(module_id, enabled, "set_module_permissions successful");
    Ok(respond(roles, false))
}

/// Replaces a role's permission set; every id must be in the catalog
#[instrument(skip(app_state, actor, permissions), fields(actor = %actor.id))]
pub async fn save_role_permissions(
    app_state: &AppState,
    actor: &User,
    role_name: &str,
    permissions: Vec<String>,
) -> Result<RoleListDto, AppError> {
    authorize(app_state, actor, perm::MANAGE_ROLES)?;
    if let Some(unknown) = permissions.iter().find(|p| !access::is_known_permission(p)) {
        return Err(AppError::validation(
            ErrorMessage::UnknownPermission(unknown.clone()).to_string(),
        ));
    }

    let (mut roles, _) = load_roles(app_state)?;
    let index = position_of(&roles, role_name)?;

    app_state.latency.pause().await;

    let mut deduped: Vec<String> = Vec::with_capacity(permissions.len());
    for permission in permissions {
        if !deduped.contains(&permission) {
            deduped.push(permission);
        }
    }
    roles[index].permissions = deduped;
    persist(app_state, &roles)?;

    let name = roles[index].name.clone();
    record_activity(app_state, actor, "Updated Role Permissions", &name);
    tracing::info!("save_role_permissions successful");
    Ok(respond(roles, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ActivityExt;
    use crate::error::ErrorKind;
    use crate::handler::{permissions_of, test_support::{admin, faculty, state}};

    fn named(name: &str) -> RoleNameDto {
        RoleNameDto {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn defaults_are_listed_but_not_stored() {
        let state = state();
        let list = list_roles(&state, &admin()).await.unwrap();
        assert!(list.defaults);
        assert_eq!(list.roles.len(), 3);
        assert!(state.db_client.load_role_configs().unwrap().is_none());
    }

    #[tokio::test]
    async fn first_mutation_materializes_defaults() {
        let state = state();
        create_role(&state, &admin(), named("Registrar")).await.unwrap();

        let stored = state.db_client.load_role_configs().unwrap().unwrap();
        let names: Vec<&str> = stored.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Admin", "Faculty", "Student", "Registrar"]);
        assert!(stored[3].permissions.is_empty());
        assert!(!stored[3].is_system);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_case_insensitively() {
        let state = state();
        let err = create_role(&state, &admin(), named("faculty")).await.unwrap_err();
        assert_eq!(err.message, ErrorMessage::RoleAlreadyExists.to_string());
    }

    #[tokio::test]
    async fn system_roles_cannot_be_renamed_or_deleted() {
        let state = state();
        let err = rename_role(&state, &admin(), "Admin", named("Root"))
            .await
            .unwrap_err();
        assert_eq!(err.message, ErrorMessage::SystemRoleProtected.to_string());
        let err = delete_role(&state, &admin(), "student").await.unwrap_err();
        assert_eq!(err.message, ErrorMessage::SystemRoleProtected.to_string());
    }

    #[tokio::test]
    async fn custom_role_can_be_renamed_then_deleted() {
        let state = state();
        create_role(&state, &admin(), named("Registrar")).await.unwrap();
        rename_role(&state, &admin(), "registrar", named("Records Office"))
            .await
            .unwrap();
        let list = delete_role(&state, &admin(), "Records Office").await.unwrap();
        assert_eq!(list.roles.len(), 3);
        assert_eq!(
            delete_role(&state, &admin(), "Registrar").await.unwrap_err().kind,
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn toggling_changes_effective_permissions() {
        let state = state();
        toggle_permission(&state, &admin(), "Faculty", perm::MANAGE_WHITELIST)
            .await
            .unwrap();
        let held = permissions_of(&state, &faculty()).unwrap();
        assert!(held.iter().any(|p| p == perm::MANAGE_WHITELIST));

        toggle_permission(&state, &admin(), "Faculty", perm::MANAGE_WHITELIST)
            .await
            .unwrap();
        let held = permissions_of(&state, &faculty()).unwrap();
        assert!(!held.iter().any(|p| p == perm::MANAGE_WHITELIST));
    }

    #[tokio::test]
    async fn permission_edits_land_in_the_activity_log() {
        let state = state();
        toggle_permission(&state, &admin(), "Faculty", perm::VIEW_LOGS)
            .await
            .unwrap();
        set_module_permissions(&state, &admin(), "Student", "users", true)
            .await
            .unwrap();

        let logs = state.db_client.load_logs().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, "Updated Role Permissions: Student");
        assert_eq!(logs[1].action, "Updated Role Permissions: Faculty");
    }

    #[tokio::test]
    async fn unknown_permission_is_rejected() {
        let state = state();
        let err = toggle_permission(&state, &admin(), "Faculty", "launch_rockets")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(state.db_client.load_role_configs().unwrap().is_none());
    }

    #[tokio::test]
    async fn module_toggle_grants_and_revokes_the_group() {
        let state = state();
        let list = set_module_permissions(&state, &admin(), "Student", "users", true)
            .await
            .unwrap();
        let student = &list.roles[2];
        assert!(student.permissions.iter().any(|p| p == perm::MANAGE_ROLES));

        let list = set_module_permissions(&state, &admin(), "Student", "users", false)
            .await
            .unwrap();
        assert_eq!(
            list.roles[2].permissions,
            vec![perm::VIEW_DASHBOARD.to_string(), perm::VIEW_ANALYTICS.to_string()]
        );
    }

    #[tokio::test]
    async fn saved_permissions_are_deduplicated() {
        let state = state();
        let list = save_role_permissions(
            &state,
            &admin(),
            "Student",
            vec![perm::VIEW_CONTENT.to_string(), perm::VIEW_CONTENT.to_string()],
        )
        .await
        .unwrap();
        assert_eq!(list.roles[2].permissions, vec![perm::VIEW_CONTENT.to_string()]);
    }

    #[tokio::test]
    async fn faculty_cannot_manage_roles() {
        let state = state();
        let err = list_roles(&state, &faculty()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }
}
