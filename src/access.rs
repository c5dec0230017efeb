use serde::Serialize;

use crate::error::{AppError, ErrorMessage};
use crate::models::{RoleConfig, UserRole};

/// Permission identifiers
///
/// Stored role configurations refer to these by string, so the values are
/// part of the persisted format.
pub mod perm {
    pub const VIEW_DASHBOARD: &str = "view_dashboard";

    pub const MANAGE_CURRICULUM: &str = "manage_curriculum";
    pub const VIEW_SUBJECTS: &str = "view_subjects";
    pub const EDIT_SUBJECTS: &str = "edit_subjects";
    pub const APPROVE_SUBJECTS: &str = "approve_subjects";

    pub const VIEW_CONTENT: &str = "view_content";
    pub const CREATE_CONTENT: &str = "create_content";
    pub const EDIT_CONTENT: &str = "edit_content";
    pub const DELETE_CONTENT: &str = "delete_content";
    pub const APPROVE_CONTENT: &str = "approve_content";

    pub const VIEW_ASSESSMENTS: &str = "view_assessments";
    pub const CREATE_ASSESSMENTS: &str = "create_assessments";
    pub const EDIT_ASSESSMENTS: &str = "edit_assessments";
    pub const DELETE_ASSESSMENTS: &str = "delete_assessments";
    pub const APPROVE_ASSESSMENTS: &str = "approve_assessments";
    pub const CREATE_EXAMS: &str = "create_exams";

    pub const VIEW_USERS: &str = "view_users";
    pub const EDIT_USERS: &str = "edit_users";
    pub const DELETE_USERS: &str = "delete_users";
    pub const MANAGE_ROLES: &str = "manage_roles";

    pub const MANAGE_WHITELIST: &str = "manage_whitelist";

    pub const VIEW_ANALYTICS: &str = "view_analytics";
    pub const VIEW_STUDENT_ANALYTICS: &str = "view_student_analytics";

    pub const SYSTEM_SETTINGS: &str = "system_settings";
    pub const MANAGE_BACKUP: &str = "manage_backup";
    pub const VIEW_LOGS: &str = "view_logs";
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermissionDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// A group of permissions shown as one row block in the role matrix
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermissionModule {
    pub id: &'static str,
    pub name: &'static str,
    pub actions: &'static [PermissionDef],
}

const fn def(id: &'static str, name: &'static str, description: &'static str) -> PermissionDef {
    PermissionDef {
        id,
        name,
        description,
    }
}

/// The full permission catalog, grouped by owning module
pub const PERMISSION_MODULES: &[PermissionModule] = &[
    PermissionModule {
        id: "dashboard",
        name: "Dashboard",
        actions: &[def(perm::VIEW_DASHBOARD, "View Dashboard", "Access to the main overview and stats")],
    },
    PermissionModule {
        id: "curriculum",
        name: "Curriculum",
        actions: &[
            def(perm::MANAGE_CURRICULUM, "Manage Curriculum", "Can access the psychology core repository and edit topic trees"),
            def(perm::VIEW_SUBJECTS, "View Subjects", "Can browse subject shells and their topics"),
            def(perm::EDIT_SUBJECTS, "Edit Subjects", "Can create subjects and edit topic trees"),
            def(perm::APPROVE_SUBJECTS, "Approve Subjects", "Can approve or return subject curricula"),
        ],
    },
    PermissionModule {
        id: "content",
        name: "Content",
        actions: &[
            def(perm::VIEW_CONTENT, "View Content", "Can read review materials"),
            def(perm::CREATE_CONTENT, "Create Content", "Can draft and submit review materials"),
            def(perm::EDIT_CONTENT, "Edit Content", "Can edit review materials"),
            def(perm::DELETE_CONTENT, "Delete Content", "Can permanently remove review materials"),
            def(perm::APPROVE_CONTENT, "Approve Content", "Can approve or return review materials"),
        ],
    },
    PermissionModule {
        id: "assessments",
        name: "Assessments",
        actions: &[
            def(perm::VIEW_ASSESSMENTS, "View Assessments", "Can read assessments and questions"),
            def(perm::CREATE_ASSESSMENTS, "Create Assessments", "Can draft and submit assessments"),
            def(perm::EDIT_ASSESSMENTS, "Edit Assessments", "Can edit existing assessments"),
            def(perm::DELETE_ASSESSMENTS, "Delete Assessments", "Can remove assessments"),
            def(perm::APPROVE_ASSESSMENTS, "Approve Assessments", "Can approve or return assessments"),
            def(perm::CREATE_EXAMS, "Create Exams", "Can create and schedule assessments"),
        ],
    },
    PermissionModule {
        id: "users",
        name: "Users",
        actions: &[
            def(perm::VIEW_USERS, "View Users", "Can view list of all users"),
            def(perm::EDIT_USERS, "Edit Users", "Can modify user details and status"),
            def(perm::DELETE_USERS, "Delete Users", "Can permanently remove user accounts"),
            def(perm::MANAGE_ROLES, "Manage Roles", "Can edit the role permission matrix"),
        ],
    },
    PermissionModule {
        id: "whitelist",
        name: "Whitelist",
        actions: &[def(perm::MANAGE_WHITELIST, "Manage Whitelist", "Can approve and upload whitelist entries")],
    },
    PermissionModule {
        id: "analytics",
        name: "Analytics",
        actions: &[
            def(perm::VIEW_ANALYTICS, "View Analytics", "Can access student performance reports"),
            def(perm::VIEW_STUDENT_ANALYTICS, "View Student Analytics", "Can drill into a single student's report"),
        ],
    },
    PermissionModule {
        id: "system",
        name: "System",
        actions: &[
            def(perm::SYSTEM_SETTINGS, "System Settings", "Can modify institutional thresholds and theme"),
            def(perm::MANAGE_BACKUP, "Manage System Backups", "Can export and import full system institutional data JSON files"),
            def(perm::VIEW_LOGS, "View Logs", "Can read the activity audit trail"),
        ],
    },
];

/// Fallback set for FACULTY when no role configuration is stored
pub const FACULTY_DEFAULTS: &[&str] = &[
    perm::VIEW_DASHBOARD,
    perm::VIEW_SUBJECTS,
    perm::EDIT_SUBJECTS,
    perm::VIEW_CONTENT,
    perm::CREATE_CONTENT,
    perm::EDIT_CONTENT,
    perm::VIEW_ASSESSMENTS,
    perm::CREATE_ASSESSMENTS,
    perm::VIEW_ANALYTICS,
];

/// Fallback set for STUDENT and for any unrecognised role name
pub const STUDENT_DEFAULTS: &[&str] = &[perm::VIEW_DASHBOARD, perm::VIEW_ANALYTICS];

/// Every permission id in catalog order
pub fn all_permissions() -> Vec<String> {
    PERMISSION_MODULES
        .iter()
        .flat_map(|m| m.actions.iter().map(|a| a.id.to_string()))
        .collect()
}

pub fn is_known_permission(id: &str) -> bool {
    PERMISSION_MODULES
        .iter()
        .any(|m| m.actions.iter().any(|a| a.id == id))
}

/// Permission ids belonging to the catalog module `module_id`
pub fn module_permissions(module_id: &str) -> Option<Vec<&'static str>> {
    PERMISSION_MODULES
        .iter()
        .find(|m| m.id == module_id)
        .map(|m| m.actions.iter().map(|a| a.id).collect())
}

/// Built-in permission table
pub fn default_permissions(role: Option<UserRole>) -> Vec<String> {
    match role {
        Some(UserRole::Admin) => all_permissions(),
        Some(UserRole::Faculty) => FACULTY_DEFAULTS.iter().map(|p| p.to_string()).collect(),
        Some(UserRole::Student) | None => STUDENT_DEFAULTS.iter().map(|p| p.to_string()).collect(),
    }
}

/// Effective permission set for `role_name`
///
/// A stored configuration whose name matches case-insensitively wins and
/// is returned verbatim. Otherwise the built-in table applies; names that
/// are not one of the three built-in roles get the student set.
pub fn resolve_permissions(role_name: &str, configs: Option<&[RoleConfig]>) -> Vec<String> {
    let configured = configs.and_then(|configs| {
        configs
            .iter()
            .find(|c| c.name.trim().eq_ignore_ascii_case(role_name.trim()))
    });

    match configured {
        Some(config) => config.permissions.clone(),
        None => default_permissions(UserRole::parse(role_name)),
    }
}

/// Role list offered when nothing has been stored yet
pub fn default_role_configs() -> Vec<RoleConfig> {
    vec![
        RoleConfig {
            name: "Admin".to_string(),
            permissions: all_permissions(),
            is_system: true,
        },
        RoleConfig {
            name: "Faculty".to_string(),
            permissions: [
                perm::VIEW_DASHBOARD,
                perm::VIEW_SUBJECTS,
                perm::EDIT_SUBJECTS,
                perm::VIEW_CONTENT,
                perm::CREATE_CONTENT,
                perm::EDIT_CONTENT,
                perm::VIEW_ASSESSMENTS,
                perm::CREATE_ASSESSMENTS,
                perm::EDIT_ASSESSMENTS,
                perm::VIEW_ANALYTICS,
                perm::VIEW_STUDENT_ANALYTICS,
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            is_system: true,
        },
        RoleConfig {
            name: "Student".to_string(),
            permissions: STUDENT_DEFAULTS.iter().map(|p| p.to_string()).collect(),
            is_system: true,
        },
    ]
}

/// Sidebar entry gated by a single permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(rename = "requiredPermission")]
    pub required_permission: &'static str,
}

/// Sidebar entries in display order
pub const NAVIGATION_ITEMS: &[NavItem] = &[
    NavItem { id: "dashboard", label: "Dashboard", required_permission: perm::VIEW_DASHBOARD },
    NavItem { id: "subjects", label: "Institutional Repository", required_permission: perm::MANAGE_CURRICULUM },
    NavItem { id: "users", label: "User Management", required_permission: perm::VIEW_USERS },
    NavItem { id: "whitelist", label: "Whitelisting", required_permission: perm::MANAGE_WHITELIST },
    NavItem { id: "assessments", label: "Assessments", required_permission: perm::CREATE_EXAMS },
    NavItem { id: "analytics", label: "Analytics", required_permission: perm::VIEW_ANALYTICS },
    NavItem { id: "security", label: "Security & Logs", required_permission: perm::SYSTEM_SETTINGS },
];

/// Entries of `items` whose required permission is held, in input order
pub fn filter_navigation<'a>(permissions: &[String], items: &'a [NavItem]) -> Vec<&'a NavItem> {
    items
        .iter()
        .filter(|item| permissions.iter().any(|p| p == item.required_permission))
        .collect()
}

/// Permission check used at the top of every guarded handler
pub fn require_permission(permissions: &[String], permission: &str) -> Result<(), AppError> {
    if permissions.iter().any(|p| p == permission) {
        Ok(())
    } else {
        tracing::warn!(permission, "permission denied");
        Err(AppError::permission_denied(ErrorMessage::PermissionDenied.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn ids(items: &[&NavItem]) -> Vec<&'static str> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn admin_without_config_gets_whole_catalog() {
        assert_eq!(resolve_permissions("ADMIN", None), all_permissions());
        assert_eq!(resolve_permissions("admin", Some(&[])), all_permissions());
    }

    #[test]
    fn student_without_config_gets_dashboard_and_analytics() {
        assert_eq!(
            resolve_permissions("STUDENT", None),
            vec!["view_dashboard".to_string(), "view_analytics".to_string()]
        );
    }

    #[test]
    fn faculty_defaults_exclude_delete_and_review() {
        let permissions = resolve_permissions("FACULTY", None);
        assert!(permissions.contains(&perm::EDIT_CONTENT.to_string()));
        assert!(!permissions.contains(&perm::DELETE_CONTENT.to_string()));
        assert!(!permissions.contains(&perm::APPROVE_CONTENT.to_string()));
        assert_eq!(permissions.len(), FACULTY_DEFAULTS.len());
    }

    #[test]
    fn unknown_role_falls_through_to_student_set() {
        assert_eq!(
            resolve_permissions("Registrar", None),
            resolve_permissions("STUDENT", None)
        );
    }

    #[test]
    fn stored_config_is_returned_verbatim_and_matched_case_insensitively() {
        let configs = vec![RoleConfig {
            name: "Faculty".to_string(),
            permissions: vec![perm::MANAGE_WHITELIST.to_string()],
            is_system: true,
        }];
        assert_eq!(
            resolve_permissions("FACULTY", Some(&configs)),
            vec![perm::MANAGE_WHITELIST.to_string()]
        );
        // Unmatched roles still use the built-in table.
        assert_eq!(resolve_permissions("ADMIN", Some(&configs)), all_permissions());
    }

    #[test]
    fn student_navigation_is_dashboard_then_analytics() {
        let permissions = resolve_permissions("STUDENT", None);
        let items = filter_navigation(&permissions, NAVIGATION_ITEMS);
        assert_eq!(ids(&items), vec!["dashboard", "analytics"]);
    }

    #[test]
    fn navigation_preserves_order_and_membership() {
        let permissions = vec![
            perm::SYSTEM_SETTINGS.to_string(),
            perm::VIEW_USERS.to_string(),
            perm::VIEW_DASHBOARD.to_string(),
        ];
        let items = filter_navigation(&permissions, NAVIGATION_ITEMS);
        assert_eq!(ids(&items), vec!["dashboard", "users", "security"]);

        for item in NAVIGATION_ITEMS {
            let present = items.iter().any(|i| i.id == item.id);
            let held = permissions.iter().any(|p| p == item.required_permission);
            assert_eq!(present, held, "{}", item.id);
        }
    }

    #[test]
    fn admin_sees_every_navigation_entry() {
        let items = filter_navigation(&all_permissions(), NAVIGATION_ITEMS);
        assert_eq!(items.len(), NAVIGATION_ITEMS.len());
    }

    #[test]
    fn module_lookup_and_catalog_membership() {
        assert_eq!(
            module_permissions("system"),
            Some(vec![perm::SYSTEM_SETTINGS, perm::MANAGE_BACKUP, perm::VIEW_LOGS])
        );
        assert_eq!(module_permissions("billing"), None);
        assert!(is_known_permission(perm::CREATE_EXAMS));
        assert!(!is_known_permission("launch_rockets"));
    }

    #[test]
    fn guard_rejects_missing_permission() {
        let permissions = resolve_permissions("STUDENT", None);
        assert!(require_permission(&permissions, perm::VIEW_DASHBOARD).is_ok());
        let err = require_permission(&permissions, perm::MANAGE_BACKUP).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }
}
