use crate::{
    AppState,
    access::perm,
    db::{ActivityExt, ContentExt, SubjectExt, UserExt},
    dtos::DashboardStatsDto,
    error::AppError,
    handler::{authorize, db_error, subjects},
    models::{ContentStatus, User, UserRole},
};

/// Number of activity entries shown on the overview
pub const RECENT_ACTIVITY: usize = 5;

/// Headline totals for the overview screen
pub async fn dashboard_stats(
    app_state: &AppState,
    actor: &User,
) -> Result<DashboardStatsDto, AppError> {
    authorize(app_state, actor, perm::VIEW_DASHBOARD)?;

    let db = &app_state.db_client;
    let stats = DashboardStatsDto {
        total_students: db
            .get_user_count_by_role(UserRole::Student)
            .map_err(|e| db_error("counting students", e))?,
        pending_approvals: db
            .get_content_count_by_status(ContentStatus::Pending)
            .map_err(|e| db_error("counting pending content", e))?,
        content_materials: db
            .load_content()
            .map_err(|e| db_error("loading content", e))?
            .len(),
        subject_shells: subjects::load_or_seed(app_state)?.len(),
        modular_units: db
            .get_topic_count()
            .map_err(|e| db_error("counting topics", e))?,
        recent_activity: db
            .load_logs()
            .map_err(|e| db_error("loading activity logs", e))?
            .into_iter()
            .take(RECENT_ACTIVITY)
            .collect(),
    };
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{
        content::save_content,
        subjects::{add_module, add_sub_topic},
        test_support::{faculty, state_with_users, student},
    };
    use crate::dtos::ContentInputDto;

    #[tokio::test]
    async fn totals_reflect_every_collection() {
        let state = state_with_users();
        for title in ["Freud", "Jung"] {
            let body = ContentInputDto {
                title: title.to_string(),
                subject: "s-1".to_string(),
                ..Default::default()
            };
            save_content(&state, &faculty(), body, title == "Freud").await.unwrap();
        }
        let module = add_module(&state, &faculty(), "s-2").await.unwrap().data.topics[0]
            .id
            .clone();
        add_sub_topic(&state, &faculty(), "s-2", &module).await.unwrap();

        let stats = dashboard_stats(&state, &student()).await.unwrap();
        assert_eq!(stats.total_students, 1);
        assert_eq!(stats.pending_approvals, 1);
        assert_eq!(stats.content_materials, 2);
        assert_eq!(stats.subject_shells, 4);
        assert_eq!(stats.modular_units, 2);
        assert_eq!(stats.recent_activity.len(), 4);
        assert_eq!(stats.recent_activity[0].action, "Added Sub-Topic: Abnormal Psychology");
    }

    #[tokio::test]
    async fn recent_activity_is_capped() {
        let state = state_with_users();
        for i in 0..8 {
            state
                .db_client
                .append_log("1", "ADMIN", "Updated Topic", &format!("Topic {}", i))
                .unwrap();
        }
        let stats = dashboard_stats(&state, &student()).await.unwrap();
        assert_eq!(stats.recent_activity.len(), RECENT_ACTIVITY);
        assert_eq!(stats.recent_activity[0].action, "Updated Topic: Topic 7");
    }

    #[tokio::test]
    async fn fresh_store_counts_the_core_shells() {
        let state = state_with_users();
        let stats = dashboard_stats(&state, &student()).await.unwrap();
        assert_eq!(stats.subject_shells, 4);
        assert_eq!(stats.modular_units, 0);
    }
}
