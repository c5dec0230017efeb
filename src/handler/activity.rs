use crate::{
    AppState,
    access::perm,
    db::ActivityExt,
    dtos::{PageDto, RequestQueryDto, paginate},
    error::AppError,
    handler::{authorize, db_error, validate_input},
    models::{ActivityLog, User},
    utils::text::matches_query,
};

/// Audit trail, newest first, searched by actor name or action text
pub async fn list_activity(
    app_state: &AppState,
    actor: &User,
    query: RequestQueryDto,
) -> Result<PageDto<ActivityLog>, AppError> {
    validate_input(&query, "list_activity")?;
    authorize(app_state, actor, perm::VIEW_LOGS)?;

    let logs: Vec<ActivityLog> = app_state
        .db_client
        .load_logs()
        .map_err(|e| db_error("loading activity logs", e))?
        .into_iter()
        .filter(|l| matches_query(query.search_term(), &[&l.user_name, &l.action]))
        .collect();
    Ok(paginate(logs, &query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::handler::test_support::{admin, faculty, state};

    #[tokio::test]
    async fn search_covers_actor_and_action() {
        let state = state();
        let db = &state.db_client;
        db.append_log("1", "ADMIN", "Deleted Content", "Freud Reviewer").unwrap();
        db.append_log("2", "PROFESSOR", "Submitted Content", "Jung Reviewer").unwrap();
        db.append_log("2", "PROFESSOR", "Saved Assessment Draft", "Quiz 1").unwrap();

        let query = RequestQueryDto {
            search: Some("professor".to_string()),
            ..Default::default()
        };
        let page = list_activity(&state, &admin(), query).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.data[0].action, "Saved Assessment Draft: Quiz 1");

        let query = RequestQueryDto {
            search: Some("deleted".to_string()),
            ..Default::default()
        };
        let page = list_activity(&state, &admin(), query).await.unwrap();
        assert_eq!(page.data[0].user_name, "ADMIN");
    }

    #[tokio::test]
    async fn logs_need_view_logs() {
        let state = state();
        let err = list_activity(&state, &faculty(), RequestQueryDto::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }
}
