use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    access::perm,
    db::ContentExt,
    dtos::{
        ContentInputDto, ContentResponseDto, ContentStatsDto, ContentSummaryDto, PageDto,
        RequestQueryDto, Response, ReviewDto, paginate,
    },
    error::{AppError, ErrorMessage},
    handler::{authorize, db_error, record_activity, validate_input},
    models::{ContentFormat, ContentItem, ContentStatus, User, UserRole},
    utils::text::{matches_query, sanitize_rich_text},
    workflow::{self, ReviewAction},
};

fn not_found() -> AppError {
    AppError::not_found(ErrorMessage::ContentNotFound.to_string())
}

fn respond(item: ContentItem) -> ContentResponseDto {
    ContentResponseDto {
        status: "success".to_string(),
        data: item,
    }
}

fn load_items(app_state: &AppState) -> Result<Vec<ContentItem>, AppError> {
    app_state
        .db_client
        .load_content()
        .map_err(|e| db_error("loading content", e))
}

fn persist(app_state: &AppState, items: &[ContentItem]) -> Result<(), AppError> {
    app_state
        .db_client
        .save_content(items)
        .map_err(|e| db_error("saving content", e))
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn list_content(
    app_state: &AppState,
    actor: &User,
    query: RequestQueryDto,
) -> Result<PageDto<ContentSummaryDto>, AppError> {
    validate_input(&query, "list_content")?;
    authorize(app_state, actor, perm::VIEW_CONTENT)?;

    let rows: Vec<ContentSummaryDto> = load_items(app_state)?
        .iter()
        .filter(|i| matches_query(query.search_term(), &[&i.title, &i.author_name]))
        .map(ContentSummaryDto::from_item)
        .collect();
    Ok(paginate(rows, &query))
}

/// Status counters; administrators see the whole library, everyone else
/// only what they authored
pub async fn content_stats(app_state: &AppState, actor: &User) -> Result<ContentStatsDto, AppError> {
    authorize(app_state, actor, perm::VIEW_CONTENT)?;

    let items = load_items(app_state)?;
    let visible: Vec<&ContentItem> = items
        .iter()
        .filter(|i| actor.role == UserRole::Admin || i.author_id == actor.id)
        .collect();
    let count = |status: ContentStatus| visible.iter().filter(|i| i.status == status).count();

    Ok(ContentStatsDto {
        total: visible.len(),
        approved: count(ContentStatus::Approved),
        pending: count(ContentStatus::Pending),
        revision: count(ContentStatus::RevisionRequested),
    })
}

pub async fn get_content(
    app_state: &AppState,
    actor: &User,
    content_id: &str,
) -> Result<ContentResponseDto, AppError> {
    authorize(app_state, actor, perm::VIEW_CONTENT)?;
    let item = app_state
        .db_client
        .get_content_item(content_id)
        .map_err(|e| db_error("getting content", e))?
        .ok_or_else(not_found)?;
    Ok(respond(item))
}

/// Saves the editor form, either as a draft or as a submission
///
/// New items need `create_content`, edits need `edit_content`. A draft
/// save moves any status back to DRAFT; a submission goes to PENDING and
/// bumps the submission counter. Editing keeps the original author.
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id, title = %body.title))]
pub async fn save_content(
    app_state: &AppState,
    actor: &User,
    body: ContentInputDto,
    submit: bool,
) -> Result<ContentResponseDto, AppError> {
    validate_input(&body, "save_content")?;

    let mut items = load_items(app_state)?;
    let existing = match body.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Some(items.iter().position(|i| i.id == id).ok_or_else(not_found)?),
        None => None,
    };
    let required = if existing.is_some() {
        perm::EDIT_CONTENT
    } else {
        perm::CREATE_CONTENT
    };
    authorize(app_state, actor, required)?;

    let current = existing.map(|index| items[index].status);
    let status = match (submit, current) {
        (false, _) => ContentStatus::Draft,
        (true, None) => ContentStatus::Pending,
        (true, Some(current)) => workflow::submit(current)?,
    };

    app_state.latency.pause().await;

    let now = Utc::now();
    let body_html = match body.format {
        ContentFormat::Text => body.content.as_deref().map(sanitize_rich_text),
        ContentFormat::Pdf => None,
    };
    let item = match existing {
        Some(index) => {
            let item = &mut items[index];
            item.title = body.title.trim().to_string();
            item.subject = body.subject;
            item.topic_id = body.topic_id;
            item.kind = body.kind;
            item.format = body.format;
            item.content = body_html;
            item.file_url = body.file_url;
            item.status = status;
            if submit {
                item.submission_count += 1;
            }
            item.last_updated = now;
            item.clone()
        }
        None => {
            let item = ContentItem {
                id: Uuid::new_v4().to_string(),
                title: body.title.trim().to_string(),
                subject: body.subject,
                topic_id: body.topic_id,
                kind: body.kind,
                format: body.format,
                content: body_html,
                file_url: body.file_url,
                status,
                author_id: actor.id.clone(),
                author_name: actor.name.clone(),
                submission_count: u32::from(submit),
                revision_count: 0,
                date_created: now,
                last_updated: now,
                revision_notes: vec![],
            };
            items.push(item.clone());
            item
        }
    };
    persist(app_state, &items)?;

    let action = if submit {
        "Submitted Content"
    } else {
        "Saved Content Draft"
    };
    record_activity(app_state, actor, action, &item.title);
    tracing::info!(content_id = %item.id, status = item.status.to_str(), "save_content successful");
    Ok(respond(item))
}

/// Approves or returns a pending item; a revision request bumps the
/// revision counter
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn review_content(
    app_state: &AppState,
    actor: &User,
    content_id: &str,
    body: ReviewDto,
) -> Result<ContentResponseDto, AppError> {
    validate_input(&body, "review_content")?;
    authorize(app_state, actor, perm::APPROVE_CONTENT)?;

    let mut items = load_items(app_state)?;
    let index = items
        .iter()
        .position(|i| i.id == content_id)
        .ok_or_else(not_found)?;
    let next = workflow::review(items[index].status, body.action)?;

    app_state.latency.pause().await;

    let item = &mut items[index];
    item.status = next;
    if body.action == ReviewAction::RequestRevision {
        item.revision_count += 1;
    }
    if let Some(note) = workflow::revision_note(actor, body.note()) {
        item.revision_notes.push(note);
    }
    item.last_updated = Utc::now();
    let reviewed = item.clone();
    persist(app_state, &items)?;

    record_activity(
        app_state,
        actor,
        &format!("{} Content", body.action.to_str()),
        &reviewed.title,
    );
    tracing::info!(action = body.action.to_str(), "review_content successful");
    Ok(respond(reviewed))
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn delete_content(
    app_state: &AppState,
    actor: &User,
    content_id: &str,
) -> Result<Response, AppError> {
    authorize(app_state, actor, perm::DELETE_CONTENT)?;

    let mut items = load_items(app_state)?;
    let index = items
        .iter()
        .position(|i| i.id == content_id)
        .ok_or_else(not_found)?;

    app_state.latency.pause().await;

    let removed = items.remove(index);
    persist(app_state, &items)?;

    record_activity(app_state, actor, "Deleted Content", &removed.title);
    tracing::info!(content_id, "delete_content successful");
    Ok(Response::success(format!("\"{}\" has been deleted.", removed.title)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ActivityExt;
    use crate::error::ErrorKind;
    use crate::handler::test_support::{admin, faculty, state, student};
    use pretty_assertions::assert_eq;

    fn form(id: Option<&str>, title: &str) -> ContentInputDto {
        ContentInputDto {
            id: id.map(str::to_string),
            title: title.to_string(),
            subject: "s-1".to_string(),
            topic_id: "t-1".to_string(),
            content: Some("<p>The id seeks pleasure.</p><script>alert(1)</script>".to_string()),
            ..Default::default()
        }
    }

    fn review(action: ReviewAction, note: &str) -> ReviewDto {
        ReviewDto {
            action,
            note: Some(note.to_string()),
        }
    }

    #[tokio::test]
    async fn draft_is_sanitized_and_owned_by_author() {
        let state = state();
        let saved = save_content(&state, &faculty(), form(None, "Freud Reviewer"), false)
            .await
            .unwrap()
            .data;
        assert_eq!(saved.status, ContentStatus::Draft);
        assert_eq!(saved.author_id, "2");
        assert_eq!(saved.submission_count, 0);
        let body = saved.content.unwrap();
        assert!(body.contains("The id seeks pleasure."));
        assert!(!body.contains("script"));
    }

    #[tokio::test]
    async fn submission_and_revision_counters_follow_the_workflow() {
        let state = state();
        let id = save_content(&state, &faculty(), form(None, "Freud Reviewer"), true)
            .await
            .unwrap()
            .data
            .id;

        let returned = review_content(
            &state,
            &admin(),
            &id,
            review(ReviewAction::RequestRevision, "Cite the sources"),
        )
        .await
        .unwrap()
        .data;
        assert_eq!(returned.status, ContentStatus::RevisionRequested);
        assert_eq!(returned.revision_count, 1);
        assert_eq!(returned.revision_notes[0].admin_name, "ADMIN");

        let resubmitted = save_content(&state, &faculty(), form(Some(&id), "Freud Reviewer"), true)
            .await
            .unwrap()
            .data;
        assert_eq!(resubmitted.status, ContentStatus::Pending);
        assert_eq!(resubmitted.submission_count, 2);

        let approved = review_content(&state, &admin(), &id, review(ReviewAction::Approve, ""))
            .await
            .unwrap()
            .data;
        assert_eq!(approved.status, ContentStatus::Approved);
        assert_eq!(approved.revision_notes.len(), 1);
    }

    #[tokio::test]
    async fn resubmitting_a_pending_item_is_rejected() {
        let state = state();
        let id = save_content(&state, &faculty(), form(None, "Jung Reviewer"), true)
            .await
            .unwrap()
            .data
            .id;
        let err = save_content(&state, &faculty(), form(Some(&id), "Jung Reviewer"), true)
            .await
            .unwrap_err();
        assert_eq!(err.message, ErrorMessage::AlreadyPending.to_string());
    }

    #[tokio::test]
    async fn edit_by_someone_else_keeps_the_author() {
        let state = state();
        let id = save_content(&state, &faculty(), form(None, "Adler Guide"), false)
            .await
            .unwrap()
            .data
            .id;
        let edited = save_content(&state, &admin(), form(Some(&id), "Adler Guide v2"), false)
            .await
            .unwrap()
            .data;
        assert_eq!(edited.author_name, "PROFESSOR");
        assert_eq!(edited.title, "Adler Guide v2");
    }

    #[tokio::test]
    async fn stats_are_scoped_to_the_author_for_non_admins() {
        let state = state();
        save_content(&state, &faculty(), form(None, "Mine"), true).await.unwrap();
        save_content(&state, &admin(), form(None, "Admin's"), false).await.unwrap();

        let own = content_stats(&state, &faculty()).await.unwrap();
        assert_eq!(
            own,
            ContentStatsDto {
                total: 1,
                approved: 0,
                pending: 1,
                revision: 0
            }
        );
        assert_eq!(content_stats(&state, &admin()).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn search_matches_title_or_author() {
        let state = state();
        save_content(&state, &faculty(), form(None, "Freud Reviewer"), false).await.unwrap();
        save_content(&state, &admin(), form(None, "Skinner Guide"), false).await.unwrap();

        let query = RequestQueryDto {
            search: Some("professor".to_string()),
            ..Default::default()
        };
        let page = list_content(&state, &admin(), query).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].title, "Freud Reviewer");
        assert_eq!(page.data[0].excerpt, "The id seeks pleasure.");
    }

    #[tokio::test]
    async fn delete_needs_permission_and_is_logged() {
        let state = state();
        let id = save_content(&state, &faculty(), form(None, "Freud Reviewer"), false)
            .await
            .unwrap()
            .data
            .id;
        let err = delete_content(&state, &faculty(), &id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);

        delete_content(&state, &admin(), &id).await.unwrap();
        assert_eq!(
            get_content(&state, &admin(), &id).await.unwrap_err().kind,
            ErrorKind::NotFound
        );
        let logs = state.db_client.load_logs().unwrap();
        assert_eq!(logs[0].action, "Deleted Content: Freud Reviewer");
    }

    #[tokio::test]
    async fn students_cannot_author_content() {
        let state = state();
        let err = save_content(&state, &student(), form(None, "Notes"), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }
}
