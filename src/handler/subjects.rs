use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    access::perm,
    db::SubjectExt,
    dtos::{ReviewDto, SubjectInputDto, SubjectResponseDto, SubjectStatsDto, TopicInputDto},
    error::{AppError, ErrorMessage},
    handler::{authorize, authorize_any, db_error, record_activity, validate_input},
    models::{ContentStatus, CurriculumSubject, Topic, User},
    seed,
    store::keys,
    utils::text::sanitize_rich_text,
    workflow::{self, TopicTree},
};

const EDIT_PERMISSIONS: &[&str] = &[perm::EDIT_SUBJECTS, perm::MANAGE_CURRICULUM];

fn not_found() -> AppError {
    AppError::not_found(ErrorMessage::SubjectNotFound.to_string())
}

fn respond(subject: CurriculumSubject) -> SubjectResponseDto {
    SubjectResponseDto {
        status: "success".to_string(),
        data: subject,
    }
}

/// Loads the subject collection, falling back to the four core shells
///
/// The shells are only held in memory here. They reach storage with the
/// first successful write, so a rejected edit on a fresh store leaves the
/// key absent.
pub(crate) fn load_or_seed(app_state: &AppState) -> Result<Vec<CurriculumSubject>, AppError> {
    let db = &app_state.db_client;
    if !db.has_key(keys::SUBJECTS)? {
        return Ok(seed::initial_subjects());
    }
    db.load_subjects().map_err(|e| db_error("loading subjects", e))
}

fn position_of(subjects: &[CurriculumSubject], subject_id: &str) -> Result<usize, AppError> {
    subjects
        .iter()
        .position(|s| s.id == subject_id)
        .ok_or_else(not_found)
}

pub async fn list_subjects(
    app_state: &AppState,
    actor: &User,
) -> Result<Vec<CurriculumSubject>, AppError> {
    authorize_any(app_state, actor, &[perm::VIEW_SUBJECTS, perm::MANAGE_CURRICULUM])?;
    load_or_seed(app_state)
}

pub async fn get_subject(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
) -> Result<SubjectResponseDto, AppError> {
    authorize_any(app_state, actor, &[perm::VIEW_SUBJECTS, perm::MANAGE_CURRICULUM])?;
    let subjects = load_or_seed(app_state)?;
    let index = position_of(&subjects, subject_id)?;
    Ok(respond(subjects[index].clone()))
}

/// Creates or edits a subject shell's metadata
///
/// A new shell starts as a draft. Saving an existing shell always sends it
/// back to review, whatever its status was.
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id, subject = %body.name))]
pub async fn save_subject(
    app_state: &AppState,
    actor: &User,
    body: SubjectInputDto,
) -> Result<SubjectResponseDto, AppError> {
    validate_input(&body, "save_subject")?;
    authorize_any(app_state, actor, EDIT_PERMISSIONS)?;

    let mut subjects = load_or_seed(app_state)?;
    let existing = match body.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Some(position_of(&subjects, id)?),
        None => None,
    };

    app_state.latency.pause().await;

    let now = Utc::now();
    let (saved, action) = match existing {
        Some(index) => {
            let subject = &mut subjects[index];
            subject.name = body.name.trim().to_string();
            subject.description = body.description;
            subject.color = body.color;
            subject.status = Some(workflow::subject_save_status(false));
            subject.author_name = Some(actor.name.clone());
            subject.last_updated = Some(now);
            (subject.clone(), "Updated Subject Shell")
        }
        None => {
            let subject = CurriculumSubject {
                id: Uuid::new_v4().to_string(),
                name: body.name.trim().to_string(),
                description: body.description,
                color: body.color,
                topics: vec![],
                status: Some(workflow::subject_save_status(true)),
                author_name: Some(actor.name.clone()),
                last_updated: Some(now),
                revision_notes: vec![],
            };
            subjects.push(subject.clone());
            (subject, "Created Subject Shell")
        }
    };

    app_state
        .db_client
        .save_subjects(&subjects)
        .map_err(|e| db_error("saving subjects", e))?;

    record_activity(app_state, actor, action, &saved.name);
    tracing::info!(subject_id = %saved.id, "save_subject successful");
    Ok(respond(saved))
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn submit_subject(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
) -> Result<SubjectResponseDto, AppError> {
    authorize_any(app_state, actor, EDIT_PERMISSIONS)?;

    let mut subjects = load_or_seed(app_state)?;
    let index = position_of(&subjects, subject_id)?;
    let next = workflow::submit_subject(subjects[index].status)?;

    app_state.latency.pause().await;

    let subject = &mut subjects[index];
    subject.status = Some(next);
    subject.last_updated = Some(Utc::now());
    let submitted = subject.clone();
    app_state
        .db_client
        .save_subjects(&subjects)
        .map_err(|e| db_error("saving subjects", e))?;

    record_activity(app_state, actor, "Submitted Subject", &submitted.name);
    tracing::info!("submit_subject successful");
    Ok(respond(submitted))
}

/// Approves or returns a pending subject
///
/// Approval also settles the topic tree: staged removals are dropped and
/// every remaining topic becomes approved.
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn review_subject(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
    body: ReviewDto,
) -> Result<SubjectResponseDto, AppError> {
    validate_input(&body, "review_subject")?;
    authorize(app_state, actor, perm::APPROVE_SUBJECTS)?;

    let mut subjects = load_or_seed(app_state)?;
    let index = position_of(&subjects, subject_id)?;
    let mut reviewed = subjects[index].clone();
    workflow::review_subject(
        &mut reviewed,
        body.action,
        workflow::revision_note(actor, body.note()),
    )?;

    app_state.latency.pause().await;

    subjects[index] = reviewed.clone();
    app_state
        .db_client
        .save_subjects(&subjects)
        .map_err(|e| db_error("saving subjects", e))?;

    record_activity(
        app_state,
        actor,
        &format!("{} Subject", body.action.to_str()),
        &reviewed.name,
    );
    tracing::info!(action = body.action.to_str(), "review_subject successful");
    Ok(respond(reviewed))
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn delete_subject(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
) -> Result<Vec<CurriculumSubject>, AppError> {
    authorize(app_state, actor, perm::MANAGE_CURRICULUM)?;

    let mut subjects = load_or_seed(app_state)?;
    let index = position_of(&subjects, subject_id)?;

    app_state.latency.pause().await;

    let removed = subjects.remove(index);
    app_state
        .db_client
        .save_subjects(&subjects)
        .map_err(|e| db_error("saving subjects", e))?;

    record_activity(app_state, actor, "Deleted Subject Shell", &removed.name);
    tracing::info!("delete_subject successful");
    Ok(subjects)
}

/// Shared path for every topic-tree edit
///
/// The edit runs on an arena built from the stored tree; on success the
/// tree is written back and an approved subject drops to pending, since
/// its curriculum is no longer the one that was approved.
async fn edit_tree<F>(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
    action: &str,
    edit: F,
) -> Result<SubjectResponseDto, AppError>
where
    F: FnOnce(&mut TopicTree) -> Result<(), AppError>,
{
    authorize_any(app_state, actor, EDIT_PERMISSIONS)?;

    let mut subjects = load_or_seed(app_state)?;
    let index = position_of(&subjects, subject_id)?;
    let mut tree = TopicTree::from_nested(subjects[index].topics.clone());
    edit(&mut tree)?;

    app_state.latency.pause().await;

    let subject = &mut subjects[index];
    subject.topics = tree.into_nested();
    if subject.status == Some(ContentStatus::Approved) {
        subject.status = Some(ContentStatus::Pending);
    }
    subject.last_updated = Some(Utc::now());
    let edited = subject.clone();
    app_state
        .db_client
        .save_subjects(&subjects)
        .map_err(|e| db_error("saving subjects", e))?;

    record_activity(app_state, actor, action, &edited.name);
    tracing::info!(subject_id, action, "topic tree edit successful");
    Ok(respond(edited))
}

fn blank_topic(title: &str) -> Topic {
    Topic {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        ..Default::default()
    }
}

/// Appends an empty top-level module
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn add_module(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
) -> Result<SubjectResponseDto, AppError> {
    edit_tree(app_state, actor, subject_id, "Added Module", |tree| {
        tree.add_root(blank_topic("Untitled Module"));
        Ok(())
    })
    .await
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn add_sub_topic(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
    parent_topic_id: &str,
) -> Result<SubjectResponseDto, AppError> {
    edit_tree(app_state, actor, subject_id, "Added Sub-Topic", |tree| {
        tree.add_child(parent_topic_id, blank_topic("New Sub-Topic"))
            .map(|_| ())
    })
    .await
}

/// Edits a topic's title, body and attachment
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn update_topic(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
    topic_id: &str,
    body: TopicInputDto,
) -> Result<SubjectResponseDto, AppError> {
    validate_input(&body, "update_topic")?;
    let description = body.description.as_deref().map(sanitize_rich_text);

    edit_tree(app_state, actor, subject_id, "Updated Topic", |tree| {
        tree.update(topic_id, |topic| {
            topic.title = body.title.trim().to_string();
            topic.description = description;
            topic.format = body.format;
            topic.file_url = body.file_url;
            topic.file_name = body.file_name;
        })
    })
    .await
}

/// Stages a topic and its subtree for deletion at the next approval
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn mark_topic_for_removal(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
    topic_id: &str,
) -> Result<SubjectResponseDto, AppError> {
    edit_tree(app_state, actor, subject_id, "Marked Topic for Removal", |tree| {
        tree.mark_for_removal(topic_id)
    })
    .await
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn restore_topic(
    app_state: &AppState,
    actor: &User,
    subject_id: &str,
    topic_id: &str,
) -> Result<SubjectResponseDto, AppError> {
    edit_tree(app_state, actor, subject_id, "Restored Topic", |tree| {
        tree.restore(topic_id)
    })
    .await
}

/// Topic counts per subject for the repository overview
pub async fn subject_stats(
    app_state: &AppState,
    actor: &User,
) -> Result<Vec<SubjectStatsDto>, AppError> {
    authorize_any(app_state, actor, &[perm::VIEW_SUBJECTS, perm::MANAGE_CURRICULUM])?;

    let stats = load_or_seed(app_state)?
        .iter()
        .map(|subject| {
            let tree = TopicTree::from_nested(subject.topics.clone());
            let count_status = |status: ContentStatus| {
                tree.iter()
                    .filter(|id| tree.topic(*id).status == Some(status))
                    .count()
            };
            SubjectStatsDto {
                subject_id: subject.id.clone(),
                topic_count: tree.len(),
                approved_topic_count: count_status(ContentStatus::Approved),
                removal_pending_count: count_status(ContentStatus::RemovalPending),
                fully_approved: workflow::is_fully_approved(subject),
            }
        })
        .collect();
    Ok(stats)
}
