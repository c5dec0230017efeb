use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    access::perm,
    db::AssessmentExt,
    dtos::{
        AssessmentInputDto, AssessmentResponseDto, PageDto, RequestQueryDto, Response, ReviewDto,
        paginate,
    },
    error::{AppError, ErrorMessage},
    handler::{authorize, authorize_any, db_error, permissions_of, record_activity, validate_input},
    models::{Assessment, AssessmentType, ContentStatus, User},
    utils::text::matches_query,
    workflow::{self, SubjectKey, validate_constraints},
};

fn not_found() -> AppError {
    AppError::not_found(ErrorMessage::AssessmentNotFound.to_string())
}

fn respond(assessment: Assessment) -> AssessmentResponseDto {
    AssessmentResponseDto {
        status: "success".to_string(),
        data: assessment,
    }
}

fn load_assessments(app_state: &AppState) -> Result<Vec<Assessment>, AppError> {
    app_state
        .db_client
        .load_assessments()
        .map_err(|e| db_error("loading assessments", e))
}

fn persist(app_state: &AppState, assessments: &[Assessment]) -> Result<(), AppError> {
    app_state
        .db_client
        .save_assessments(assessments)
        .map_err(|e| db_error("saving assessments", e))
}

/// Paginated list, searched by title and optionally narrowed to one type
#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn list_assessments(
    app_state: &AppState,
    actor: &User,
    query: RequestQueryDto,
    kind: Option<AssessmentType>,
) -> Result<PageDto<Assessment>, AppError> {
    validate_input(&query, "list_assessments")?;
    authorize(app_state, actor, perm::VIEW_ASSESSMENTS)?;

    let rows: Vec<Assessment> = load_assessments(app_state)?
        .into_iter()
        .filter(|a| kind.is_none_or(|k| a.kind == k))
        .filter(|a| matches_query(query.search_term(), &[&a.title]))
        .collect();
    Ok(paginate(rows, &query))
}

pub async fn get_assessment(
    app_state: &AppState,
    actor: &User,
    assessment_id: &str,
) -> Result<AssessmentResponseDto, AppError> {
    authorize(app_state, actor, perm::VIEW_ASSESSMENTS)?;
    let assessment = app_state
        .db_client
        .get_assessment(assessment_id)
        .map_err(|e| db_error("getting assessment", e))?
        .ok_or_else(not_found)?;
    Ok(respond(assessment))
}

/// Live uniqueness check for the editor; reads only, no latency
pub fn check_constraints(app_state: &AppState, body: &AssessmentInputDto) -> Result<(), AppError> {
    let existing = load_assessments(app_state)?;
    let subject = SubjectKey {
        id: body.subject_id.as_deref(),
        name: &body.subject,
    };
    validate_constraints(body.kind, subject, body.topic(), &existing, body.id.as_deref())
}

/// Saves the editor form as a draft or straight into review
///
/// Creating needs `create_assessments` or `create_exams`. Editing needs
/// `edit_assessments`, except that an author holding `create_assessments`
/// may keep editing their own assessment.
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id, title = %body.title))]
pub async fn save_assessment(
    app_state: &AppState,
    actor: &User,
    body: AssessmentInputDto,
    submit: bool,
) -> Result<AssessmentResponseDto, AppError> {
    validate_input(&body, "save_assessment")?;
    if body.kind == AssessmentType::Quiz && body.topic().is_none() {
        return Err(AppError::validation(ErrorMessage::QuizTopicRequired.to_string()));
    }

    let mut assessments = load_assessments(app_state)?;
    let existing = match body.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Some(
            assessments
                .iter()
                .position(|a| a.id == id)
                .ok_or_else(not_found)?,
        ),
        None => None,
    };

    match existing {
        Some(index) => {
            let held = permissions_of(app_state, actor)?;
            let holds = |p: &str| held.iter().any(|h| h == p);
            let own = assessments[index].author_id == actor.id;
            if !(holds(perm::EDIT_ASSESSMENTS) || (own && holds(perm::CREATE_ASSESSMENTS))) {
                authorize(app_state, actor, perm::EDIT_ASSESSMENTS)?;
            }
        }
        None => {
            authorize_any(app_state, actor, &[perm::CREATE_ASSESSMENTS, perm::CREATE_EXAMS])?;
        }
    }

    check_constraints(app_state, &body).inspect_err(|e| {
        tracing::warn!("Assessment constraint violated: {}", e.message);
    })?;

    let status = match (submit, existing) {
        (false, _) => ContentStatus::Draft,
        (true, None) => ContentStatus::Pending,
        (true, Some(index)) => workflow::submit(assessments[index].status)?,
    };

    app_state.latency.pause().await;

    let now = Utc::now();
    let questions: Vec<_> = body
        .questions
        .into_iter()
        .map(|q| q.into_question())
        .collect();
    let topic_id = body.topic_id.filter(|t| !t.trim().is_empty());
    let saved = match existing {
        Some(index) => {
            let assessment = &mut assessments[index];
            assessment.title = body.title.trim().to_string();
            assessment.kind = body.kind;
            assessment.subject = body.subject;
            assessment.subject_id = body.subject_id;
            assessment.topic_id = topic_id;
            assessment.content_id = body.content_id;
            assessment.items = questions.len();
            assessment.questions = questions;
            assessment.time_limit = body.time_limit;
            assessment.schedule_type = body.schedule_type;
            assessment.schedule_date = body.schedule_date;
            assessment.status = status;
            assessment.last_updated = now;
            assessment.clone()
        }
        None => {
            let assessment = Assessment {
                id: Uuid::new_v4().to_string(),
                title: body.title.trim().to_string(),
                kind: body.kind,
                subject: body.subject,
                subject_id: body.subject_id,
                topic_id,
                content_id: body.content_id,
                items: questions.len(),
                time_limit: body.time_limit,
                status,
                schedule_type: body.schedule_type,
                schedule_date: body.schedule_date,
                author_id: actor.id.clone(),
                author_name: actor.name.clone(),
                questions,
                date_created: now,
                last_updated: now,
                revision_notes: vec![],
            };
            assessments.push(assessment.clone());
            assessment
        }
    };
    persist(app_state, &assessments)?;

    let action = if submit {
        "Submitted Assessment"
    } else {
        "Saved Assessment Draft"
    };
    record_activity(app_state, actor, action, &saved.title);
    tracing::info!(assessment_id = %saved.id, items = saved.items, "save_assessment successful");
    Ok(respond(saved))
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn review_assessment(
    app_state: &AppState,
    actor: &User,
    assessment_id: &str,
    body: ReviewDto,
) -> Result<AssessmentResponseDto, AppError> {
    validate_input(&body, "review_assessment")?;
    authorize(app_state, actor, perm::APPROVE_ASSESSMENTS)?;

    let mut assessments = load_assessments(app_state)?;
    let index = assessments
        .iter()
        .position(|a| a.id == assessment_id)
        .ok_or_else(not_found)?;
    let next = workflow::review(assessments[index].status, body.action)?;

    app_state.latency.pause().await;

    let assessment = &mut assessments[index];
    assessment.status = next;
    if let Some(note) = workflow::revision_note(actor, body.note()) {
        assessment.revision_notes.push(note);
    }
    assessment.last_updated = Utc::now();
    let reviewed = assessment.clone();
    persist(app_state, &assessments)?;

    record_activity(
        app_state,
        actor,
        &format!("{} Assessment", body.action.to_str()),
        &reviewed.title,
    );
    tracing::info!(action = body.action.to_str(), "review_assessment successful");
    Ok(respond(reviewed))
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn delete_assessment(
    app_state: &AppState,
    actor: &User,
    assessment_id: &str,
) -> Result<Response, AppError> {
    authorize(app_state, actor, perm::DELETE_ASSESSMENTS)?;

    let mut assessments = load_assessments(app_state)?;
    let index = assessments
        .iter()
        .position(|a| a.id == assessment_id)
        .ok_or_else(not_found)?;

    app_state.latency.pause().await;

    let removed = assessments.remove(index);
    persist(app_state, &assessments)?;

    record_activity(app_state, actor, "Deleted Assessment", &removed.title);
    tracing::info!(assessment_id, "delete_assessment successful");
    Ok(Response::success(format!("\"{}\" has been deleted.", removed.title)))
}
