//! Review lifecycle shared by content items, curriculum subjects and
//! assessments.
//!
//! ```text
//! (new) --save--> DRAFT --submit--> PENDING --approve--> APPROVED
//!                   ^                  |
//!                   |                  +--revise--> REVISION_REQUESTED --submit--> PENDING
//!                   +------save draft (content) from any status
//! ```
//!
//! Topics additionally use `REMOVAL_PENDING` as a staging state for
//! deletion; see [`topic_tree`].

pub mod assessment_rules;
pub mod topic_tree;

pub use assessment_rules::{SubjectKey, validate_constraints};
pub use topic_tree::{NodeId, TopicTree};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, ErrorMessage};
use crate::models::{ContentStatus, CurriculumSubject, RevisionNote, User};

/// Reviewer decision on a pending submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Approve,
    RequestRevision,
}

impl ReviewAction {
    pub fn target_status(&self) -> ContentStatus {
        match self {
            ReviewAction::Approve => ContentStatus::Approved,
            ReviewAction::RequestRevision => ContentStatus::RevisionRequested,
        }
    }

    pub fn to_str(&self) -> &str {
        match self {
            ReviewAction::Approve => "Approved",
            ReviewAction::RequestRevision => "Requested Revision",
        }
    }
}

/// Status after a review; only pending submissions can be reviewed
pub fn review(current: ContentStatus, action: ReviewAction) -> Result<ContentStatus, AppError> {
    match current {
        ContentStatus::Pending => Ok(action.target_status()),
        _ => Err(AppError::validation(ErrorMessage::NotAwaitingReview.to_string())),
    }
}

/// Status after an author submits a content item or assessment
///
/// An approved item may be resubmitted after further edits.
pub fn submit(current: ContentStatus) -> Result<ContentStatus, AppError> {
    match current {
        ContentStatus::Draft | ContentStatus::RevisionRequested | ContentStatus::Approved => {
            Ok(ContentStatus::Pending)
        }
        ContentStatus::Pending => Err(AppError::validation(ErrorMessage::AlreadyPending.to_string())),
        ContentStatus::RemovalPending => Err(AppError::validation(
            ErrorMessage::InvalidTransition(current.to_str().to_string()).to_string(),
        )),
    }
}

/// Status given to a subject on save: new shells start as drafts, edits to
/// an existing shell always go back to review
pub fn subject_save_status(is_new: bool) -> ContentStatus {
    if is_new {
        ContentStatus::Draft
    } else {
        ContentStatus::Pending
    }
}

/// Status after an explicit submit of a subject shell
///
/// Records without a status predate the workflow and count as drafts.
pub fn submit_subject(current: Option<ContentStatus>) -> Result<ContentStatus, AppError> {
    match current {
        None | Some(ContentStatus::Draft) | Some(ContentStatus::RevisionRequested) => {
            Ok(ContentStatus::Pending)
        }
        Some(ContentStatus::Pending) => {
            Err(AppError::validation(ErrorMessage::AlreadyPending.to_string()))
        }
        Some(other) => Err(AppError::validation(
            ErrorMessage::InvalidTransition(other.to_str().to_string()).to_string(),
        )),
    }
}

/// Builds the feedback entry for a review, if the reviewer wrote anything
pub fn revision_note(reviewer: &User, note: &str) -> Option<RevisionNote> {
    let note = note.trim();
    if note.is_empty() {
        return None;
    }
    Some(RevisionNote {
        id: Uuid::new_v4().to_string(),
        admin_id: reviewer.id.clone(),
        admin_name: reviewer.name.clone(),
        note: note.to_string(),
        timestamp: Utc::now(),
    })
}

/// Applies a review to a subject shell
///
/// Approval rewrites the topic tree: topics marked for removal are dropped
/// with their whole subtree and everything left becomes approved. A
/// revision request leaves the tree untouched so the author still sees the
/// staged removals.
pub fn review_subject(
    subject: &mut CurriculumSubject,
    action: ReviewAction,
    note: Option<RevisionNote>,
) -> Result<(), AppError> {
    let current = subject.status.unwrap_or(ContentStatus::Draft);
    let next = review(current, action)?;

    if action == ReviewAction::Approve {
        let mut tree = TopicTree::from_nested(std::mem::take(&mut subject.topics));
        tree.approve_all();
        subject.topics = tree.into_nested();
    }

    subject.status = Some(next);
    subject.last_updated = Some(Utc::now());
    if let Some(note) = note {
        subject.revision_notes.push(note);
    }
    Ok(())
}

/// Subject is approved and so is every topic beneath it
pub fn is_fully_approved(subject: &CurriculumSubject) -> bool {
    subject.status == Some(ContentStatus::Approved)
        && TopicTree::from_nested(subject.topics.clone()).is_all_approved()
}
