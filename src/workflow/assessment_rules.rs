use crate::error::{AppError, ErrorMessage};
use crate::models::{Assessment, AssessmentType};

/// The subject an assessment belongs to, as the editor knows it
///
/// Older records only carry a display name, newer ones an id as well, so
/// both are compared against both fields of every stored assessment.
#[derive(Debug, Clone, Copy)]
pub struct SubjectKey<'a> {
    pub id: Option<&'a str>,
    pub name: &'a str,
}

impl<'a> SubjectKey<'a> {
    pub fn of(assessment: &'a Assessment) -> Self {
        SubjectKey {
            id: assessment.subject_id.as_deref(),
            name: &assessment.subject,
        }
    }

    fn identifiers(&self) -> impl Iterator<Item = &'a str> {
        std::iter::once(self.name)
            .chain(self.id)
            .filter(|s| !s.trim().is_empty())
    }

    fn matches(&self, other: &Assessment) -> bool {
        self.identifiers().any(|key| {
            other.subject == key || other.subject_id.as_deref() == Some(key)
        })
    }
}

/// Uniqueness rules for assessments
///
/// - one Pre-Assessment and one Post-Assessment per subject
/// - one Quiz per (subject, topic)
///
/// The assessment being edited (`editing_id`) is ignored. A Quiz without a
/// topic does not conflict with anything here; saving it is rejected
/// separately.
pub fn validate_constraints(
    kind: AssessmentType,
    subject: SubjectKey<'_>,
    topic_id: Option<&str>,
    existing: &[Assessment],
    editing_id: Option<&str>,
) -> Result<(), AppError> {
    if subject.identifiers().next().is_none() {
        return Ok(());
    }

    let mut others = existing
        .iter()
        .filter(|a| Some(a.id.as_str()) != editing_id)
        .filter(|a| a.kind == kind && subject.matches(a));

    match kind {
        AssessmentType::PreAssessment | AssessmentType::PostAssessment => {
            if others.next().is_some() {
                let message = if kind == AssessmentType::PreAssessment {
                    ErrorMessage::DuplicatePreAssessment
                } else {
                    ErrorMessage::DuplicatePostAssessment
                };
                return Err(AppError::validation(message.to_string()));
            }
        }
        AssessmentType::Quiz => {
            let Some(topic_id) = topic_id.filter(|t| !t.trim().is_empty()) else {
                return Ok(());
            };
            if others.any(|a| a.topic_id.as_deref() == Some(topic_id)) {
                return Err(AppError::validation(ErrorMessage::DuplicateQuiz.to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentStatus, ScheduleType};
    use chrono::Utc;

    fn assessment(
        id: &str,
        kind: AssessmentType,
        subject: &str,
        subject_id: Option<&str>,
        topic_id: Option<&str>,
    ) -> Assessment {
        Assessment {
            id: id.to_string(),
            title: format!("Exam {}", id),
            kind,
            subject: subject.to_string(),
            subject_id: subject_id.map(str::to_string),
            topic_id: topic_id.map(str::to_string),
            content_id: None,
            items: 0,
            time_limit: 60,
            status: ContentStatus::Draft,
            schedule_type: ScheduleType::Flexible,
            schedule_date: None,
            author_id: "2".to_string(),
            author_name: "PROFESSOR".to_string(),
            questions: vec![],
            date_created: Utc::now(),
            last_updated: Utc::now(),
            revision_notes: vec![],
        }
    }

    fn key<'a>(id: Option<&'a str>, name: &'a str) -> SubjectKey<'a> {
        SubjectKey { id, name }
    }

    #[test]
    fn second_pre_assessment_is_rejected_by_id_or_name() {
        let existing = vec![assessment(
            "as-1",
            AssessmentType::PreAssessment,
            "Abnormal Psychology",
            Some("s-2"),
            None,
        )];

        let by_id = validate_constraints(
            AssessmentType::PreAssessment,
            key(Some("s-2"), ""),
            None,
            &existing,
            None,
        );
        assert_eq!(
            by_id.unwrap_err().message,
            "A Pre-Assessment already exists for this subject."
        );

        let by_name = validate_constraints(
            AssessmentType::PreAssessment,
            key(None, "Abnormal Psychology"),
            None,
            &existing,
            None,
        );
        assert!(by_name.is_err());

        // Post-Assessment for the same subject is a different slot.
        assert!(
            validate_constraints(AssessmentType::PostAssessment, key(Some("s-2"), ""), None, &existing, None)
                .is_ok()
        );
    }

    #[test]
    fn editing_the_existing_one_is_allowed() {
        let existing = vec![assessment("as-1", AssessmentType::PostAssessment, "s-1", None, None)];
        assert!(
            validate_constraints(
                AssessmentType::PostAssessment,
                key(None, "s-1"),
                None,
                &existing,
                Some("as-1"),
            )
            .is_ok()
        );
    }

    #[test]
    fn quiz_is_unique_per_topic() {
        let existing = vec![assessment(
            "as-1",
            AssessmentType::Quiz,
            "Theories of Personality",
            Some("s-1"),
            Some("t-1"),
        )];

        let same_topic =
            validate_constraints(AssessmentType::Quiz, key(Some("s-1"), ""), Some("t-1"), &existing, None);
        assert_eq!(
            same_topic.unwrap_err().message,
            "A Quiz already exists for this specific topic."
        );

        assert!(
            validate_constraints(AssessmentType::Quiz, key(Some("s-1"), ""), Some("t-2"), &existing, None)
                .is_ok()
        );
        assert!(
            validate_constraints(AssessmentType::Quiz, key(Some("s-3"), ""), Some("t-1"), &existing, None)
                .is_ok()
        );
    }

    #[test]
    fn quiz_without_topic_is_not_a_conflict() {
        let existing = vec![assessment("as-1", AssessmentType::Quiz, "s-1", None, None)];
        assert!(validate_constraints(AssessmentType::Quiz, key(None, "s-1"), None, &existing, None).is_ok());
        assert!(validate_constraints(AssessmentType::Quiz, key(None, "s-1"), Some(""), &existing, None).is_ok());
    }

    #[test]
    fn blank_subject_checks_nothing() {
        let existing = vec![assessment("as-1", AssessmentType::PreAssessment, "", None, None)];
        assert!(
            validate_constraints(AssessmentType::PreAssessment, key(None, ""), None, &existing, None).is_ok()
        );
    }
}
