use super::DBClient;
use crate::error::AppError;
use crate::models::{CurriculumSubject, Topic};
use crate::store::keys;

pub trait SubjectExt {
    fn load_subjects(&self) -> Result<Vec<CurriculumSubject>, AppError>;

    fn save_subjects(&self, subjects: &[CurriculumSubject]) -> Result<(), AppError>;

    fn get_subject(&self, subject_id: &str) -> Result<Option<CurriculumSubject>, AppError>;

    /// Topic nodes across every subject, counted recursively
    fn get_topic_count(&self) -> Result<usize, AppError>;
}

impl SubjectExt for DBClient {
    fn load_subjects(&self) -> Result<Vec<CurriculumSubject>, AppError> {
        self.load_or_default(keys::SUBJECTS)
    }

    fn save_subjects(&self, subjects: &[CurriculumSubject]) -> Result<(), AppError> {
        self.save(keys::SUBJECTS, subjects)
    }

    fn get_subject(&self, subject_id: &str) -> Result<Option<CurriculumSubject>, AppError> {
        Ok(self.load_subjects()?.into_iter().find(|s| s.id == subject_id))
    }

    fn get_topic_count(&self) -> Result<usize, AppError> {
        fn count(nodes: &[Topic]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.sub_topics)).sum()
        }

        Ok(self.load_subjects()?.iter().map(|s| count(&s.topics)).sum())
    }
}
