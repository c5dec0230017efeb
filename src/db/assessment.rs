use super::DBClient;
use crate::error::AppError;
use crate::models::Assessment;
use crate::store::keys;

pub trait AssessmentExt {
    fn load_assessments(&self) -> Result<Vec<Assessment>, AppError>;

    fn save_assessments(&self, assessments: &[Assessment]) -> Result<(), AppError>;

    fn get_assessment(&self, assessment_id: &str) -> Result<Option<Assessment>, AppError>;
}

impl AssessmentExt for DBClient {
    fn load_assessments(&self) -> Result<Vec<Assessment>, AppError> {
        self.load_or_default(keys::ASSESSMENTS)
    }

    fn save_assessments(&self, assessments: &[Assessment]) -> Result<(), AppError> {
        self.save(keys::ASSESSMENTS, assessments)
    }

    fn get_assessment(&self, assessment_id: &str) -> Result<Option<Assessment>, AppError> {
        Ok(self
            .load_assessments()?
            .into_iter()
            .find(|a| a.id == assessment_id))
    }
}
