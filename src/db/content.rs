use super::DBClient;
use crate::error::AppError;
use crate::models::{ContentItem, ContentStatus};
use crate::store::keys;

pub trait ContentExt {
    fn load_content(&self) -> Result<Vec<ContentItem>, AppError>;

    fn save_content(&self, items: &[ContentItem]) -> Result<(), AppError>;

    fn get_content_item(&self, content_id: &str) -> Result<Option<ContentItem>, AppError>;

    /// Number of items currently in `status`
    fn get_content_count_by_status(&self, status: ContentStatus) -> Result<usize, AppError>;
}

impl ContentExt for DBClient {
    fn load_content(&self) -> Result<Vec<ContentItem>, AppError> {
        self.load_or_default(keys::CONTENT)
    }

    fn save_content(&self, items: &[ContentItem]) -> Result<(), AppError> {
        self.save(keys::CONTENT, items)
    }

    fn get_content_item(&self, content_id: &str) -> Result<Option<ContentItem>, AppError> {
        Ok(self.load_content()?.into_iter().find(|c| c.id == content_id))
    }

    fn get_content_count_by_status(&self, status: ContentStatus) -> Result<usize, AppError> {
        Ok(self
            .load_content()?
            .iter()
            .filter(|c| c.status == status)
            .count())
    }
}
