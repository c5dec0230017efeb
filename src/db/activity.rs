use chrono::Utc;
use uuid::Uuid;

use super::DBClient;
use crate::error::AppError;
use crate::models::ActivityLog;
use crate::store::keys;

/// Audit trail operations
pub trait ActivityExt {
    /// Entries newest first
    fn load_logs(&self) -> Result<Vec<ActivityLog>, AppError>;

    /// Prepends `"{action}: {entity_name}"` and evicts entries beyond the
    /// configured capacity, oldest first
    fn append_log(
        &self,
        user_id: &str,
        user_name: &str,
        action: &str,
        entity_name: &str,
    ) -> Result<ActivityLog, AppError>;
}

impl ActivityExt for DBClient {
    fn load_logs(&self) -> Result<Vec<ActivityLog>, AppError> {
        self.load_or_default(keys::ACTIVITY_LOGS)
    }

    fn append_log(
        &self,
        user_id: &str,
        user_name: &str,
        action: &str,
        entity_name: &str,
    ) -> Result<ActivityLog, AppError> {
        let entry = ActivityLog {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            action: format!("{}: {}", action, entity_name),
            timestamp: Utc::now(),
        };

        let mut logs = self.load_logs()?;
        logs.insert(0, entry.clone());
        logs.truncate(self.log_capacity());
        self.save(keys::ACTIVITY_LOGS, &logs)?;

        tracing::debug!(action = %entry.action, "activity recorded");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn log_keeps_only_the_most_recent_entries() {
        let db = DBClient::new(MemoryStore::new());
        for i in 0..205 {
            db.append_log("1", "ADMIN", "Updated Subject Shell", &format!("Subject {}", i))
                .unwrap();
        }

        let logs = db.load_logs().unwrap();
        assert_eq!(logs.len(), 200);
        assert_eq!(logs[0].action, "Updated Subject Shell: Subject 204");
        assert_eq!(logs[199].action, "Updated Subject Shell: Subject 5");
        assert!(logs.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn capacity_is_configurable() {
        let db = DBClient::new(MemoryStore::new()).with_log_capacity(3);
        for i in 0..5 {
            db.append_log("1", "ADMIN", "Deleted Content", &i.to_string()).unwrap();
        }
        let actions: Vec<String> = db.load_logs().unwrap().into_iter().map(|l| l.action).collect();
        assert_eq!(
            actions,
            vec!["Deleted Content: 4", "Deleted Content: 3", "Deleted Content: 2"]
        );
    }
}
