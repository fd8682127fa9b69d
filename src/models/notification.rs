use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Record of a successfully dispatched notification. Append-only; the engine
/// never mutates or deletes rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct NotificationRecord {
    pub id: i64,
    pub product_id: i64,
    pub notification_type: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_record_serialization() {
        let record = NotificationRecord {
            id: 7,
            product_id: 3,
            notification_type: "email".to_string(),
            message: "Stock notification sent to buyer@example.com".to_string(),
            sent_at: Utc::now(),
        };

        let serialized = serde_json::to_string(&record).unwrap();
        let deserialized: NotificationRecord = serde_json::from_str(&serialized).unwrap();
        assert_eq!(record, deserialized);
    }
}
