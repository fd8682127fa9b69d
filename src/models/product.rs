use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A monitored product. Created active; deactivated exactly once, either by a
/// successfully dispatched notification or by an explicit admin action.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Product {
    /// Store-assigned identifier.
    pub id: i64,
    pub name: String,
    /// Unique across all products; enforced at creation.
    pub url: String,
    /// CSS selector locating the stock-status element.
    pub selector: String,
    /// Text that indicates the product is out of stock.
    pub expected_text: String,
    /// Recipient for the restock notification.
    pub email: String,
    pub is_active: bool,
    /// Set after each check attempt, irrespective of result.
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(url(message = "url must be a valid URL"))]
    pub url: String,
    #[validate(length(min = 1, message = "selector is required"))]
    pub selector: String,
    #[validate(length(min = 1, message = "expected_text is required"))]
    pub expected_text: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}
