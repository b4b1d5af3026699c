//! Generation history domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NotypeError;

/// Generation mode a history record was produced with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Natural,
    Fluency,
    Academic,
    Creative,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Natural,
        Category::Fluency,
        Category::Academic,
        Category::Creative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Natural => "natural",
            Category::Fluency => "fluency",
            Category::Academic => "academic",
            Category::Creative => "creative",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = NotypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| NotypeError::Validation {
                message: format!("unknown category: {s}"),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub payload_in: String,
    pub payload_out: String,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    /// Per-account insertion counter; breaks `created_at` ties.
    pub seq: u64,
}

#[derive(Debug, Clone)]
pub struct CreateHistoryRecord {
    pub account_id: Uuid,
    pub payload_in: String,
    pub payload_out: String,
    pub category: Category,
}
