// src/models/level.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::DEFAULT_QUESTIONS_COUNT;

/// Represents the 'levels' table in the database.
/// Reference data: a themed set of questions, e.g. one book.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Level {
    pub id: i64,

    pub name: String,

    pub description: Option<String>,

    /// Position in the play order.
    pub order_number: i32,

    /// Number of questions a full run of this level asks.
    pub questions_count: i32,

    pub is_active: bool,
}

/// DTO for inserting a level (seeding, admin tooling).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLevel {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub order_number: i32,
    #[validate(range(min = 0))]
    pub questions_count: i32,
}

impl NewLevel {
    pub fn new(name: &str, description: &str, order_number: i32) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            order_number,
            questions_count: DEFAULT_QUESTIONS_COUNT,
        }
    }

    pub fn with_questions_count(mut self, questions_count: i32) -> Self {
        self.questions_count = questions_count;
        self
    }
}
