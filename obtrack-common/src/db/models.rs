//! Database models for the obligation catalog

use serde::{Deserialize, Serialize};

/// Tax jurisdiction (state) identified by its two-letter code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Jurisdiction {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub active: bool,
}

/// Obligation type with its default recurrence
///
/// `recurrence` holds the stored frequency text (`mensal`, `trimestral`, ...);
/// `due_day` is the nominal day of month for due dates (1-31).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ObligationType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub recurrence: String,
    pub due_day: i64,
}
