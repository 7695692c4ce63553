//! ============================================================================
//! Core Types for the Dogking Scoring Client
//! ============================================================================
//! Defines the data structures mirrored from the scoring API: catalog items,
//! users, daily score events, and admin-controlled dates.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `dtype` value marking a custom (event-specific) catalog item.
pub const CUSTOM_DTYPE: i64 = 2;

/// Admin date row id for the scoring (allowed submission) date.
pub const SCORE_DATE_ID: u32 = 1;

/// Admin date row id for the aggregation cutoff date.
pub const CUTOFF_DATE_ID: u32 = 2;

/// One catalog item, immutable for the lifetime of a fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub img: String,
    pub dtype: i64,
    #[serde(default)]
    pub details: ItemDetails,
}

impl Item {
    /// Whether this item belongs to the custom-item pool.
    pub fn is_custom(&self) -> bool {
        self.dtype == CUSTOM_DTYPE
    }
}

/// Facet tags for an item. The upstream catalog does not tag every row,
/// so each field is optional; an untagged item never matches a non-empty
/// facet selection for that category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    /// Element code (1-6).
    #[serde(default)]
    pub zo: Option<u32>,
    /// Weapon type code (1-10).
    #[serde(default)]
    pub bu: Option<u32>,
    /// Acquisition code (1 = normal pool, 2 = premium/seasonal).
    #[serde(default)]
    pub get: Option<u32>,
}

/// A registered participant with their aggregated total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub name: String,
    pub total_score: i64,
}

/// One day's score event for one user, as emitted by the daily feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyScore {
    pub uid: String,
    pub name: String,
    /// ISO date string (`YYYY-MM-DD`).
    pub date: String,
    pub daily_score: i64,
}

/// An admin-controlled date row. Row 1 is the scoring date, row 2 the
/// aggregation cutoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminDate {
    pub id: u32,
    pub date: String,
}

/// Mapping from ISO date (or legacy pool key) to a comma-joined item id
/// list. Server owned; mirrored locally per fetch. Null values from the
/// wire normalize to empty strings.
pub type ScoreMap = BTreeMap<String, String>;

/// Find the date for a given admin row id.
pub fn admin_date<'a>(dates: &'a [AdminDate], id: u32) -> Option<&'a str> {
    dates.iter().find(|d| d.id == id).map(|d| d.date.as_str())
}

/// Error conditions callers branch on. Transport-level failures stay as
/// `anyhow` errors at the call site.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScoreError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("registration rejected: {0}")]
    Registration(String),

    #[error("submissions are closed for {selected}; the scoring date is {allowed}")]
    SubmissionClosed { selected: String, allowed: String },

    #[error("no date selected for submission")]
    NoActiveKey,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("stored credential is malformed")]
    MalformedCredential,
}
