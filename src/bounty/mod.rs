//! Bounty records and lifecycle states.
//!
//! A bounty moves `Open → Claimed → Matched → Fulfilled`, with `Cancelled`
//! reachable from any non-terminal state and `Claimed → Open` as the
//! unclaim loop-back. The record keeps the persisted column set stable;
//! secret hashes are stored here but never leave the crate in a view type.

pub mod lifecycle;

pub use lifecycle::{
    BountyFilter, BountyLifecycle, BountyPage, ClaimedBounty, CreateBounty, CreatedBounty,
    MatchBounty,
};

use crate::types::{BountyId, Category, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a bounty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BountyStatus {
    Open,
    Claimed,
    Matched,
    Fulfilled,
    Cancelled,
}

impl BountyStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BountyStatus::Fulfilled | BountyStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BountyStatus::Open => "open",
            BountyStatus::Claimed => "claimed",
            BountyStatus::Matched => "matched",
            BountyStatus::Fulfilled => "fulfilled",
            BountyStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BountyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BountyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(BountyStatus::Open),
            "claimed" => Ok(BountyStatus::Claimed),
            "matched" => Ok(BountyStatus::Matched),
            "fulfilled" => Ok(BountyStatus::Fulfilled),
            "cancelled" => Ok(BountyStatus::Cancelled),
            other => Err(format!("unknown bounty status: {}", other)),
        }
    }
}

/// Persisted bounty record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bounty {
    pub id: BountyId,
    pub poster_name: String,
    pub poster_callback_url: Option<String>,
    pub poster_secret_hash: Option<String>,

    pub title: String,
    pub description: String,
    pub requirements: Option<String>,

    pub budget: f64,

    pub category: Category,
    pub tags: Option<String>,

    pub status: BountyStatus,

    pub claimed_by: Option<String>,
    pub claimer_callback_url: Option<String>,
    pub claimer_secret_hash: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,

    pub matched_service_id: Option<ServiceId>,
    pub matched_acp_agent: Option<String>,
    pub matched_acp_job: Option<String>,
    pub matched_at: Option<DateTime<Utc>>,

    pub acp_job_id: Option<String>,
    pub fulfilled_at: Option<DateTime<Utc>>,

    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bounty {
    /// Status/claimer coherence: claimer fields are set iff the bounty is
    /// in a claimed-or-later non-cancelled state.
    pub fn claimer_fields_consistent(&self) -> bool {
        match self.status {
            BountyStatus::Claimed | BountyStatus::Matched | BountyStatus::Fulfilled => {
                self.claimed_by.is_some()
            }
            BountyStatus::Open | BountyStatus::Cancelled => {
                self.claimed_by.is_none() && self.claimer_secret_hash.is_none()
            }
        }
    }

    /// The free-text haystack used by list search: title, description, tags.
    pub fn search_text(&self) -> String {
        let mut text = format!("{} {}", self.title, self.description);
        if let Some(tags) = &self.tags {
            text.push(' ');
            text.push_str(tags);
        }
        text.to_lowercase()
    }
}
