//! Guards admin writes against duplicate submissions
//!
//! Every admin form embeds a random submission token. Before a write reaches the
//! backend, the handler claims `(token, action)`:
//!
//! - a claim already in flight rejects the duplicate with [SubmissionError::InFlight]
//! - a claim whose write succeeded stays consumed for [CONSUMED_TTL] and rejects late
//!   duplicates with [SubmissionError::AlreadyConsumed]
//! - a [Claim] dropped without [Claim::consume] is released, so a failed write can be
//!   retried with the same form

use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

use axum::http::StatusCode;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use serde_json::json;

use crate::error::CasebookError;

pub const CONSUMED_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum GuardedAction {
    Save,
    Upload,
    Delete,
}

#[derive(Debug, Clone, Copy)]
enum ClaimState {
    InFlight,
    Consumed(Instant),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("This form is already being submitted")]
    InFlight { action: GuardedAction },
    #[error("This form was already submitted")]
    AlreadyConsumed { action: GuardedAction },
    #[error("The form is missing its submission token, reload the page and try again")]
    MissingToken,
}

impl CasebookError for SubmissionError {
    fn get_status(&self) -> StatusCode {
        match self {
            SubmissionError::InFlight { .. } | SubmissionError::AlreadyConsumed { .. } => {
                StatusCode::CONFLICT
            }
            SubmissionError::MissingToken => StatusCode::BAD_REQUEST,
        }
    }

    fn get_type(&self) -> &str {
        match self {
            SubmissionError::InFlight { .. } => "casebook:submission:InFlight",
            SubmissionError::AlreadyConsumed { .. } => "casebook:submission:AlreadyConsumed",
            SubmissionError::MissingToken => "casebook:submission:MissingToken",
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            SubmissionError::InFlight { action } | SubmissionError::AlreadyConsumed { action } => {
                HashMap::from([("action".to_owned(), json!(action.to_string()))])
            }
            SubmissionError::MissingToken => Default::default(),
        }
    }
}

#[derive(Debug)]
pub struct SubmissionGuard {
    claims: DashMap<(String, GuardedAction), ClaimState>,
    consumed_ttl: Duration,
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::new(CONSUMED_TTL)
    }
}

impl SubmissionGuard {
    pub fn new(consumed_ttl: Duration) -> Self {
        Self {
            claims: DashMap::new(),
            consumed_ttl,
        }
    }

    fn purge_expired(&self) {
        let ttl = self.consumed_ttl;
        self.claims.retain(|_, state| match state {
            ClaimState::InFlight => true,
            ClaimState::Consumed(at) => at.elapsed() < ttl,
        });
    }

    pub fn claim(&self, token: &str, action: GuardedAction) -> Result<Claim<'_>, SubmissionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SubmissionError::MissingToken);
        }
        self.purge_expired();
        let key = (token.to_owned(), action);
        match self.claims.entry(key.clone()) {
            Entry::Occupied(entry) => match *entry.get() {
                ClaimState::InFlight => {
                    tracing::warn!(%action, "duplicate submission rejected while in flight");
                    Err(SubmissionError::InFlight { action })
                }
                ClaimState::Consumed(_) => {
                    tracing::info!(%action, "late duplicate of a completed submission");
                    Err(SubmissionError::AlreadyConsumed { action })
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(ClaimState::InFlight);
                Ok(Claim {
                    guard: self,
                    key: Some(key),
                })
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.claims.len()
    }
}

/// An in flight submission. Released on drop unless consumed.
#[derive(Debug)]
#[must_use]
pub struct Claim<'a> {
    guard: &'a SubmissionGuard,
    key: Option<(String, GuardedAction)>,
}

impl Claim<'_> {
    /// Marks the submission as done: duplicates are rejected until it expires
    pub fn consume(mut self) {
        if let Some(key) = self.key.take() {
            self.guard
                .claims
                .insert(key, ClaimState::Consumed(Instant::now()));
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.guard.claims.remove(&key);
        }
    }
}
