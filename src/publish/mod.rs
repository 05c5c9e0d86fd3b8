//! The all-or-nothing publish gate and its backends.

pub mod http;
pub mod store;

pub use http::HttpPublisher;
pub use store::{PublishedResults, StateStore};

use chrono::Local;
use std::sync::Arc;

use crate::assemble::PickSet;
use crate::error::PublishError;

/// Downstream consumer of a cycle's candidate set.
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    /// Accepts the candidate only if every label holds an exact-length
    /// digit string. A rejection must leave downstream state untouched.
    fn publish(&self, candidate: &PickSet) -> Result<PublishedResults, PublishError>;
}

/// Rejects unless all four labels are valid, naming the ones that are not.
pub fn check_candidate(candidate: &PickSet) -> Result<(), PublishError> {
    let invalid = candidate.invalid_labels();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(PublishError::Rejected { invalid })
    }
}

/// A checked candidate stamped with the current time.
pub(crate) fn accepted(candidate: &PickSet, source: &str) -> Result<PublishedResults, PublishError> {
    check_candidate(candidate)?;
    let field = |v: &Option<String>| v.clone().unwrap_or_default();
    Ok(PublishedResults {
        at: Local::now().to_rfc3339(),
        p2: field(&candidate.p2),
        p3: field(&candidate.p3),
        p4: field(&candidate.p4),
        p5: field(&candidate.p5),
        source: source.to_string(),
    })
}

/// Publishes into a local [`StateStore`].
pub struct StorePublisher {
    store: Arc<StateStore>,
    source: String,
}

impl StorePublisher {
    pub fn new(store: Arc<StateStore>, source: impl Into<String>) -> Self {
        Self {
            store,
            source: source.into(),
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }
}

impl Publisher for StorePublisher {
    fn name(&self) -> &str {
        "store"
    }

    fn publish(&self, candidate: &PickSet) -> Result<PublishedResults, PublishError> {
        let results = accepted(candidate, &self.source)?;
        self.store
            .replace(results.clone())
            .map_err(PublishError::Persist)?;
        Ok(results)
    }
}
