//! Nullable submitter: scripted node responses for testing.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use gateway_mempool::{SubmitAccepted, SubmitError, TransactionSubmitter};
use gateway_types::NodeName;

type Outcome = Result<SubmitAccepted, SubmitError>;

/// A submitter that replays queued outcomes in order.
///
/// Once the queue is empty every submission is accepted. Every call is
/// recorded for later inspection. Payloads marked with [`never_answer`]
/// hang forever, like a node that stopped responding.
///
/// [`never_answer`]: NullSubmitter::never_answer
#[derive(Default)]
pub struct NullSubmitter {
    outcomes: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<(NodeName, Vec<u8>)>>,
    unanswered: Mutex<HashSet<Vec<u8>>>,
}

impl NullSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Queue the outcome of a later submission.
    pub fn push_outcome(&self, outcome: Outcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Submissions of `payload` never complete.
    pub fn never_answer(&self, payload: impl Into<Vec<u8>>) {
        self.unanswered.lock().unwrap().insert(payload.into());
    }

    /// Every `(node, payload)` submitted so far.
    pub fn calls(&self) -> Vec<(NodeName, Vec<u8>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionSubmitter for NullSubmitter {
    async fn submit(&self, node: &NodeName, payload: &[u8]) -> Result<SubmitAccepted, SubmitError> {
        self.calls
            .lock()
            .unwrap()
            .push((node.clone(), payload.to_vec()));
        let unanswered = self.unanswered.lock().unwrap().contains(payload);
        if unanswered {
            return std::future::pending().await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SubmitAccepted::default()))
    }
}
