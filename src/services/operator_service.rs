use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::models::placement::{DestinationDecision, NameProposal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameDecision {
    Accept(String),
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateDecision {
    Proceed,
    Skip,
}

/// The decisions a human makes while a document is triaged. Flows await
/// these on the interactive context; worker threads never do.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn review_name(&self, proposal: &NameProposal) -> NameDecision;

    async fn review_duplicate(&self, filename: &str, matches: &[PathBuf]) -> DuplicateDecision;

    /// Folder picker rooted at `root`; `None` cancels.
    async fn choose_destination(&self, root: &Path, filename: &str) -> Option<PathBuf>;

    async fn confirm_move(&self, decision: &DestinationDecision) -> bool;
}

/// One pending question for the operator desk, with the slot for its answer.
#[derive(Debug)]
pub enum DecisionRequest {
    ReviewName {
        proposal: NameProposal,
        reply: oneshot::Sender<NameDecision>,
    },
    ReviewDuplicate {
        filename: String,
        matches: Vec<PathBuf>,
        reply: oneshot::Sender<DuplicateDecision>,
    },
    ChooseDestination {
        root: PathBuf,
        filename: String,
        reply: oneshot::Sender<Option<PathBuf>>,
    },
    ConfirmMove {
        decision: DestinationDecision,
        reply: oneshot::Sender<bool>,
    },
}

/// [`Operator`] that forwards every question over a channel to whatever
/// front end owns the receiving side. A vanished front end reads as
/// abandonment.
#[derive(Debug, Clone)]
pub struct ChannelOperator {
    tx: mpsc::Sender<DecisionRequest>,
}

pub fn decision_channel() -> (ChannelOperator, mpsc::Receiver<DecisionRequest>) {
    // One question at a time is ever outstanding; a little slack is enough.
    let (tx, rx) = mpsc::channel(4);
    (ChannelOperator { tx }, rx)
}

impl ChannelOperator {
    async fn ask<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> DecisionRequest) -> Option<T> {
        let (reply, answer) = oneshot::channel();
        if self.tx.send(build(reply)).await.is_err() {
            tracing::warn!("operator desk is gone; treating as abandon");
            return None;
        }
        answer.await.ok()
    }
}

#[async_trait]
impl Operator for ChannelOperator {
    async fn review_name(&self, proposal: &NameProposal) -> NameDecision {
        let proposal = proposal.clone();
        self.ask(|reply| DecisionRequest::ReviewName { proposal, reply })
            .await
            .unwrap_or(NameDecision::Skip)
    }

    async fn review_duplicate(&self, filename: &str, matches: &[PathBuf]) -> DuplicateDecision {
        let filename = filename.to_string();
        let matches = matches.to_vec();
        self.ask(|reply| DecisionRequest::ReviewDuplicate {
            filename,
            matches,
            reply,
        })
        .await
        .unwrap_or(DuplicateDecision::Skip)
    }

    async fn choose_destination(&self, root: &Path, filename: &str) -> Option<PathBuf> {
        let root = root.to_path_buf();
        let filename = filename.to_string();
        self.ask(|reply| DecisionRequest::ChooseDestination {
            root,
            filename,
            reply,
        })
        .await
        .flatten()
    }

    async fn confirm_move(&self, decision: &DestinationDecision) -> bool {
        let decision = decision.clone();
        self.ask(|reply| DecisionRequest::ConfirmMove { decision, reply })
            .await
            .unwrap_or(false)
    }
}
