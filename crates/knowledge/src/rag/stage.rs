//! Chat request lifecycle.

use factrag_core::AppError;
use serde::Serialize;
use std::fmt;

/// Where a chat request currently is. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStage {
    Received,
    Embedding,
    Searching,
    Filtering,
    Resolving,
    Prompting,
    Generating,
    Completed,
    Failed,
}

impl ChatStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Embedding => "embedding",
            Self::Searching => "searching",
            Self::Filtering => "filtering",
            Self::Resolving => "resolving",
            Self::Prompting => "prompting",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ChatStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records stage transitions for one request and logs them.
#[derive(Debug)]
pub struct StageTracker {
    current: ChatStage,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: ChatStage::Received,
        }
    }

    pub fn current(&self) -> ChatStage {
        self.current
    }

    /// Move to `next`. Ignored once the request has finished.
    pub fn advance(&mut self, next: ChatStage) {
        if self.current.is_terminal() {
            tracing::warn!(from = %self.current, to = %next, "Ignoring transition after finish");
            return;
        }
        tracing::debug!(from = %self.current, to = %next, "Chat stage");
        self.current = next;
    }

    /// Record a failure in the current stage and hand the error back.
    pub fn fail(&mut self, error: AppError) -> AppError {
        if !self.current.is_terminal() {
            tracing::error!(stage = %self.current, error = %error, "Chat failed");
            self.current = ChatStage::Failed;
        }
        error
    }

    pub fn complete(&mut self) {
        self.advance(ChatStage::Completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut tracker = StageTracker::new();
        assert_eq!(tracker.current(), ChatStage::Received);

        for stage in [
            ChatStage::Embedding,
            ChatStage::Searching,
            ChatStage::Filtering,
            ChatStage::Resolving,
            ChatStage::Prompting,
            ChatStage::Generating,
        ] {
            tracker.advance(stage);
            assert_eq!(tracker.current(), stage);
        }

        tracker.complete();
        assert_eq!(tracker.current(), ChatStage::Completed);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut tracker = StageTracker::new();
        tracker.advance(ChatStage::Searching);

        let err = tracker.fail(AppError::VectorIndex("unreachable".to_string()));
        assert!(matches!(err, AppError::VectorIndex(_)));
        assert_eq!(tracker.current(), ChatStage::Failed);

        tracker.advance(ChatStage::Filtering);
        assert_eq!(tracker.current(), ChatStage::Failed);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ChatStage::Generating.to_string(), "generating");
        assert!(ChatStage::Completed.is_terminal());
        assert!(!ChatStage::Received.is_terminal());
    }
}
