use serde::{Deserialize, Serialize};

/// Events that can trigger run state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RunEvent {
    /// Orchestration picked the run up
    Start,
    /// Every codex reached a terminal state
    Complete,
    /// Cooperative cancellation finished draining in-flight work
    Cancel,
    /// Administrative override that reopens a finished run
    Reopen,
}

/// Events that can trigger codex state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CodexEvent {
    /// Prerequisites satisfied; section generation begins
    Start,
    /// All sections were attempted; outcome derives from the error count
    Complete {
        errored_sections: usize,
        total_sections: usize,
    },
    /// The codex-level operation failed
    Fail(String),
    /// Administrative reset back to `not_started`
    Reset,
}

/// Events that can trigger section state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SectionEvent {
    /// First attempt, or resumption of an interrupted attempt
    Start,
    /// New attempt after an error
    Retry,
    /// Replace already completed content
    Regenerate,
    /// Generation produced content
    Complete(String),
    /// Generation failed with an error message
    Fail(String),
}

/// Events that can trigger queue item state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum QueueItemEvent {
    Claim,
    Complete,
    Fail(String),
    Cancel,
    Retry,
}

macro_rules! event_names {
    ($ty:ident { $($pat:pat => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Get a string representation of the event type for logging
            pub fn event_type(&self) -> &'static str {
                match self {
                    $($pat => $name,)+
                }
            }
        }
    };
}

event_names!(RunEvent {
    Self::Start => "start",
    Self::Complete => "complete",
    Self::Cancel => "cancel",
    Self::Reopen => "reopen",
});

event_names!(CodexEvent {
    Self::Start => "start",
    Self::Complete { .. } => "complete",
    Self::Fail(_) => "fail",
    Self::Reset => "reset",
});

event_names!(SectionEvent {
    Self::Start => "start",
    Self::Retry => "retry",
    Self::Regenerate => "regenerate",
    Self::Complete(_) => "complete",
    Self::Fail(_) => "fail",
});

event_names!(QueueItemEvent {
    Self::Claim => "claim",
    Self::Complete => "complete",
    Self::Fail(_) => "fail",
    Self::Cancel => "cancel",
    Self::Retry => "retry",
});

impl CodexEvent {
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

impl SectionEvent {
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }
}
