use serde::{Deserialize, Serialize};
use std::fmt;

/// Generate `Display` and `FromStr` for a snake_case state enum.
macro_rules! state_strings {
    ($ty:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text),)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("Invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// Lifecycle of one subject's generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Submitted, orchestration not yet started
    #[default]
    Pending,
    /// Orchestration loop is driving codexes
    Generating,
    /// Every codex reached a terminal state
    Completed,
    /// Stopped by cooperative cancellation
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

state_strings!(RunState, "run state", {
    Pending => "pending",
    Generating => "generating",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// Lifecycle of a run-scoped codex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodexState {
    #[default]
    NotStarted,
    Generating,
    /// All sections completed
    Ready,
    /// Some, but not all, sections errored
    ReadyWithErrors,
    /// The codex-level operation failed
    Failed,
}

impl CodexState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::ReadyWithErrors | Self::Failed)
    }

    /// Check if this codex unblocks codexes that list it as a prerequisite
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Ready | Self::ReadyWithErrors)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Generating)
    }
}

state_strings!(CodexState, "codex state", {
    NotStarted => "not_started",
    Generating => "generating",
    Ready => "ready",
    ReadyWithErrors => "ready_with_errors",
    Failed => "failed",
});

/// Lifecycle of one generated section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    #[default]
    Pending,
    Generating,
    Completed,
    Error,
}

impl SectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Sections that still need a generation attempt
    pub fn needs_generation(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

state_strings!(SectionState, "section state", {
    Pending => "pending",
    Generating => "generating",
    Completed => "completed",
    Error => "error",
});

/// Lifecycle of an administrative queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl QueueItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Deletion is only allowed once an item can no longer change on its own
    pub fn can_delete(&self) -> bool {
        self.is_terminal()
    }
}

state_strings!(QueueItemState, "queue item state", {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});
