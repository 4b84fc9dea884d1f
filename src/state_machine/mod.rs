// State machine module for generation orchestration
//
// Each persisted entity (run, codex, section, queue item) has an explicit
// state enum, an event enum and an exhaustive transition function. Writers
// go through `apply` so an illegal transition is rejected before it reaches
// the store.

pub mod codex_state_machine;
pub mod errors;
pub mod events;
pub mod queue_state_machine;
pub mod run_state_machine;
pub mod section_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use codex_state_machine::CodexStateMachine;
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{CodexEvent, QueueItemEvent, RunEvent, SectionEvent};
pub use queue_state_machine::QueueItemStateMachine;
pub use run_state_machine::RunStateMachine;
pub use section_state_machine::SectionStateMachine;
pub use states::{CodexState, QueueItemState, RunState, SectionState};
