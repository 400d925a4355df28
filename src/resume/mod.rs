//! Checkpoint payloads and persistence

pub mod checkpoint;
pub mod store;

pub use checkpoint::{CheckpointDetails, CheckpointError, CheckpointPayload, CheckpointPhase};
pub use store::{CheckpointLog, FileCheckpointStore};
