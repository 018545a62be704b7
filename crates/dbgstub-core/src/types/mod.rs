//! # Types
//!
//! Architecture-agnostic types shared by the capability interfaces and the
//! protocol engine.

pub mod address;
pub mod signal;
pub mod state;

// Re-export all public types
pub use address::Address;
pub use signal::Signal;
pub use state::{DebugState, Word, WORD_SIZE};
