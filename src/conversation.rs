//! Conversation state machine
//!
//! Owns turn-taking, timing and history invariants for one two-agent chat.

pub mod config;
mod export;
pub mod message;
pub mod state;

#[cfg(test)]
mod proptests;

pub use config::{ConfigError, ConversationConfig};
pub use message::{AgentLabel, Message};
pub use state::{ConvStatus, ConversationState, TransitionError};
