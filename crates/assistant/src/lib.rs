//! AI chat assistant for schema editing.
//!
//! [`client`] talks to the hosted model, [`parse`] decodes its (untrusted)
//! output, and [`turn::run_turn`] wires one chat exchange into a session's
//! conversation and schema store.

pub mod client;
pub mod config;
pub mod parse;
pub mod prompt;
pub mod turn;

pub use client::{AssistantError, ChatMessage, ChatRole, LlmClient, MistralClient};
pub use config::AssistantConfig;
pub use turn::{run_turn, TurnOutcome};
