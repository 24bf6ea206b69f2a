//! Domain logic for formcraft: the JSON-Patch engine, schema store, form
//! descriptors, and the rules for surveys, uploads and deployments.
//!
//! Nothing in this crate performs I/O.

pub mod conversation;
pub mod deployment;
pub mod error;
pub mod form;
pub mod patch;
pub mod pointer;
pub mod schema;
pub mod store;
pub mod survey;
pub mod types;
pub mod upload;
