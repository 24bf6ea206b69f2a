//! Request handlers.
//!
//! Handlers delegate to `formcraft_db` repositories, the editor session
//! manager and the builder crate, and map errors via [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod auth;
pub mod deployment;
pub mod editor;
pub mod surveys;
pub mod template;
