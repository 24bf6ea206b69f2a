pub mod session;
pub mod survey;
pub mod user;
