pub mod attempt;
pub mod badge;
pub mod challenge;
pub mod chat;
pub mod path;
pub mod user;
