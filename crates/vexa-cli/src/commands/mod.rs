//! CLI commands.

pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod health;
pub mod models;
pub mod search;
pub mod train;
