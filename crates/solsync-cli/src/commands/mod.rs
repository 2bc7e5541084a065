pub mod auth_cmd;
pub mod capture;
pub mod common;
pub mod completions;
pub mod config;
pub mod health;
pub mod list;
pub mod repos;
pub mod retry;
pub mod sync;
