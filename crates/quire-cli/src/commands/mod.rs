pub mod add;
pub mod common;
pub mod config;
pub mod delete;
pub mod edit;
pub mod encryption;
pub mod list;
pub mod show;
pub mod sync;
