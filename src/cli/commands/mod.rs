pub mod analyze;
pub mod clean;
pub mod config;
pub mod health;
