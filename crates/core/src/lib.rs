pub mod config;
pub mod models;

pub use config::*;
pub use models::*;
