pub mod ai_gateway;
pub mod auth;
pub mod blob_store;
pub mod config;
pub mod repository;

pub use ai_gateway::*;
pub use auth::*;
pub use blob_store::*;
pub use config::*;
pub use repository::*;
