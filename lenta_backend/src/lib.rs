pub mod api;
pub mod bootstrap;
pub mod comments;
pub mod config;
pub mod conversations;
pub mod database;
pub mod error;
pub mod messages;
pub mod node;
pub mod posts;
pub mod profiles;
pub mod telemetry;
pub mod users;
pub mod utils;
