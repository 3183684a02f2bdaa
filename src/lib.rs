// Infrastructure layer (shared components)
pub mod auth;
pub mod config;
pub mod error;

// Domain layer (business logic)
pub mod chat;
pub mod search;
pub mod users;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod shutdown;
