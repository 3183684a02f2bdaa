mod auth;
mod health;
mod routes;
mod search;

pub use auth::{login, me, register, LoginRequest, RegisterRequest, TokenResponse};
pub use health::health;
pub use routes::api_routes;
pub use search::search_songs;
