mod settings;

pub use settings::{
    ChatConfig, DatabaseConfig, JwtConfig, SearchConfig, ServerConfig, Settings,
};
