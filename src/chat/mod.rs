//! Real-time chat: connection registry, per-session protocol loop, persisted
//! message log, and history retrieval.

mod handler;
mod history;
mod memory_store;
mod message;
mod postgres_store;
mod registry;
mod store;

pub use handler::ws_handler;
pub use history::{chat_history, HistoryQuery, HistoryResponse};
pub use memory_store::MemoryMessageStore;
pub use message::{BroadcastEnvelope, ChatFrame, ChatMessage, UNKNOWN_USER};
pub use postgres_store::PostgresMessageStore;
pub use registry::{BroadcastOutcome, ConnectionHandle, ConnectionRegistry, RegistryStats};
pub use store::{create_message_store, MessageStore, StoreError};
