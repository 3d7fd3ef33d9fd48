pub mod chat;
pub mod emitter;
pub mod server;

pub use emitter::{EmitterError, StreamEmitter};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
