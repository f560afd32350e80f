pub mod handlers;
pub mod server;

pub use handlers::{AppState, SubmitResponse, TaskResultResponse};
pub use server::{build_router, start, ServerConfig, ServerHandle};
