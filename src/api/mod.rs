pub mod handlers;
pub mod server;
pub mod ws;

pub use handlers::AppState;
pub use server::{build_router, build_state, run_server, ServerConfig};
