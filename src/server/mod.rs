mod error;
mod routes;
#[allow(clippy::module_inception)]
mod server;
mod state;

pub use error::ApiError;
pub use server::{build_cors_layer, make_app, run_server};
pub use state::ServerState;
