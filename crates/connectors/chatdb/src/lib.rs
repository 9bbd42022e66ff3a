pub mod error;
pub mod execute;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod routes;
pub mod schema_cache;
pub mod state;
pub mod translate;

pub use routes::create_router;
pub use state::{create_state, ServerState};
