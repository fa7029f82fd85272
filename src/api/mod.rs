mod extract;
pub mod handlers;
mod routes;
mod state;

pub use extract::{ApiJson, ApiQuery};
pub use routes::create_router;
pub use state::{AppState, AppStateInner};
