pub mod dto;
pub mod failure;
pub mod middleware;
pub mod notifications;
pub mod rest;
pub mod shifts;
pub mod state;
pub mod visits;

pub use middleware::{preflight_no_content, require_auth, Caller};
pub use rest::{build_router, ApiDoc};
pub use state::AppState;
