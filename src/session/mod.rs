//! Session lifecycle
//!
//! - `store` - per-user conversation handle and spend
//! - `gateway` - backend calls with timeout, abort and expiry recovery

mod gateway;
mod store;

pub use gateway::{AgentGateway, DEFAULT_BACKEND_TIMEOUT};
pub use store::{SessionStore, UserSession};
