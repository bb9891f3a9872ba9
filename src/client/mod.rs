//! Client side of the API: HTTP access and local state synchronization.

pub mod api;
pub mod messages;
pub mod sync;

pub use api::{ApiClient, ClientError};
pub use messages::user_message;
pub use sync::{apply_outcome, LocalCache, SyncSession};
