pub mod errors;
pub mod id;
pub mod types;

pub use errors::{ConfigError, RelayError};
pub use id::{new_id, ConnectionId, SessionId};
pub use types::Role;
