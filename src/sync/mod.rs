//! Multi-device synchronization module
//! 
//! Connection bookkeeping, snapshot fan-out and command routing.

pub mod broadcaster;
pub mod connection;
pub mod dispatcher;
pub mod messages;
pub mod registry;

// Re-export main types
pub use broadcaster::SyncBroadcaster;
pub use connection::{Connection, ConnectionId, SendError};
pub use dispatcher::CommandDispatcher;
pub use messages::{Command, ServerMessage};
pub use registry::ConnectionRegistry;
