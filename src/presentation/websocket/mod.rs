//! WebSocket Gateway
//!
//! Real-time messaging over WebSocket connections.

pub mod gateway;
pub mod handler;
pub mod messages;
pub mod registry;
pub mod session;

pub use gateway::{Gateway, GatewayDeps, GatewayError, Outbound, RecipientFilter};
pub use handler::ws_handler;
pub use messages::{ClientEvent, ContentKind, ErrorCode, ServerEvent};
pub use registry::{ConnectionRegistry, Topic};
pub use session::{ConnectionId, Session};
