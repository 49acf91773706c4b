//! Wire protocol shared by the gateway and its clients.
//!
//! Everything that crosses a socket lives here: the WebSocket event
//! envelopes (client→server and server→client), the HTTP request/response
//! types, and the serializable error shape. No I/O.

pub mod error;
pub mod events;
pub mod http;

pub use error::{ErrorShape, ProtocolError, error_codes};
pub use events::{ClientEvent, ServerEvent};
