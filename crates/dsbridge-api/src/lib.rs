// dsbridge-api: Async Rust client for the digitalSTROM server JSON API
// (session handling, retry/re-subscription, event long-poll)

pub mod client;
pub mod endpoints;
pub mod error;
pub mod event_loop;
pub mod model;
pub mod session;
pub mod subscription;
pub mod transport;

pub use client::{Client, ClientConfig, RetryPolicy};
pub use endpoints::ZoneAction;
pub use error::Error;
pub use event_loop::EventLoopConfig;
pub use session::{Credentials, Session, Token};
pub use subscription::{EventHandler, HandlerError, HandlerId};
pub use transport::{Params, TlsMode, Transport, TransportConfig};
