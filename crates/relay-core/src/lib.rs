//! Inbound HTTP relay: one logical channel per request, one shared transport.

pub mod error;
pub mod lifecycle;
pub mod proxy;
pub mod router;

pub use error::{RelayError, RelayResult, ResponseBody};
pub use lifecycle::{ConnectionGuard, DrainResult, Lifecycle, RouterState};
pub use proxy::ChannelProxy;
pub use router::{RequestRouter, RouterConfig};
