mod auth;
pub mod config;
pub mod error;
mod handler;
mod session;

pub use config::{Credentials, TransportOptions};
pub use error::{ClientError, ClientResult};
pub use handler::TunnelHandler;
pub use session::TransportSession;
