pub mod channel;
pub mod endpoint;
pub mod error;
pub mod keys;

pub use channel::{ChannelOpener, ChannelStreamIo, LogicalChannel};
pub use endpoint::Endpoint;
pub use error::{SshCoreError, SshResult};
