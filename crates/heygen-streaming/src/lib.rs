mod client;

pub use heygen_streaming_types as types;
pub use client::config::{Config, ConfigBuilder};
pub use client::connection::{Connection, MediaStream, ServerRx};
pub use client::error::{Error, Result};
pub use client::{StreamingAvatar, StreamingSession};
