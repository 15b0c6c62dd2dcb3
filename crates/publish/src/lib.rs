//! Publish endpoints for postgate.
//!
//! The chat core only sees [`Publisher`]. Which implementation it holds, the
//! real Twitter/X client or the simulator used when credentials are absent,
//! is decided once by [`build_publisher`].

pub mod config;
pub mod endpoint;
pub mod oauth;
pub mod simulated;
pub mod twitter;

pub use config::{build_publisher, PublishConfig, PublishMode, TwitterConfig};
pub use endpoint::{PublishReceipt, Publisher};
pub use oauth::OAuthCredentials;
pub use simulated::SimulatedPublisher;
pub use twitter::TwitterPublisher;
