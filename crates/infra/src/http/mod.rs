//! HTTP transport adapters

pub mod sender;

pub use sender::HttpBundleSender;
