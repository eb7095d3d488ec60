// briefkasten-api: Async client and wire types for the mailbox HTTP service

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::MailboxClient;
pub use error::Error;
pub use transport::TransportConfig;
