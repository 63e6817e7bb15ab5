//! # p25server - axum server for the decoder service
//!
//! - [`server`] : the [`Server`] wrapper and its builder
//! - [`logs`] : log ring buffer, live log stream and log level API
//!
//! ```rust,no_run
//! use p25server::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new_configured().build();
//!     server.init_logging(LoggingOptions::from_config()).await;
//!     server.add_info_route().await;
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, LoggingOptions, RingLayer, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};
