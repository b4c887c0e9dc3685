//! Table module providing multi-table support with async actor model.
//!
//! This module implements:
//! - TableActor: Async actor driving one [`GameSession`](crate::GameSession)
//! - TableManager: Registry of running tables keyed by table id
//! - Message-based communication with tokio channels
//!
//! ## Architecture
//!
//! Each table runs in a separate Tokio task with an mpsc message inbox that
//! it drains one message at a time. Notifications go out through per-player
//! channels with `try_send`, so a slow observer loses notifications instead
//! of stalling the table. Turn and next-hand timers are spawned tasks that
//! post back into the same inbox.
//!
//! ## Example
//!
//! ```
//! use holdem_engine::table::{TableConfig, TableManager, TableResponse};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), holdem_engine::table::TableError> {
//! let manager = TableManager::new(TableConfig::default())?;
//! let (table_id, response) = manager
//!     .join_table(None, "alice".into(), None, 500)
//!     .await?;
//! assert_eq!(response, TableResponse::Seated(0));
//! assert_eq!(manager.list_tables().await[0].id, table_id);
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod manager;
pub mod messages;

pub use actor::{TableActor, TableHandle};
pub use config::{OddChipRule, TableConfig, TableSpeed};
pub use manager::{TableManager, TableMetadata};
pub use messages::{Notification, TableError, TableMessage, TableResponse, TableStateResponse};
