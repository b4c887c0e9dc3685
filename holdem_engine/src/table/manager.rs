//! Table manager for spawning and managing multiple table actors.
//!
//! The manager is the registry from table ids to running actors. Tables it
//! creates on a player's first join stop on their own once their last seat
//! empties, and the manager prunes their handles the next time it looks.

use super::{
    actor::{TableActor, TableHandle},
    config::TableConfig,
    messages::{Notification, TableError, TableMessage, TableResponse},
};
use crate::game::{
    GameSession,
    entities::{Action, Chips, HandId, Phase, PlayerId, SeatIndex, TableId, TableView},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc};

/// Table metadata for discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub id: TableId,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub pot_size: Chips,
    pub hand_count: HandId,
    pub phase: Phase,
}

/// Table manager for managing multiple table instances
#[derive(Clone)]
pub struct TableManager {
    /// Configuration for tables created on first join
    default_config: TableConfig,

    /// Seeds table RNGs deterministically when set
    seed: Option<u64>,

    /// Active table handles
    tables: Arc<RwLock<HashMap<TableId, TableHandle>>>,

    /// Next table ID
    next_table_id: Arc<RwLock<TableId>>,
}

impl TableManager {
    /// Create a new table manager
    ///
    /// # Errors
    ///
    /// [`TableError::Config`] if `default_config` doesn't validate.
    pub fn new(default_config: TableConfig) -> Result<Self, TableError> {
        default_config.validate()?;
        Ok(Self {
            default_config,
            seed: None,
            tables: Arc::new(RwLock::new(HashMap::new())),
            next_table_id: Arc::new(RwLock::new(1)),
        })
    }

    /// Derive every table's shuffle seed from `seed` and the table id.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn default_config(&self) -> &TableConfig {
        &self.default_config
    }

    /// Create and spawn a new table that stays open until closed.
    ///
    /// # Errors
    ///
    /// [`TableError::Config`] if `config` doesn't validate.
    pub async fn create_table(&self, config: TableConfig) -> Result<TableId, TableError> {
        let handle = self.spawn_table(config, false).await?;
        Ok(handle.table_id())
    }

    async fn spawn_table(
        &self,
        config: TableConfig,
        close_when_empty: bool,
    ) -> Result<TableHandle, TableError> {
        config.validate()?;

        // Get next table ID
        let mut next_id = self.next_table_id.write().await;
        let table_id = *next_id;
        *next_id += 1;
        drop(next_id);

        let session = match self.seed {
            Some(seed) => {
                GameSession::with_seed(table_id, config, seed.wrapping_add(table_id.unsigned_abs()))
            }
            None => GameSession::new(table_id, config),
        }?;
        let (actor, handle) = TableActor::with_session(session);
        let actor = if close_when_empty {
            actor.close_when_empty()
        } else {
            actor
        };

        // Store handle
        let mut tables = self.tables.write().await;
        tables.insert(table_id, handle.clone());
        drop(tables);

        // Spawn actor task
        tokio::spawn(async move {
            actor.run().await;
        });

        log::info!("Created and spawned table {}", table_id);
        Ok(handle)
    }

    /// Get a table handle, forgetting it if the actor has stopped.
    pub async fn get_table(&self, table_id: TableId) -> Option<TableHandle> {
        let handle = self.tables.read().await.get(&table_id).cloned()?;
        if handle.is_closed() {
            self.forget(table_id).await;
            return None;
        }
        Some(handle)
    }

    async fn table(&self, table_id: TableId) -> Result<TableHandle, TableError> {
        self.get_table(table_id)
            .await
            .ok_or(TableError::NotFound(table_id))
    }

    async fn forget(&self, table_id: TableId) {
        if self.tables.write().await.remove(&table_id).is_some() {
            log::debug!("Removed table {} from registry", table_id);
        }
    }

    /// Seat `player` at `table_id`, or at a new table when `table_id` is
    /// `None` or names a table that no longer exists.
    ///
    /// Returns the table the player joined along with the table's answer.
    ///
    /// # Errors
    ///
    /// [`TableError::Config`] if a new table can't be created from the
    /// default configuration.
    pub async fn join_table(
        &self,
        table_id: Option<TableId>,
        player: PlayerId,
        seat: Option<SeatIndex>,
        buy_in: Chips,
    ) -> Result<(TableId, TableResponse), TableError> {
        let existing = match table_id {
            Some(table_id) => self.get_table(table_id).await,
            None => None,
        };

        if let Some(handle) = existing {
            let join = handle
                .request(|response| TableMessage::Join {
                    player: player.clone(),
                    seat,
                    buy_in,
                    response,
                })
                .await;
            match join {
                Ok(response) => return Ok((handle.table_id(), response)),
                // The table emptied and shut down between lookup and send
                Err(TableError::Closed) => self.forget(handle.table_id()).await,
                Err(err) => return Err(err),
            }
        }

        let handle = self.spawn_table(self.default_config.clone(), true).await?;
        let response = handle
            .request(|response| TableMessage::Join {
                player,
                seat,
                buy_in,
                response,
            })
            .await?;
        Ok((handle.table_id(), response))
    }

    /// Leave a table
    ///
    /// # Errors
    ///
    /// [`TableError::NotFound`] or [`TableError::Closed`] if the table is gone.
    pub async fn leave_table(
        &self,
        table_id: TableId,
        player: PlayerId,
    ) -> Result<TableResponse, TableError> {
        self.table(table_id)
            .await?
            .request(|response| TableMessage::Leave { player, response })
            .await
    }

    /// Take an action
    ///
    /// # Errors
    ///
    /// [`TableError::NotFound`] or [`TableError::Closed`] if the table is gone.
    pub async fn take_action(
        &self,
        table_id: TableId,
        player: PlayerId,
        action: Action,
    ) -> Result<TableResponse, TableError> {
        self.table(table_id)
            .await?
            .request(|response| TableMessage::Action {
                player,
                action,
                response,
            })
            .await
    }

    /// Mark a player's connection lost.
    ///
    /// # Errors
    ///
    /// [`TableError::NotFound`] or [`TableError::Closed`] if the table is gone.
    pub async fn mark_disconnected(
        &self,
        table_id: TableId,
        player: PlayerId,
    ) -> Result<TableResponse, TableError> {
        self.table(table_id)
            .await?
            .request(|response| TableMessage::Disconnected { player, response })
            .await
    }

    /// # Errors
    ///
    /// [`TableError::NotFound`] or [`TableError::Closed`] if the table is gone.
    pub async fn mark_reconnected(
        &self,
        table_id: TableId,
        player: PlayerId,
    ) -> Result<TableResponse, TableError> {
        self.table(table_id)
            .await?
            .request(|response| TableMessage::Reconnected { player, response })
            .await
    }

    /// # Errors
    ///
    /// [`TableError::NotFound`] or [`TableError::Closed`] if the table is gone.
    pub async fn view(
        &self,
        table_id: TableId,
        player: Option<PlayerId>,
    ) -> Result<TableView, TableError> {
        self.table(table_id).await?.view(player).await
    }

    /// Route `player`'s notifications from `table_id` into `sender`.
    ///
    /// # Errors
    ///
    /// [`TableError::NotFound`] or [`TableError::Closed`] if the table is gone.
    pub async fn subscribe(
        &self,
        table_id: TableId,
        player: PlayerId,
        sender: mpsc::Sender<Notification>,
    ) -> Result<(), TableError> {
        self.table(table_id)
            .await?
            .send(TableMessage::Subscribe { player, sender })
            .await
    }

    /// # Errors
    ///
    /// [`TableError::NotFound`] or [`TableError::Closed`] if the table is gone.
    pub async fn unsubscribe(&self, table_id: TableId, player: PlayerId) -> Result<(), TableError> {
        self.table(table_id)
            .await?
            .send(TableMessage::Unsubscribe { player })
            .await
    }

    /// List all active tables
    ///
    /// Each entry is a snapshot the table took between two of its own
    /// messages; tables that stopped are pruned.
    pub async fn list_tables(&self) -> Vec<TableMetadata> {
        let handles: Vec<TableHandle> = self.tables.read().await.values().cloned().collect();

        let mut metadata_list = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.state().await {
                Ok(state) => metadata_list.push(TableMetadata {
                    id: state.table_id,
                    name: state.table_name,
                    player_count: state.player_count,
                    max_players: state.max_players,
                    small_blind: state.small_blind,
                    big_blind: state.big_blind,
                    pot_size: state.pot_size,
                    hand_count: state.hand_count,
                    phase: state.phase,
                }),
                Err(_) => self.forget(handle.table_id()).await,
            }
        }

        metadata_list.sort_by_key(|metadata| metadata.id);
        metadata_list
    }

    /// Number of tables whose actors are still running
    pub async fn active_table_count(&self) -> usize {
        self.tables
            .read()
            .await
            .values()
            .filter(|handle| !handle.is_closed())
            .count()
    }

    /// Close a table
    ///
    /// # Errors
    ///
    /// [`TableError::NotFound`] if no such table is registered.
    pub async fn close_table(&self, table_id: TableId) -> Result<(), TableError> {
        let handle = self
            .tables
            .write()
            .await
            .remove(&table_id)
            .ok_or(TableError::NotFound(table_id))?;

        // Already stopped on its own
        if handle
            .request(|response| TableMessage::Close { response })
            .await
            .is_err()
        {
            log::debug!("Table {} was already closed", table_id);
        }

        log::info!("Closed table {}", table_id);
        Ok(())
    }
}
