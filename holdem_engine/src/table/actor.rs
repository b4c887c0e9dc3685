//! Table actor implementation with async message handling.
//!
//! One actor owns one [`GameSession`] and processes its inbox serially, so
//! every message sees the state left by the previous one. Timers never
//! touch the session directly: they post [`TableMessage::Timeout`] or
//! [`TableMessage::AutoStart`] back into the inbox through a weak sender,
//! and the session discards keys for turns that already ended.

use super::{
    config::TableConfig,
    messages::{Notification, TableError, TableMessage, TableResponse, TableStateResponse},
};
use crate::game::{
    ActionOutcome, GameError, GameEvent, GameSession, TimeoutKey,
    entities::{Action, HandId, PlayerId, SeatIndex, TableId, TableView},
};
use chrono::{TimeDelta, Utc};
use std::collections::HashMap;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Duration, sleep},
};

/// Inbox capacity per table.
const INBOX_CAPACITY: usize = 100;

/// Table actor handle for sending messages
#[derive(Clone, Debug)]
pub struct TableHandle {
    sender: mpsc::Sender<TableMessage>,
    table_id: TableId,
}

impl TableHandle {
    /// Create a new table handle
    pub fn new(sender: mpsc::Sender<TableMessage>, table_id: TableId) -> Self {
        Self { sender, table_id }
    }

    /// Get table ID
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Whether the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a message to the table
    ///
    /// # Errors
    ///
    /// [`TableError::Closed`] if the actor has stopped.
    pub async fn send(&self, message: TableMessage) -> Result<(), TableError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| TableError::Closed)
    }

    /// Send a request and wait for the actor's reply.
    ///
    /// # Errors
    ///
    /// [`TableError::Closed`] if the actor stopped before replying.
    pub async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> TableMessage,
    ) -> Result<T, TableError> {
        let (tx, rx) = oneshot::channel();
        self.send(message(tx)).await?;
        rx.await.map_err(|_| TableError::Closed)
    }

    pub async fn view(&self, player: Option<PlayerId>) -> Result<TableView, TableError> {
        self.request(|response| TableMessage::GetView { player, response })
            .await
    }

    pub async fn state(&self) -> Result<TableStateResponse, TableError> {
        self.request(|response| TableMessage::GetState { response })
            .await
    }
}

/// Table actor managing a single poker table
pub struct TableActor {
    /// Table ID
    id: TableId,

    /// Game state for this table
    session: GameSession,

    /// Message inbox
    inbox: mpsc::Receiver<TableMessage>,

    /// Lets timers post back without keeping the table alive
    timer_sender: mpsc::WeakSender<TableMessage>,

    /// Notification channels by player
    subscribers: HashMap<PlayerId, mpsc::Sender<Notification>>,

    /// Armed turn timer
    turn_timer: Option<(TimeoutKey, JoinHandle<()>)>,

    /// Armed auto-start timer, keyed by the hand it follows
    next_hand_timer: Option<(HandId, JoinHandle<()>)>,

    /// Stop once the last player leaves
    close_when_empty: bool,

    /// Someone has sat down, or the first join was turned away
    occupied_once: bool,

    /// Is table closed
    is_closed: bool,
}

impl TableActor {
    /// Create a new table actor
    ///
    /// # Errors
    ///
    /// [`GameError::Config`] if `config` doesn't validate.
    pub fn new(id: TableId, config: TableConfig) -> Result<(Self, TableHandle), GameError> {
        let session = GameSession::new(id, config)?;
        Ok(Self::with_session(session))
    }

    /// Create a table actor around an existing session (e.g. one built with
    /// a fixed seed).
    pub fn with_session(session: GameSession) -> (Self, TableHandle) {
        let id = session.table_id();
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);

        let actor = Self {
            id,
            session,
            inbox,
            timer_sender: sender.downgrade(),
            subscribers: HashMap::new(),
            turn_timer: None,
            next_hand_timer: None,
            close_when_empty: false,
            occupied_once: false,
            is_closed: false,
        };

        let handle = TableHandle::new(sender, id);

        (actor, handle)
    }

    /// Stop the actor once its seats are empty after the first join.
    #[must_use]
    pub fn close_when_empty(mut self) -> Self {
        self.close_when_empty = true;
        self
    }

    /// Run the table actor event loop
    pub async fn run(mut self) {
        log::info!("Table {} '{}' starting", self.id, self.session.config().name);

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message);

            if self.is_closed {
                break;
            }
        }

        self.cancel_turn_timer();
        self.cancel_next_hand_timer();
        log::info!("Table {} '{}' closed", self.id, self.session.config().name);
    }

    /// Handle a table message
    fn handle_message(&mut self, message: TableMessage) {
        match message {
            TableMessage::Join {
                player,
                seat,
                buy_in,
                response,
            } => {
                self.occupied_once = true;
                let result = match self.session.join(player.clone(), seat, buy_in) {
                    Ok(seat) => TableResponse::Seated(seat),
                    Err(err) => {
                        self.notify_error(&player, None, &err.clone().into());
                        TableResponse::Rejected(err.into())
                    }
                };
                let _ = response.send(result);
            }

            TableMessage::Leave { player, response } => {
                let result = match self.session.seat_of(&player) {
                    Some(seat) => match self.session.leave(seat) {
                        Ok(cash_out) => TableResponse::Left { cash_out },
                        Err(err) => TableResponse::Rejected(err.into()),
                    },
                    None => TableResponse::NotAtTable,
                };
                let _ = response.send(result);
            }

            TableMessage::Action {
                player,
                action,
                response,
            } => {
                let result = self.handle_action(&player, &action);
                let _ = response.send(result);
            }

            TableMessage::Disconnected { player, response } => {
                let result = match self.session.seat_of(&player) {
                    Some(seat) => match self.session.mark_disconnected(seat) {
                        Ok(()) => TableResponse::Success,
                        Err(err) => TableResponse::Rejected(err.into()),
                    },
                    None => TableResponse::NotAtTable,
                };
                let _ = response.send(result);
            }

            TableMessage::Reconnected { player, response } => {
                let result = match self.session.seat_of(&player) {
                    Some(seat) => match self.session.mark_reconnected(seat) {
                        Ok(()) => TableResponse::Success,
                        Err(err) => TableResponse::Rejected(err.into()),
                    },
                    None => TableResponse::NotAtTable,
                };
                let _ = response.send(result);
            }

            TableMessage::GetView { player, response } => {
                let _ = response.send(self.session.state_view(player.as_ref()));
            }

            TableMessage::GetState { response } => {
                let _ = response.send(self.get_state());
            }

            TableMessage::StartHand { response } => {
                let result = match self.session.start_hand() {
                    Ok(hand_id) => TableResponse::HandStarted(hand_id),
                    Err(err) => TableResponse::Rejected(err),
                };
                let _ = response.send(result);
            }

            TableMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(TableResponse::Success);
            }

            TableMessage::Subscribe { player, sender } => {
                let view = self.session.state_view(Some(&player));
                if let Err(mpsc::error::TrySendError::Closed(_)) =
                    sender.try_send(Notification::State(view))
                {
                    return;
                }
                log::debug!("{} subscribed to table {}", player, self.id);
                self.subscribers.insert(player, sender);
            }

            TableMessage::Unsubscribe { player } => {
                self.subscribers.remove(&player);
                log::debug!("{} unsubscribed from table {}", player, self.id);
            }

            TableMessage::Timeout(key) => {
                if self.turn_timer.as_ref().is_some_and(|(armed, _)| *armed == key) {
                    self.turn_timer = None;
                }
                self.session.handle_timeout(key);
            }

            TableMessage::AutoStart { after } => {
                if self.next_hand_timer.as_ref().is_some_and(|(hand, _)| *hand == after) {
                    self.next_hand_timer = None;
                }
                if self.session.hand_id() == after && self.session.can_start_hand() {
                    if let Err(err) = self.session.start_hand() {
                        log::warn!("Table {}: couldn't auto-start: {}", self.id, err);
                    }
                }
            }
        }

        self.after_message();
    }

    /// Handle player action
    fn handle_action(&mut self, player: &PlayerId, action: &Action) -> TableResponse {
        let Some(seat) = self.session.seat_of(player) else {
            return TableResponse::NotAtTable;
        };
        match self.session.apply_action(seat, action) {
            Ok(ActionOutcome::Applied(applied)) => TableResponse::ActionApplied(applied),
            Ok(ActionOutcome::Discarded) => TableResponse::Discarded,
            Err(err) => {
                let err = GameError::from(err);
                self.notify_error(player, Some(seat), &err);
                TableResponse::Rejected(err)
            }
        }
    }

    /// Publish what the last message changed, then re-arm timers.
    fn after_message(&mut self) {
        let events = self.session.drain_events();
        if !events.is_empty() {
            log::debug!("Table {} generated {} events", self.id, events.len());
            for event in events {
                let notification = match event {
                    GameEvent::ActionRequired { seat, choices, .. } => {
                        let now = Utc::now();
                        let deadline = i64::try_from(self.session.config().action_timeout_ms)
                            .ok()
                            .and_then(TimeDelta::try_milliseconds)
                            .and_then(|timeout| now.checked_add_signed(timeout))
                            .unwrap_or(now);
                        Notification::ActionRequired {
                            seat,
                            choices,
                            deadline,
                        }
                    }
                    event => Notification::Event(event),
                };
                self.broadcast(&notification);
            }
            self.broadcast_views();
        }

        self.rearm_turn_timer();
        self.rearm_next_hand_timer();

        if self.close_when_empty
            && self.occupied_once
            && self.session.num_seated() == 0
            && !self.session.is_hand_in_progress()
        {
            log::info!("Table {} is empty, shutting down", self.id);
            self.is_closed = true;
        }
    }

    /// Broadcast a notification to all subscribers
    fn broadcast(&mut self, notification: &Notification) {
        self.subscribers.retain(|player, sender| {
            match sender.try_send(notification.clone()) {
                Ok(_) => true, // Keep subscriber
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("Subscriber {} channel full, dropping notification", player);
                    true // Keep subscriber but drop this notification
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Subscriber {} disconnected, removing", player);
                    false // Remove subscriber
                }
            }
        });
    }

    /// Send each subscriber its own view.
    fn broadcast_views(&mut self) {
        let session = &self.session;
        self.subscribers.retain(|player, sender| {
            let view = session.state_view(Some(player));
            match sender.try_send(Notification::State(view)) {
                Ok(_) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("Subscriber {} channel full, dropping view", player);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    /// Tell one player why their request was rejected.
    fn notify_error(&self, player: &PlayerId, seat: Option<SeatIndex>, err: &GameError) {
        let kind = match err {
            GameError::Action(err) => err.kind(),
            GameError::Seat(_) => "seat",
            GameError::Config(_) => "config",
            GameError::Invariant(_) => "invariant",
            GameError::NotEnoughPlayers | GameError::HandInProgress => "table",
        };
        log::debug!("Table {}: rejected request from {}: {}", self.id, player, err);
        if let Some(sender) = self.subscribers.get(player) {
            let _ = sender.try_send(Notification::Error {
                seat,
                kind: kind.to_string(),
                message: err.to_string(),
            });
        }
    }

    fn rearm_turn_timer(&mut self) {
        let pending = self.session.pending_timeout();
        if self.turn_timer.as_ref().map(|(key, _)| *key) == pending {
            return;
        }
        self.cancel_turn_timer();
        let Some(key) = pending else {
            return;
        };
        let sender = self.timer_sender.clone();
        let timeout = Duration::from_millis(self.session.config().action_timeout_ms);
        let handle = tokio::spawn(async move {
            sleep(timeout).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(TableMessage::Timeout(key)).await;
            }
        });
        self.turn_timer = Some((key, handle));
    }

    fn cancel_turn_timer(&mut self) {
        if let Some((_, handle)) = self.turn_timer.take() {
            handle.abort();
        }
    }

    fn rearm_next_hand_timer(&mut self) {
        if !self.session.can_start_hand() {
            self.cancel_next_hand_timer();
            return;
        }
        let after = self.session.hand_id();
        if self.next_hand_timer.as_ref().is_some_and(|(hand, _)| *hand == after) {
            return;
        }
        self.cancel_next_hand_timer();
        let sender = self.timer_sender.clone();
        let delay = Duration::from_millis(self.session.config().next_hand_delay_ms);
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(TableMessage::AutoStart { after }).await;
            }
        });
        self.next_hand_timer = Some((after, handle));
    }

    fn cancel_next_hand_timer(&mut self) {
        if let Some((_, handle)) = self.next_hand_timer.take() {
            handle.abort();
        }
    }

    /// Get current table state
    fn get_state(&self) -> TableStateResponse {
        let config = self.session.config();
        let view = self.session.state_view(None);
        TableStateResponse {
            table_id: self.id,
            table_name: config.name.clone(),
            player_count: self.session.num_seated(),
            max_players: config.max_players,
            small_blind: config.small_blind,
            big_blind: config.big_blind,
            pot_size: view.pot_total,
            phase: view.phase,
            hand_count: self.session.hand_id(),
            players: view.seats.into_iter().map(|seat| seat.player).collect(),
            speed: config.speed.to_string(),
        }
    }
}
