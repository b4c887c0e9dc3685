//! Random bots that play through the table registry.

use anyhow::{Error, bail};
use holdem_engine::{
    GameEvent, PlayerId, TableManager,
    entities::{Action, ActionChoice, ActionChoices, Chips, SeatIndex, TableId},
    table::{Notification, TableResponse},
};
use log::{debug, info, warn};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{sync::mpsc, time::timeout};

/// How long a bot waits on its inbox before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What a bot saw by the time it left.
#[derive(Debug, Default)]
pub struct BotReport {
    pub hands_seen: u64,
    pub actions: u64,
    pub silences: u64,
    pub conservation_checks: u64,
}

pub struct Bot {
    pub player: PlayerId,
    pub seat: SeatIndex,
    pub table_id: TableId,
    /// Chance of ignoring an action request and letting the timer act
    pub silent_rate: f64,
    /// Total chips bought in at the table, when this bot audits it
    pub audit: Option<Chips>,
    pub rng: StdRng,
}

impl Bot {
    pub fn new(player: PlayerId, seat: SeatIndex, table_id: TableId, seed: u64) -> Self {
        Self {
            player,
            seat,
            table_id,
            silent_rate: 0.0,
            audit: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick one of the offered actions, with a random amount for bets and
    /// raises.
    fn choose(&mut self, choices: &ActionChoices) -> Action {
        match choices.0.choose(&mut self.rng) {
            Some(ActionChoice::Check) => Action::Check,
            Some(ActionChoice::Call(_)) => Action::Call,
            Some(ActionChoice::Bet { min, max }) => Action::Bet(self.rng.random_range(*min..=*max)),
            Some(ActionChoice::Raise { min, max }) => {
                Action::Raise(self.rng.random_range(*min..=*max))
            }
            Some(ActionChoice::AllIn(_)) => Action::AllIn,
            Some(ActionChoice::Fold) | None => Action::Fold,
        }
    }

    /// Play until `hands` hands have ended at the table or `stop` is set,
    /// then leave.
    ///
    /// # Errors
    ///
    /// Fails if the table disappears or, for the auditing bot, if chips
    /// at the table stop adding up.
    pub async fn run(
        mut self,
        manager: TableManager,
        mut notifications: mpsc::Receiver<Notification>,
        hands: u64,
        stop: Arc<AtomicBool>,
    ) -> Result<BotReport, Error> {
        let mut report = BotReport::default();
        let mut rake_seen: Chips = 0;
        let mut cashed_out: Chips = 0;
        let mut audit_next_view = false;

        while report.hands_seen < hands && !stop.load(Ordering::Relaxed) {
            let notification = match timeout(POLL_INTERVAL, notifications.recv()).await {
                Ok(Some(notification)) => notification,
                Ok(None) => bail!("{} lost its table", self.player),
                Err(_) => continue,
            };

            match notification {
                Notification::ActionRequired { seat, choices, .. } if seat == self.seat => {
                    if self.rng.random_bool(self.silent_rate) {
                        debug!("{} goes silent", self.player);
                        report.silences += 1;
                        continue;
                    }
                    let action = self.choose(&choices);
                    let response = manager
                        .take_action(self.table_id, self.player.clone(), action.clone())
                        .await?;
                    match response {
                        TableResponse::ActionApplied(_) => report.actions += 1,
                        // Lost the race against our own timer
                        TableResponse::Discarded => {
                            debug!("{} was too late to {action}", self.player);
                        }
                        other => {
                            debug!(
                                "{} couldn't {action}: {}",
                                self.player,
                                other.error_message().unwrap_or_default()
                            );
                        }
                    }
                }
                Notification::Event(GameEvent::HandEnded { rake, .. }) => {
                    report.hands_seen += 1;
                    rake_seen += rake;
                    audit_next_view = true;
                }
                Notification::Event(GameEvent::HandAborted { hand_id, reason }) => {
                    warn!("table {}: hand #{hand_id} aborted: {reason}", self.table_id);
                    report.hands_seen += 1;
                    audit_next_view = true;
                }
                Notification::Event(GameEvent::SeatLeft { chips, .. }) => {
                    cashed_out += chips;
                }
                Notification::State(view) => {
                    if audit_next_view && let Some(bought_in) = self.audit {
                        let stacks: Chips = view.seats.iter().map(|seat| seat.chips).sum();
                        let accounted = stacks + view.pot_total + rake_seen + cashed_out;
                        if accounted != bought_in {
                            bail!(
                                "table {}: chips not conserved after hand {:?}: {accounted} != {bought_in}",
                                self.table_id,
                                view.hand_id
                            );
                        }
                        report.conservation_checks += 1;
                    }
                    audit_next_view = false;

                    let funded = view.seats.iter().filter(|seat| seat.chips > 0).count();
                    if funded < 2 && !view.phase.is_betting() {
                        info!("table {} is down to one stack", self.table_id);
                        break;
                    }
                }
                Notification::Error { kind, message, .. } => {
                    debug!("{} was told {kind}: {message}", self.player);
                }
                _ => {}
            }
        }

        let response = manager
            .leave_table(self.table_id, self.player.clone())
            .await?;
        info!(
            "{} left table {} after {} hands ({:?})",
            self.player, self.table_id, report.hands_seen, response
        );
        Ok(report)
    }
}
