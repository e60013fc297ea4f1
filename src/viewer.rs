// Viewer mirror: a non-authoritative copy of the auction state kept in
// sync by replicated moderator events, with persistence write-through
// suppressed (the moderator already persisted).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::auction::state::{AuctionState, Direction};
use crate::auction::team::Team;
use crate::db::Database;
use crate::protocol::{AuctionEvent, ConnectionStatus, EventEnvelope};
use crate::ws_server::{classify_frame, FrameAction};

/// Key under which a viewer caches its team mirror across reloads.
pub const TEAM_CACHE_KEY: &str = "team_cache_v1";

/// Delay between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A viewer's local copy of the auction, plus connection bookkeeping.
/// Connection status is observable by the presentation layer but has no
/// bearing on the state machine.
#[derive(Debug)]
pub struct ViewerMirror {
    pub state: AuctionState,
    pub status: ConnectionStatus,
    /// Wall-clock break deadline (epoch milliseconds), if a break is on.
    pub break_ends_at: Option<i64>,
    /// Human-readable label of the last applied event, for status lines.
    pub last_event: Option<String>,
}

impl ViewerMirror {
    pub fn new(state: AuctionState) -> Self {
        ViewerMirror {
            state,
            status: ConnectionStatus::Connecting,
            break_ends_at: None,
            last_event: None,
        }
    }

    /// Apply one replicated event to the local mirror, using the same
    /// transition functions as the moderator.
    ///
    /// Application is non-corrupting under duplicate delivery: reapplying
    /// a SOLD for an already-closed player is rejected by the store's own
    /// guards and never double-charges a wallet. Failures are logged and
    /// left for the next bulk reconciliation to heal.
    pub fn apply_envelope(&mut self, envelope: &EventEnvelope) {
        let admin = envelope.admin_name.as_deref().unwrap_or("Admin");

        match &envelope.event {
            AuctionEvent::Bid {
                team_id,
                bid_amount,
            } => {
                if !self.state.place_bid(team_id, *bid_amount) {
                    warn!("mirror: BID {team_id}/{bid_amount} not applicable, skipping");
                }
            }
            AuctionEvent::Sold {
                team_id,
                sold_amount,
                assigned_card,
                ..
            } => {
                // The event carries everything needed to reapply the sale
                // even if the preceding BID was dropped in transit.
                if self
                    .state
                    .current_player()
                    .is_some_and(|p| !p.is_closed())
                {
                    self.state.place_bid(team_id, *sold_amount);
                }
                if let Err(e) = self.state.sell_player(assigned_card.clone(), admin) {
                    warn!("mirror: SOLD not applicable ({}), skipping", e.code());
                }
            }
            AuctionEvent::Unsold => {
                self.state.mark_unsold(admin);
            }
            AuctionEvent::Reopen => {
                self.state.reopen_player(admin);
            }
            AuctionEvent::NextPlayer => {
                self.state.advance(Direction::Next);
            }
            AuctionEvent::PreviousPlayer => {
                self.state.advance(Direction::Previous);
            }
            AuctionEvent::CategoryChanged { category } => {
                self.state.set_category(category);
            }
            AuctionEvent::BreakStart { break_ends_at, .. } => {
                self.break_ends_at = Some(*break_ends_at);
            }
            AuctionEvent::BreakEnd => {
                self.break_ends_at = None;
            }
            AuctionEvent::Undo { state_snapshot }
            | AuctionEvent::Redo { state_snapshot }
            | AuctionEvent::ResetAuction { state_snapshot } => {
                // Not re-derivable from a delta; restore wholesale.
                self.state.apply_snapshot(state_snapshot.clone());
            }
            AuctionEvent::DashboardConnected { .. } => {
                // Informational only.
            }
        }

        self.last_event = Some(event_label(envelope));
    }

    /// Seconds remaining in the current break, recomputed from the
    /// wall-clock deadline so missed ticks never cause drift.
    pub fn break_seconds_left(&self, now_millis: i64) -> u64 {
        match self.break_ends_at {
            Some(ends_at) if ends_at > now_millis => {
                ((ends_at - now_millis) as u64).div_ceil(1000)
            }
            _ => 0,
        }
    }

    /// Pull the canonical pool from the persistence bridge and merge it
    /// into the mirror, preserving local transient bid state the server
    /// copy might not carry. Storage failures are logged; the local
    /// mirror stays authoritative for the live show.
    pub fn reconcile_from_db(&mut self, db: &Database) {
        match db.load_players() {
            Ok(records) => {
                info!("mirror: reconciled {} players from storage", records.len());
                self.state.reconcile(records);
            }
            Err(e) => warn!("mirror: reconciliation read failed: {e}"),
        }
    }

    /// Cache the team mirror for resilience across reloads.
    pub fn save_team_cache(&self, db: &Database) {
        match serde_json::to_value(&self.state.teams) {
            Ok(value) => {
                if let Err(e) = db.save_state(TEAM_CACHE_KEY, &value) {
                    warn!("mirror: failed to cache teams: {e}");
                }
            }
            Err(e) => warn!("mirror: failed to serialize team cache: {e}"),
        }
    }
}

/// Short status-line label for an event, e.g. `SOLD | Rassie van Berg`.
fn event_label(envelope: &EventEnvelope) -> String {
    let kind = match &envelope.event {
        AuctionEvent::Bid { .. } => "BID",
        AuctionEvent::Sold { .. } => "SOLD",
        AuctionEvent::Unsold => "UNSOLD",
        AuctionEvent::Reopen => "REOPEN",
        AuctionEvent::NextPlayer => "NEXT PLAYER",
        AuctionEvent::PreviousPlayer => "PREVIOUS PLAYER",
        AuctionEvent::CategoryChanged { .. } => "CATEGORY CHANGED",
        AuctionEvent::BreakStart { .. } => "BREAK START",
        AuctionEvent::BreakEnd => "BREAK END",
        AuctionEvent::Undo { .. } => "UNDO",
        AuctionEvent::Redo { .. } => "REDO",
        AuctionEvent::ResetAuction { .. } => "RESET",
        AuctionEvent::DashboardConnected { .. } => "DASHBOARD CONNECTED",
    };
    match &envelope.player_name {
        Some(player) => format!("{kind} | {player}"),
        None => kind.to_string(),
    }
}

/// Merge cached team state over freshly configured defaults, keyed by
/// team id and taken field-by-field — the cache is never wholesale
/// trusted over canonical team configuration.
pub fn merge_team_cache(defaults: Vec<Team>, cached: Vec<Team>) -> Vec<Team> {
    defaults
        .into_iter()
        .map(|mut team| {
            if let Some(hit) = cached.iter().find(|c| c.id == team.id) {
                team.funds = hit.funds;
                team.roster = hit.roster.clone();
            }
            team
        })
        .collect()
}

/// Run a viewer process: connect to the moderator's hub, announce the
/// dashboard, and apply every replicated event to the local mirror.
/// Reconnects forever; each reconnect triggers a bulk reconciliation.
pub async fn run(
    url: &str,
    team_id: &str,
    team_name: &str,
    db: Database,
    state: AuctionState,
) -> anyhow::Result<()> {
    let mut mirror = ViewerMirror::new(state);

    // Resilience across reloads: fold the cached team mirror into the
    // configured defaults before the first event arrives.
    if let Ok(Some(value)) = db.load_state(TEAM_CACHE_KEY) {
        if let Ok(cached) = serde_json::from_value::<Vec<Team>>(value) {
            let defaults = std::mem::take(&mut mirror.state.teams);
            mirror.state.teams = merge_team_cache(defaults, cached);
        }
    }

    loop {
        mirror.status = ConnectionStatus::Connecting;
        let (ws_stream, _) = match connect_async(url).await {
            Ok(ok) => ok,
            Err(e) => {
                mirror.status = ConnectionStatus::Error;
                warn!("viewer: connect to {url} failed: {e}");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        mirror.status = ConnectionStatus::Connected;
        info!("viewer: connected to {url}");
        let (mut write, mut read) = ws_stream.split();

        let hello = EventEnvelope::viewer(AuctionEvent::DashboardConnected {
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
        });
        if let Ok(json) = serde_json::to_string(&hello) {
            let _ = write.send(Message::text(json)).await;
        }

        while let Some(frame) = read.next().await {
            match frame {
                Ok(msg) => match classify_frame(&msg) {
                    FrameAction::Forward(text) => {
                        match serde_json::from_str::<EventEnvelope>(&text) {
                            Ok(envelope) => {
                                mirror.apply_envelope(&envelope);
                                mirror.save_team_cache(&db);
                                if let Some(label) = &mirror.last_event {
                                    info!("viewer: {label}");
                                }
                            }
                            Err(e) => warn!("viewer: unparseable event, skipping: {e}"),
                        }
                    }
                    FrameAction::Close => break,
                    FrameAction::Ignore => {}
                },
                Err(e) => {
                    warn!("viewer: socket error: {e}");
                    break;
                }
            }
        }

        mirror.status = ConnectionStatus::Disconnected;
        info!("viewer: disconnected, reconciling from storage before retry");
        mirror.reconcile_from_db(&db);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
