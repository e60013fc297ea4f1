// Moderator orchestration: the authoritative event loop.
//
// Console commands mutate the auction store (wrapped in undo history),
// successful mutations are written through to storage and broadcast to
// every connected viewer. Viewer messages arriving over the hub are
// informational only; viewers never produce authoritative state.

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::auction::history::History;
use crate::auction::player::{fmt_crores, next_bid_increment, CardAssignment, Player};
use crate::auction::state::{AuctionState, Direction, SellError};
use crate::auction::team::Team;
use crate::config::Config;
use crate::db::{Database, PlayerPatch};
use crate::protocol::{AuctionEvent, EventEnvelope, UserCommand};
use crate::ws_server::WsEvent;

/// The complete moderator-side application state: one explicitly owned
/// context constructed at startup and injected into the loops.
pub struct AppState {
    pub config: Config,
    pub state: AuctionState,
    pub history: History,
    pub db: Database,
    /// Fan-out channel to every connected viewer socket.
    pub outbound: broadcast::Sender<String>,
    /// Wall-clock break deadline (epoch milliseconds), if a break is on.
    pub break_ends_at: Option<i64>,
    pub viewer_count: usize,
}

impl AppState {
    pub fn new(
        config: Config,
        state: AuctionState,
        db: Database,
        outbound: broadcast::Sender<String>,
    ) -> Self {
        AppState {
            config,
            state,
            history: History::new(),
            db,
            outbound,
            break_ends_at: None,
            viewer_count: 0,
        }
    }

    /// Broadcast one event to every connected viewer. A send error only
    /// means no viewer is connected, which is fine during setup.
    fn emit(&self, envelope: EventEnvelope) {
        match serde_json::to_string(&envelope) {
            Ok(json) => {
                let _ = self.outbound.send(json);
            }
            Err(e) => warn!("failed to serialize event: {e}"),
        }
    }

    fn emit_for_current_player(&self, event: AuctionEvent) {
        let (player_id, player_name) = match self.state.current_player() {
            Some(p) => (Some(p.id), Some(p.name.clone())),
            None => (None, None),
        };
        self.emit(EventEnvelope::moderator(
            &self.config.admin_name,
            player_id,
            player_name,
            event,
        ));
    }

    /// Build the sale card for the winning team. The label defaults to
    /// the team's classic template.
    fn card_for(&self, team_id: &str, label: Option<&str>) -> CardAssignment {
        let code = self
            .state
            .team(team_id)
            .map(|t| t.code.clone())
            .unwrap_or_else(|| team_id.to_string());
        let label = label
            .map(|l| l.to_string())
            .unwrap_or_else(|| format!("{code} Classic"));
        let slug = label.to_lowercase().replace(' ', "-");
        CardAssignment {
            id: format!("{team_id}-{slug}"),
            label,
        }
    }

    /// One-line auction status for the console.
    pub fn status_line(&self) -> String {
        let summary = self.state.category_summary();
        let player_line = match self.state.current_player() {
            Some(p) => format!(
                "{} ({}) [{}] bid {} L by {}",
                p.name,
                p.standard_role(),
                p.sold_status,
                p.current_bid,
                self.state.highest_bidder.as_deref().unwrap_or("nobody")
            ),
            None => "no active player".to_string(),
        };
        let purses: Vec<String> = self
            .state
            .teams
            .iter()
            .map(|t| format!("{} {}", t.code, fmt_crores(t.funds)))
            .collect();
        format!(
            "{} | category {} ({} open / {} sold / {} unsold of {}) | {} | viewers: {}",
            player_line,
            self.state.selected_category,
            summary.open,
            summary.sold,
            summary.unsold,
            summary.total,
            purses.join(", "),
            self.viewer_count,
        )
    }
}

/// Build the authoritative state from configuration and storage: teams at
/// their persisted purse (or the configured starting purse on first run)
/// with rosters rebuilt from sold player records, and the pool in
/// creation order. Storage being empty yields a degraded-but-usable
/// empty pool rather than a failure.
pub fn build_auction_state(config: &Config, db: &Database) -> anyhow::Result<AuctionState> {
    db.ensure_teams(&config.teams, config.auction.starting_purse)?;
    let rows = db.load_teams()?;
    let records = db.load_players()?;

    let teams = config
        .teams
        .iter()
        .map(|tc| {
            let mut team = Team::from_config(tc, config.auction.starting_purse);
            if let Some(row) = rows.iter().find(|r| r.id == tc.id) {
                team.funds = row.purse_balance;
                team.initial_funds = row.initial_purse;
                team.roster = records
                    .iter()
                    .filter(|r| row.sold_players.contains(&r.id))
                    .cloned()
                    .map(Player::from_record)
                    .collect();
            }
            team
        })
        .collect();

    Ok(AuctionState::new(records, teams))
}

/// Run the moderator event loop: viewer hub events and console commands.
pub async fn run(
    mut ws_rx: mpsc::Receiver<WsEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut app: AppState,
) -> anyhow::Result<()> {
    info!("Moderator event loop started");

    loop {
        tokio::select! {
            ws_event = ws_rx.recv() => {
                match ws_event {
                    Some(event) => handle_ws_event(&mut app, event),
                    None => {
                        info!("WebSocket channel closed, shutting down");
                        break;
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => handle_user_command(&mut app, cmd),
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    info!("Moderator event loop exiting");
    Ok(())
}

/// Handle a hub event. Viewer traffic never mutates authoritative state.
fn handle_ws_event(app: &mut AppState, event: WsEvent) {
    match event {
        WsEvent::Connected { addr } => {
            app.viewer_count += 1;
            info!("Viewer connected from {addr} ({} total)", app.viewer_count);
        }
        WsEvent::Disconnected { addr } => {
            app.viewer_count = app.viewer_count.saturating_sub(1);
            info!("Viewer {addr} disconnected ({} left)", app.viewer_count);
        }
        WsEvent::Message { addr, text } => match serde_json::from_str::<EventEnvelope>(&text) {
            Ok(envelope) => match envelope.event {
                AuctionEvent::DashboardConnected { team_id, team_name } => {
                    info!("Dashboard identified: {team_name} ({team_id}) at {addr}");
                }
                other => {
                    warn!("Ignoring non-informational viewer event {other:?} from {addr}");
                }
            },
            Err(e) => warn!("Unparseable viewer message from {addr}: {e}"),
        },
    }
}

/// Apply one moderator command: snapshot for undo, run the transition,
/// write through to storage, broadcast to viewers.
pub fn handle_user_command(app: &mut AppState, cmd: UserCommand) {
    match cmd {
        UserCommand::Bid { team_id, amount } => {
            let current = app
                .state
                .current_player()
                .map(|p| p.current_bid)
                .unwrap_or(0);
            let amount = amount.unwrap_or_else(|| current + next_bid_increment(current));

            let snapshot = app.state.snapshot();
            if !app.state.place_bid(&team_id, amount) {
                println!("bid rejected: check the active player and {team_id}'s wallet");
                return;
            }
            app.history.record(snapshot);

            // Optimistic local update happened above; a failed write-through
            // is reported, never rolled back.
            if let Some(player) = app.state.current_player() {
                let patch = PlayerPatch {
                    current_bid: Some(amount),
                    highest_bidder: Some(Some(team_id.clone())),
                    bid_history: Some(app.state.bid_history.clone()),
                    ..Default::default()
                };
                if let Err(e) = app.db.update_player(player.id, &patch) {
                    warn!("bid write-through failed for player {}: {e}", player.id);
                }
            }

            app.emit_for_current_player(AuctionEvent::Bid {
                team_id: team_id.clone(),
                bid_amount: amount,
            });
            println!("HIGHEST BID: {team_id} at {amount} L");
        }

        UserCommand::Sell { card_label } => {
            let Some(winner) = app.state.highest_bidder.clone() else {
                println!("cannot sell: no bidder yet (NO_BIDDER)");
                return;
            };
            let card = app.card_for(&winner, card_label.as_deref());

            let snapshot = app.state.snapshot();
            match app
                .state
                .sell_player(Some(card.clone()), &app.config.admin_name)
            {
                Ok(outcome) => {
                    app.history.record(snapshot);

                    if let Err(e) = app.db.record_sale(
                        outcome.player_id,
                        &outcome.team_id,
                        outcome.sold_amount,
                        Some(&card),
                    ) {
                        warn!("sale write-through failed: {e}");
                    }

                    app.emit(EventEnvelope::moderator(
                        &app.config.admin_name,
                        Some(outcome.player_id),
                        Some(outcome.player_name.clone()),
                        AuctionEvent::Sold {
                            team_id: outcome.team_id.clone(),
                            team_name: outcome.team_name.clone(),
                            sold_amount: outcome.sold_amount,
                            assigned_card: Some(card),
                        },
                    ));
                    println!(
                        "SOLD: {} to {} at {} L (wallet {} -> {})",
                        outcome.player_name,
                        outcome.team_name,
                        outcome.sold_amount,
                        fmt_crores(outcome.wallet_before),
                        fmt_crores(outcome.wallet_after),
                    );
                }
                Err(SellError::InsufficientFunds {
                    available,
                    required,
                }) => {
                    println!(
                        "cannot sell (INSUFFICIENT_FUNDS): required {}, available {}",
                        fmt_crores(required),
                        fmt_crores(available)
                    );
                }
                Err(e) => println!("cannot sell ({}): {e}", e.code()),
            }
        }

        UserCommand::Unsold => {
            let snapshot = app.state.snapshot();
            if !app.state.mark_unsold(&app.config.admin_name) {
                println!("cannot mark unsold: no active player or already closed");
                return;
            }
            app.history.record(snapshot);

            if let Some(player) = app.state.current_player() {
                let patch = PlayerPatch {
                    highest_bidder: Some(None),
                    sold_status: Some("UNSOLD".into()),
                    sold_to: Some(None),
                    sold_price: Some(None),
                    assigned_card: Some(None),
                    is_closed: Some(true),
                    bid_history: Some(vec![]),
                    ..Default::default()
                };
                if let Err(e) = app.db.update_player(player.id, &patch) {
                    warn!("unsold write-through failed for player {}: {e}", player.id);
                }
                println!("UNSOLD: {}", player.name);
            }
            app.emit_for_current_player(AuctionEvent::Unsold);
        }

        UserCommand::Reopen => {
            let prior = app.state.current_player().map(|p| (p.id, p.sold_status));
            let snapshot = app.state.snapshot();
            if !app.state.reopen_player(&app.config.admin_name) {
                println!("cannot reopen: player is still open");
                return;
            }
            app.history.record(snapshot);

            if let Some((player_id, status)) = prior {
                use crate::auction::player::SoldStatus;
                let result = if status == SoldStatus::Sold {
                    app.db.revert_sale(player_id)
                } else {
                    app.db.update_player(
                        player_id,
                        &PlayerPatch {
                            highest_bidder: Some(None),
                            sold_status: Some("OPEN".into()),
                            sold_to: Some(None),
                            sold_price: Some(None),
                            assigned_card: Some(None),
                            is_closed: Some(false),
                            ..Default::default()
                        },
                    )
                };
                if let Err(e) = result {
                    warn!("reopen write-through failed for player {player_id}: {e}");
                }
            }

            if let Some(player) = app.state.current_player() {
                println!("REOPENED: {}", player.name);
            }
            app.emit_for_current_player(AuctionEvent::Reopen);
        }

        UserCommand::Next => {
            let snapshot = app.state.snapshot();
            match app.state.advance(Direction::Next) {
                Some(_) => {
                    app.history.record(snapshot);
                    if let Some(player) = app.state.current_player() {
                        println!("NEXT: {} (base {} L)", player.name, player.base_price);
                    }
                    app.emit_for_current_player(AuctionEvent::NextPlayer);
                }
                None => println!("no players in the current category"),
            }
        }

        UserCommand::Previous => {
            let snapshot = app.state.snapshot();
            match app.state.advance(Direction::Previous) {
                Some(_) => {
                    app.history.record(snapshot);
                    if let Some(player) = app.state.current_player() {
                        println!("PREVIOUS: {} (base {} L)", player.name, player.base_price);
                    }
                    app.emit_for_current_player(AuctionEvent::PreviousPlayer);
                }
                None => println!("no players in the current category"),
            }
        }

        UserCommand::SetCategory { category } => {
            let snapshot = app.state.snapshot();
            app.state.set_category(&category);
            app.history.record(snapshot);
            let applied = app.state.selected_category.clone();
            println!("category: {applied}");
            app.emit_for_current_player(AuctionEvent::CategoryChanged { category: applied });
        }

        UserCommand::Undo => {
            let live = app.state.snapshot();
            match app.history.undo(live) {
                Some(previous) => {
                    app.state.apply_snapshot(previous.clone());
                    app.emit_for_current_player(AuctionEvent::Undo {
                        state_snapshot: previous,
                    });
                    println!("undo applied");
                }
                None => println!("nothing to undo"),
            }
        }

        UserCommand::Redo => {
            let live = app.state.snapshot();
            match app.history.redo(live) {
                Some(next) => {
                    app.state.apply_snapshot(next.clone());
                    app.emit_for_current_player(AuctionEvent::Redo {
                        state_snapshot: next,
                    });
                    println!("redo applied");
                }
                None => println!("nothing to redo"),
            }
        }

        UserCommand::BreakStart { seconds } => {
            let break_ends_at = Utc::now().timestamp_millis() + (seconds as i64) * 1000;
            app.break_ends_at = Some(break_ends_at);
            app.emit_for_current_player(AuctionEvent::BreakStart {
                duration_seconds: seconds,
                break_ends_at,
            });
            println!("break started for {seconds}s");
        }

        UserCommand::BreakEnd => {
            app.break_ends_at = None;
            app.emit_for_current_player(AuctionEvent::BreakEnd);
            println!("break ended");
        }

        UserCommand::Reset => match app.db.reset_auction() {
            Ok(pool) => {
                app.state.reset_with_pool(pool);
                app.history.clear();
                app.break_ends_at = None;
                app.emit_for_current_player(AuctionEvent::ResetAuction {
                    state_snapshot: app.state.snapshot(),
                });
                println!("auction reset: {} players open", app.state.players.len());
            }
            Err(e) => {
                // Local state is kept; the moderator can retry.
                warn!("reset failed: {e}");
                println!("reset failed: {e}");
            }
        },

        UserCommand::Status => {
            println!("{}", app.status_line());
        }

        UserCommand::Quit => {
            // Handled in the main loop.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::player::SoldStatus;
    use crate::config::{AuctionConfig, PlayerSeed, TeamConfig};

    fn test_config() -> Config {
        Config {
            auction: AuctionConfig {
                name: "Test Auction".into(),
                starting_purse: 10_000,
            },
            teams: vec![
                TeamConfig {
                    id: "MUM".into(),
                    code: "MUM".into(),
                    name: "Mumbai Mavericks".into(),
                    color: "#3b82f6".into(),
                },
                TeamConfig {
                    id: "DEL".into(),
                    code: "DEL".into(),
                    name: "Delhi Dynamos".into(),
                    color: "#ef4444".into(),
                },
            ],
            admin_name: "Admin-1".into(),
            ws_port: 9800,
            db_path: ":memory:".into(),
        }
    }

    fn seed(name: &str, base_price: u32, category: &str) -> PlayerSeed {
        PlayerSeed {
            name: name.into(),
            country: "IND".into(),
            rating: 80,
            matches: 0,
            runs: 0,
            wickets: 0,
            average: 0.0,
            strike_rate: 0.0,
            base_price,
            category: category.into(),
            image: None,
        }
    }

    fn test_app() -> (AppState, broadcast::Receiver<String>) {
        let config = test_config();
        let db = Database::open(":memory:").unwrap();
        db.import_players(&[
            seed("Rassie van Berg", 2_000, "Foreign_Batters"),
            seed("Arjun Mehta", 500, "Star_Indian_Batter"),
        ])
        .unwrap();
        let state = build_auction_state(&config, &db).unwrap();
        let (outbound, rx) = broadcast::channel(64);
        (AppState::new(config, state, db, outbound), rx)
    }

    fn recv_event(rx: &mut broadcast::Receiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.try_recv().expect("expected a broadcast event")).unwrap()
    }

    #[test]
    fn build_state_uses_config_and_storage() {
        let (app, _rx) = test_app();
        assert_eq!(app.state.teams.len(), 2);
        assert_eq!(app.state.teams[0].funds, 10_000);
        assert_eq!(app.state.players.len(), 2);
        assert_eq!(app.state.players[0].name, "Rassie van Berg");
    }

    #[test]
    fn build_state_restores_rosters_after_restart() {
        let config = test_config();
        let db = Database::open(":memory:").unwrap();
        db.import_players(&[seed("Rassie van Berg", 2_000, "Foreign_Batters")])
            .unwrap();
        db.ensure_teams(&config.teams, 10_000).unwrap();
        let id = db.load_players().unwrap()[0].id;
        db.record_sale(id, "MUM", 5_000, None).unwrap();

        let state = build_auction_state(&config, &db).unwrap();
        let mum = state.team("MUM").unwrap();
        assert_eq!(mum.funds, 5_000);
        assert_eq!(mum.roster.len(), 1);
        assert_eq!(mum.roster[0].name, "Rassie van Berg");
    }

    #[test]
    fn bid_command_persists_and_broadcasts() {
        let (mut app, mut rx) = test_app();

        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "MUM".into(),
                amount: Some(5_000),
            },
        );

        assert_eq!(app.state.current_player().unwrap().current_bid, 5_000);
        assert_eq!(app.state.highest_bidder.as_deref(), Some("MUM"));

        // Write-through landed.
        let persisted = &app.db.load_players().unwrap()[0];
        assert_eq!(persisted.current_bid, Some(5_000));
        assert_eq!(persisted.highest_bidder.as_deref(), Some("MUM"));
        assert_eq!(persisted.bid_history.len(), 1);

        let event = recv_event(&mut rx);
        assert_eq!(event["type"], "BID");
        assert_eq!(event["teamId"], "MUM");
        assert_eq!(event["bidAmount"], 5_000);
    }

    #[test]
    fn bid_without_amount_steps_up_the_ladder() {
        let (mut app, mut rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "MUM".into(),
                amount: None,
            },
        );
        // Base 2000 is past the 1000 threshold: +100.
        assert_eq!(app.state.current_player().unwrap().current_bid, 2_100);
        let event = recv_event(&mut rx);
        assert_eq!(event["bidAmount"], 2_100);
    }

    #[test]
    fn rejected_bid_leaves_no_history_or_event() {
        let (mut app, mut rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "XYZ".into(),
                amount: Some(100),
            },
        );
        assert!(!app.history.can_undo());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sell_command_runs_full_transaction() {
        let (mut app, mut rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "MUM".into(),
                amount: Some(5_000),
            },
        );
        let _ = rx.try_recv();

        handle_user_command(&mut app, UserCommand::Sell { card_label: None });

        let team = app.state.team("MUM").unwrap();
        assert_eq!(team.funds, 5_000);
        assert_eq!(team.roster.len(), 1);
        assert_eq!(
            app.state.current_player().unwrap().sold_status,
            SoldStatus::Sold
        );

        // Durable on both sides.
        let persisted = &app.db.load_players().unwrap()[0];
        assert_eq!(persisted.sold_status, "SOLD");
        assert_eq!(persisted.sold_price, Some(5_000));
        let rows = app.db.load_teams().unwrap();
        let mum = rows.iter().find(|t| t.id == "MUM").unwrap();
        assert_eq!(mum.purse_balance, 5_000);

        let event = recv_event(&mut rx);
        assert_eq!(event["type"], "SOLD");
        assert_eq!(event["teamId"], "MUM");
        assert_eq!(event["soldAmount"], 5_000);
        assert_eq!(event["assignedCard"]["label"], "MUM Classic");
    }

    #[test]
    fn sell_without_bid_reports_no_bidder() {
        let (mut app, mut rx) = test_app();
        handle_user_command(&mut app, UserCommand::Sell { card_label: None });
        assert_eq!(
            app.state.current_player().unwrap().sold_status,
            SoldStatus::Open
        );
        assert!(rx.try_recv().is_err());
        assert!(!app.history.can_undo());
    }

    #[test]
    fn undo_restores_pre_sale_state_and_broadcasts_snapshot() {
        let (mut app, mut rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "MUM".into(),
                amount: Some(5_000),
            },
        );
        handle_user_command(&mut app, UserCommand::Sell { card_label: None });
        let _ = rx.try_recv();
        let _ = rx.try_recv();

        handle_user_command(&mut app, UserCommand::Undo);

        // Back to the pre-sale world: bid standing, wallet untouched.
        assert_eq!(app.state.team("MUM").unwrap().funds, 10_000);
        assert_eq!(
            app.state.current_player().unwrap().sold_status,
            SoldStatus::Open
        );
        assert_eq!(app.state.highest_bidder.as_deref(), Some("MUM"));

        let event = recv_event(&mut rx);
        assert_eq!(event["type"], "UNDO");
        assert_eq!(
            event["stateSnapshot"]["teams"][0]["funds"],
            10_000,
            "snapshot rides along for viewers"
        );
    }

    #[test]
    fn undo_then_redo_lands_on_post_op_state() {
        let (mut app, _rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "MUM".into(),
                amount: Some(5_000),
            },
        );
        handle_user_command(&mut app, UserCommand::Sell { card_label: None });
        let after_sell = app.state.snapshot();

        handle_user_command(&mut app, UserCommand::Undo);
        handle_user_command(&mut app, UserCommand::Redo);

        assert_eq!(app.state.snapshot(), after_sell);
    }

    #[test]
    fn reopen_after_sell_refunds_and_persists() {
        let (mut app, _rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "MUM".into(),
                amount: Some(5_000),
            },
        );
        handle_user_command(&mut app, UserCommand::Sell { card_label: None });
        handle_user_command(&mut app, UserCommand::Reopen);

        assert_eq!(app.state.team("MUM").unwrap().funds, 10_000);
        assert!(app.state.team("MUM").unwrap().roster.is_empty());
        assert_eq!(
            app.state.current_player().unwrap().sold_status,
            SoldStatus::Open
        );

        let persisted = &app.db.load_players().unwrap()[0];
        assert_eq!(persisted.sold_status, "OPEN");
        assert!(persisted.sold_to.is_none());
        let rows = app.db.load_teams().unwrap();
        assert_eq!(
            rows.iter().find(|t| t.id == "MUM").unwrap().purse_balance,
            10_000
        );
    }

    #[test]
    fn category_and_navigation_commands_broadcast() {
        let (mut app, mut rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::SetCategory {
                category: "ALL".into(),
            },
        );
        let event = recv_event(&mut rx);
        assert_eq!(event["type"], "CATEGORY_CHANGED");
        assert_eq!(event["category"], "ALL");

        handle_user_command(&mut app, UserCommand::Next);
        let event = recv_event(&mut rx);
        assert_eq!(event["type"], "NEXT_PLAYER");
        assert_eq!(event["playerName"], "Arjun Mehta");
    }

    #[test]
    fn break_event_carries_wall_clock_deadline() {
        let (mut app, mut rx) = test_app();
        let before = Utc::now().timestamp_millis();
        handle_user_command(&mut app, UserCommand::BreakStart { seconds: 300 });

        let event = recv_event(&mut rx);
        assert_eq!(event["type"], "BREAK_START");
        assert_eq!(event["durationSeconds"], 300);
        let ends_at = event["breakEndsAt"].as_i64().unwrap();
        assert!(ends_at >= before + 300_000);
        assert!(ends_at <= Utc::now().timestamp_millis() + 300_000);
        assert!(app.break_ends_at.is_some());

        handle_user_command(&mut app, UserCommand::BreakEnd);
        assert!(app.break_ends_at.is_none());
        assert_eq!(recv_event(&mut rx)["type"], "BREAK_END");
    }

    #[test]
    fn reset_clears_history_and_broadcasts_snapshot() {
        let (mut app, mut rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "MUM".into(),
                amount: Some(5_000),
            },
        );
        handle_user_command(&mut app, UserCommand::Sell { card_label: None });
        assert!(app.history.can_undo());
        let _ = rx.try_recv();
        let _ = rx.try_recv();

        handle_user_command(&mut app, UserCommand::Reset);

        assert!(!app.history.can_undo());
        assert_eq!(app.state.team("MUM").unwrap().funds, 10_000);
        assert_eq!(
            app.state.current_player().unwrap().sold_status,
            SoldStatus::Open
        );
        assert!(app.state.logs.is_empty());

        let event = recv_event(&mut rx);
        assert_eq!(event["type"], "RESET_AUCTION");
        assert!(event["stateSnapshot"]["playerPool"].is_array());
    }

    #[test]
    fn viewer_messages_never_mutate_state() {
        let (mut app, _rx) = test_app();
        let before = app.state.snapshot();

        handle_ws_event(
            &mut app,
            WsEvent::Connected {
                addr: "127.0.0.1:5000".into(),
            },
        );
        assert_eq!(app.viewer_count, 1);

        let hello = serde_json::to_string(&EventEnvelope::viewer(
            AuctionEvent::DashboardConnected {
                team_id: "MUM".into(),
                team_name: "Mumbai Mavericks".into(),
            },
        ))
        .unwrap();
        handle_ws_event(
            &mut app,
            WsEvent::Message {
                addr: "127.0.0.1:5000".into(),
                text: hello,
            },
        );
        handle_ws_event(
            &mut app,
            WsEvent::Message {
                addr: "127.0.0.1:5000".into(),
                text: "not json".into(),
            },
        );

        assert_eq!(app.state.snapshot(), before);

        handle_ws_event(
            &mut app,
            WsEvent::Disconnected {
                addr: "127.0.0.1:5000".into(),
            },
        );
        assert_eq!(app.viewer_count, 0);
    }

    #[test]
    fn status_line_reads_sanely() {
        let (mut app, _rx) = test_app();
        handle_user_command(
            &mut app,
            UserCommand::Bid {
                team_id: "MUM".into(),
                amount: Some(5_000),
            },
        );
        let line = app.status_line();
        assert!(line.contains("Rassie van Berg"));
        assert!(line.contains("MUM"));
        assert!(line.contains("100.00 Cr"));
    }
}
