// Auction state store: the single authoritative model of players, teams,
// bids and sale outcomes, with validated state transitions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::log::{AuctionLogEntry, LogKind};
use super::player::{BidRecord, CardAssignment, Player, SoldStatus};
use super::team::Team;
use crate::db::PlayerRecord;

/// Category filter value meaning "no filter".
pub const ALL_CATEGORIES: &str = "ALL";

/// Coded failure reasons for [`AuctionState::sell_player`]. Callers branch
/// on the variant (or its wire code) to render a specific message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SellError {
    #[error("no active player")]
    NoActivePlayer,
    #[error("no bid has been placed on the active player")]
    NoBidder,
    #[error("player is already closed")]
    PlayerClosed,
    #[error("winning team is not registered")]
    InvalidTeam,
    #[error("insufficient funds: required {required} L, available {available} L")]
    InsufficientFunds { available: u32, required: u32 },
    #[error("team roster is already at capacity")]
    TeamFull,
}

impl SellError {
    /// Stable wire/code string for UI branching.
    pub fn code(&self) -> &'static str {
        match self {
            SellError::NoActivePlayer => "NO_ACTIVE_PLAYER",
            SellError::NoBidder => "NO_BIDDER",
            SellError::PlayerClosed => "PLAYER_CLOSED",
            SellError::InvalidTeam => "INVALID_TEAM",
            SellError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            SellError::TeamFull => "TEAM_FULL",
        }
    }
}

/// Result of a successful sale.
#[derive(Debug, Clone, PartialEq)]
pub struct SellOutcome {
    pub player_id: i64,
    pub player_name: String,
    pub team_id: String,
    pub team_name: String,
    pub sold_amount: u32,
    pub wallet_before: u32,
    pub wallet_after: u32,
}

/// Direction for moving the active-player pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Sold/unsold/open tallies for the players matching the current filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategorySummary {
    pub total: usize,
    pub sold: usize,
    pub unsold: usize,
    pub open: usize,
}

/// A deep, structurally complete copy of the auction state, used for
/// undo/redo and cross-client reconciliation. Every field defaults so a
/// partial or malformed snapshot deserializes to safe values instead of
/// propagating a failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSnapshot {
    #[serde(default)]
    pub player_pool: Vec<Player>,
    #[serde(default)]
    pub selected_category: String,
    #[serde(default)]
    pub active_player_index: usize,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub highest_bidder: Option<String>,
    #[serde(default)]
    pub bid_history: Vec<BidRecord>,
    #[serde(default)]
    pub auction_logs: Vec<AuctionLogEntry>,
}

/// The authoritative in-memory auction state.
///
/// One instance per process, constructed at startup and injected into the
/// transport/console layers. Moderator mutations run here; viewer mirrors
/// run the same transitions with persistence suppressed.
#[derive(Debug, Clone)]
pub struct AuctionState {
    pub players: Vec<Player>,
    pub selected_category: String,
    pub active_index: usize,
    pub teams: Vec<Team>,
    /// Team currently holding the high bid on the active player.
    pub highest_bidder: Option<String>,
    /// Bid history for the active player; cleared on every pointer move.
    pub bid_history: Vec<BidRecord>,
    /// Newest-first log of completed actions.
    pub logs: Vec<AuctionLogEntry>,
}

impl AuctionState {
    /// Build the state from the persisted pool and configured teams,
    /// anchoring the pointer to the first player of the first category.
    pub fn new(records: Vec<PlayerRecord>, teams: Vec<Team>) -> Self {
        let players: Vec<Player> = records.into_iter().map(Player::from_record).collect();
        let mut state = AuctionState {
            players,
            selected_category: ALL_CATEGORIES.to_string(),
            active_index: 0,
            teams,
            highest_bidder: None,
            bid_history: Vec::new(),
            logs: Vec::new(),
        };
        state.anchor_to_first_category();
        state
    }

    /// Re-anchor to the first available category and its first player,
    /// seeding the session bid pointer from the persisted player record.
    fn anchor_to_first_category(&mut self) {
        let category = self
            .available_categories()
            .into_iter()
            .next()
            .unwrap_or_else(|| ALL_CATEGORIES.to_string());
        self.selected_category = category;
        let indices = self.category_indices();
        self.active_index = indices.first().copied().unwrap_or(0);
        self.highest_bidder = self
            .current_player()
            .and_then(|p| p.highest_bidder.clone());
        self.bid_history.clear();
    }

    // ------------------------------------------------------------------
    // Lookups and derived views
    // ------------------------------------------------------------------

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.active_index)
    }

    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == team_id)
    }

    pub fn team_mut(&mut self, team_id: &str) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.id == team_id)
    }

    /// Distinct categories present in the pool, in first-seen order.
    pub fn available_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for player in &self.players {
            if !categories.iter().any(|c| c == &player.category) {
                categories.push(player.category.clone());
            }
        }
        categories
    }

    fn matches_category(player: &Player, category: &str) -> bool {
        category == ALL_CATEGORIES || player.category == category
    }

    /// Pool indices matching the current category filter, in pool order.
    pub fn category_indices(&self) -> Vec<usize> {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, p)| Self::matches_category(p, &self.selected_category))
            .map(|(i, _)| i)
            .collect()
    }

    /// Tallies for the players matching the current filter.
    pub fn category_summary(&self) -> CategorySummary {
        let mut summary = CategorySummary::default();
        for &idx in &self.category_indices() {
            summary.total += 1;
            match self.players[idx].sold_status {
                SoldStatus::Sold => summary.sold += 1,
                SoldStatus::Unsold => summary.unsold += 1,
                SoldStatus::Open => summary.open += 1,
            }
        }
        summary
    }

    fn clear_bid_state(&mut self) {
        self.highest_bidder = None;
        self.bid_history.clear();
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    /// Record a bid on the active player.
    ///
    /// Fails silently (returns `false`, nothing mutated) when there is no
    /// active player, the player is closed, the team is unknown, or the
    /// team's wallet is below `amount`. Wallets and bids share the lakh
    /// unit, so no conversion is involved.
    pub fn place_bid(&mut self, team_id: &str, amount: u32) -> bool {
        if self.active_index >= self.players.len() {
            return false;
        }
        if self.players[self.active_index].is_closed() {
            return false;
        }
        let Some(team) = self.team(team_id) else {
            return false;
        };
        if !team.can_afford(amount) {
            return false;
        }

        let player = &mut self.players[self.active_index];
        player.current_bid = amount;
        player.highest_bidder = Some(team_id.to_string());
        self.highest_bidder = Some(team_id.to_string());
        self.bid_history.push(BidRecord {
            team_id: team_id.to_string(),
            amount,
            timestamp: Utc::now(),
        });
        true
    }

    /// Finalize the sale of the active player to the current highest
    /// bidder.
    ///
    /// Wallet debit, roster append and player status flip are applied
    /// together; callers wrap the whole call in one undo snapshot so the
    /// transaction is undo-indivisible.
    pub fn sell_player(
        &mut self,
        assigned_card: Option<CardAssignment>,
        admin_name: &str,
    ) -> Result<SellOutcome, SellError> {
        if self.active_index >= self.players.len() {
            return Err(SellError::NoActivePlayer);
        }
        let Some(winning_team_id) = self.highest_bidder.clone() else {
            return Err(SellError::NoBidder);
        };
        if self.players[self.active_index].is_closed() {
            return Err(SellError::PlayerClosed);
        }
        let bid_amount = self.players[self.active_index].current_bid;
        let Some(team_idx) = self.teams.iter().position(|t| t.id == winning_team_id) else {
            return Err(SellError::InvalidTeam);
        };
        let wallet_before = self.teams[team_idx].funds;
        if wallet_before < bid_amount {
            return Err(SellError::InsufficientFunds {
                available: wallet_before,
                required: bid_amount,
            });
        }
        if self.teams[team_idx].roster_full() {
            return Err(SellError::TeamFull);
        }

        let team_name = self.teams[team_idx].name.clone();
        let player = &mut self.players[self.active_index];
        player.sold_status = SoldStatus::Sold;
        player.sold_to = Some(winning_team_id.clone());
        player.sold_price = Some(bid_amount);
        player.assigned_card = assigned_card.clone();
        player.highest_bidder = None;

        let sale_snapshot = player.clone();
        let player_id = player.id;
        let player_name = player.name.clone();

        self.teams[team_idx].acquire(sale_snapshot, bid_amount);
        let wallet_after = self.teams[team_idx].funds;

        self.logs.insert(
            0,
            AuctionLogEntry::sold(
                player_id,
                &player_name,
                bid_amount,
                &winning_team_id,
                &team_name,
                wallet_before,
                wallet_after,
                admin_name,
                assigned_card.as_ref().map(|c| c.label.as_str()),
            ),
        );
        self.clear_bid_state();

        Ok(SellOutcome {
            player_id,
            player_name,
            team_id: winning_team_id,
            team_name,
            sold_amount: bid_amount,
            wallet_before,
            wallet_after,
        })
    }

    /// Close the active player without a sale. Returns `false` when there
    /// is no active player or the player is already closed.
    pub fn mark_unsold(&mut self, admin_name: &str) -> bool {
        if self.active_index >= self.players.len() {
            return false;
        }
        if self.players[self.active_index].is_closed() {
            return false;
        }

        let player = &mut self.players[self.active_index];
        player.sold_status = SoldStatus::Unsold;
        player.highest_bidder = None;
        player.sold_to = None;
        player.sold_price = None;
        player.assigned_card = None;
        let entry = AuctionLogEntry::outcome(LogKind::Unsold, player.id, &player.name, admin_name);

        self.logs.insert(0, entry);
        self.clear_bid_state();
        true
    }

    /// Reverse a terminal SOLD/UNSOLD outcome back to OPEN.
    ///
    /// A no-op (returns `false`, nothing logged) when the player is still
    /// open. If the prior state was SOLD, the owning team is refunded the
    /// recorded sale price and the player leaves its roster.
    pub fn reopen_player(&mut self, admin_name: &str) -> bool {
        if self.active_index >= self.players.len() {
            return false;
        }
        if !self.players[self.active_index].is_closed() {
            return false;
        }

        let player_id = self.players[self.active_index].id;
        let player_name = self.players[self.active_index].name.clone();
        let was_sold = self.players[self.active_index].sold_status == SoldStatus::Sold;
        if was_sold {
            let sold_to = self.players[self.active_index].sold_to.clone();
            // Refund basis is the recorded sale price, not the current bid.
            let refund = self.players[self.active_index]
                .sold_price
                .unwrap_or(self.players[self.active_index].current_bid);
            match sold_to.as_deref().and_then(|id| self.team_mut(id)) {
                Some(team) => team.release(player_id, refund),
                None => warn!(
                    "reopen: sold player {player_name} has no registered owning team, skipping refund"
                ),
            }
        }

        self.players[self.active_index].reopen();
        self.logs.insert(
            0,
            AuctionLogEntry::outcome(LogKind::Reopen, player_id, &player_name, admin_name),
        );
        self.clear_bid_state();
        true
    }

    /// Move the active-player pointer within the current category filter,
    /// wrapping circularly. Clears bid state for the newly active player.
    /// Returns the new active player id, or `None` (after defensively
    /// clearing bid state) when the filtered set is empty.
    pub fn advance(&mut self, direction: Direction) -> Option<i64> {
        self.clear_bid_state();
        let indices = self.category_indices();
        if indices.is_empty() {
            return None;
        }

        let position = indices.iter().position(|&i| i == self.active_index);
        let next_position = match (direction, position) {
            (_, None) => 0,
            (Direction::Next, Some(p)) => (p + 1) % indices.len(),
            (Direction::Previous, Some(0)) => indices.len() - 1,
            (Direction::Previous, Some(p)) => p - 1,
        };
        self.active_index = indices[next_position];
        Some(self.players[self.active_index].id)
    }

    /// Change the category filter, re-anchoring the pointer to the first
    /// matching player (or leaving it at 0 when the filter is empty).
    /// Unknown categories fall back to the unfiltered view.
    pub fn set_category(&mut self, category: &str) {
        let known = category == ALL_CATEGORIES
            || self.available_categories().iter().any(|c| c == category);
        self.selected_category = if known {
            category.to_string()
        } else {
            ALL_CATEGORIES.to_string()
        };

        let indices = self.category_indices();
        self.active_index = indices.first().copied().unwrap_or(0);
        self.clear_bid_state();
    }

    /// Replace the pool with the canonical records from the persistence
    /// bridge, restore every team to its starting wallet with an empty
    /// roster, and clear all logs and bid state. Callers also clear the
    /// undo/redo stacks — this is the only operation that discards them.
    pub fn reset_with_pool(&mut self, records: Vec<PlayerRecord>) {
        self.players = records.into_iter().map(Player::from_record).collect();
        for team in &mut self.teams {
            team.funds = team.initial_funds;
            team.roster.clear();
        }
        self.logs.clear();
        self.anchor_to_first_category();
    }

    // ------------------------------------------------------------------
    // Snapshots and reconciliation
    // ------------------------------------------------------------------

    /// Capture a deep, structurally independent copy of the full state.
    pub fn snapshot(&self) -> AuctionSnapshot {
        AuctionSnapshot {
            player_pool: self.players.clone(),
            selected_category: self.selected_category.clone(),
            active_player_index: self.active_index,
            teams: self.teams.clone(),
            highest_bidder: self.highest_bidder.clone(),
            bid_history: self.bid_history.clone(),
            auction_logs: self.logs.clone(),
        }
    }

    /// Restore the state from a snapshot. The pointer is clamped into the
    /// pool bounds and an empty category falls back to the unfiltered view
    /// so partial snapshots cannot leave the state unusable.
    pub fn apply_snapshot(&mut self, snapshot: AuctionSnapshot) {
        self.players = snapshot.player_pool;
        self.selected_category = if snapshot.selected_category.is_empty() {
            ALL_CATEGORIES.to_string()
        } else {
            snapshot.selected_category
        };
        self.active_index = if snapshot.active_player_index < self.players.len() {
            snapshot.active_player_index
        } else {
            0
        };
        self.teams = snapshot.teams;
        self.highest_bidder = snapshot.highest_bidder;
        self.bid_history = snapshot.bid_history;
        self.logs = snapshot.auction_logs;
    }

    /// Merge a bulk read from the persistence bridge into the pool.
    ///
    /// The server copy wins for every field it carries; transient fields
    /// the server copy lacks (current bid, bidder) are preserved from the
    /// local mirror. Pool ordering follows the server read, and the active
    /// pointer is clamped if the pool shrank.
    pub fn reconcile(&mut self, records: Vec<PlayerRecord>) {
        let locals: Vec<Player> = std::mem::take(&mut self.players);
        self.players = records
            .into_iter()
            .map(|mut record| {
                let Some(local) = locals.iter().find(|p| p.id == record.id) else {
                    return Player::from_record(record);
                };
                if record.current_bid.is_none() {
                    record.current_bid = Some(local.current_bid);
                }
                if record.highest_bidder.is_none() {
                    record.highest_bidder = local.highest_bidder.clone();
                }
                if record.sold_status.trim().is_empty() {
                    record.sold_status = local.sold_status.as_str().to_string();
                }
                if record.sold_to.is_none() {
                    record.sold_to = local.sold_to.clone();
                }
                if record.sold_price.is_none() {
                    record.sold_price = local.sold_price;
                }
                if record.assigned_card.is_none() {
                    record.assigned_card = local.assigned_card.clone();
                }
                Player::from_record(record)
            })
            .collect();

        if self.active_index >= self.players.len() {
            self.active_index = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::team::ROSTER_CAP;
    use crate::config::TeamConfig;

    fn record(id: i64, name: &str, base_price: u32, category: &str) -> PlayerRecord {
        PlayerRecord {
            id,
            name: name.into(),
            country: "IND".into(),
            rating: 80,
            matches: 10,
            runs: 300,
            wickets: 5,
            average: 30.0,
            strike_rate: 120.0,
            base_price,
            category: category.into(),
            image: None,
            current_bid: None,
            highest_bidder: None,
            sold_status: "OPEN".into(),
            sold_to: None,
            sold_price: None,
            sold_at: None,
            assigned_card: None,
            bid_history: vec![],
        }
    }

    fn test_teams() -> Vec<Team> {
        [("MUM", "Mumbai Mavericks"), ("DEL", "Delhi Dynamos")]
            .iter()
            .map(|(id, name)| {
                Team::from_config(
                    &TeamConfig {
                        id: (*id).into(),
                        code: (*id).into(),
                        name: (*name).into(),
                        color: "#3b82f6".into(),
                    },
                    10_000,
                )
            })
            .collect()
    }

    fn test_state() -> AuctionState {
        AuctionState::new(
            vec![
                record(1, "Rassie van Berg", 2_000, "Foreign_Batters"),
                record(2, "Arjun Mehta", 500, "Star_Indian_Batter"),
                record(3, "Dale Venter", 800, "Foreign_Fast_Bowlers"),
            ],
            test_teams(),
        )
    }

    fn card() -> CardAssignment {
        CardAssignment {
            id: "MUM-classic".into(),
            label: "MUM Classic".into(),
        }
    }

    #[test]
    fn new_state_anchors_to_first_category() {
        let state = test_state();
        assert_eq!(state.selected_category, "Foreign_Batters");
        assert_eq!(state.active_index, 0);
        assert!(state.highest_bidder.is_none());
        assert!(state.bid_history.is_empty());
    }

    #[test]
    fn place_bid_records_bid_and_history() {
        let mut state = test_state();
        assert!(state.place_bid("MUM", 5_000));
        assert_eq!(state.current_player().unwrap().current_bid, 5_000);
        assert_eq!(
            state.current_player().unwrap().highest_bidder.as_deref(),
            Some("MUM")
        );
        assert_eq!(state.highest_bidder.as_deref(), Some("MUM"));
        assert_eq!(state.bid_history.len(), 1);
        assert_eq!(state.bid_history[0].amount, 5_000);
    }

    #[test]
    fn place_bid_rejects_unknown_team() {
        let mut state = test_state();
        assert!(!state.place_bid("XYZ", 100));
        assert!(state.highest_bidder.is_none());
        assert!(state.bid_history.is_empty());
    }

    #[test]
    fn place_bid_insufficient_funds_leaves_state_unchanged() {
        let mut state = test_state();
        let before_bid = state.current_player().unwrap().current_bid;
        assert!(!state.place_bid("MUM", 10_001));
        assert_eq!(state.current_player().unwrap().current_bid, before_bid);
        assert!(state.current_player().unwrap().highest_bidder.is_none());
        assert!(state.highest_bidder.is_none());
    }

    #[test]
    fn place_bid_rejects_closed_player() {
        let mut state = test_state();
        state.place_bid("MUM", 3_000);
        state.sell_player(Some(card()), "Admin-1").unwrap();
        assert!(!state.place_bid("DEL", 4_000));
    }

    #[test]
    fn sell_without_bid_is_no_bidder() {
        let mut state = test_state();
        let err = state.sell_player(Some(card()), "Admin-1").unwrap_err();
        assert_eq!(err, SellError::NoBidder);
        assert_eq!(err.code(), "NO_BIDDER");
        assert_eq!(state.current_player().unwrap().sold_status, SoldStatus::Open);
        assert_eq!(state.team("MUM").unwrap().funds, 10_000);
    }

    #[test]
    fn sell_scenario_mum_five_thousand() {
        // Team MUM, wallet 10000, bids 5000 on an open player with base 2000.
        let mut state = test_state();
        assert!(state.place_bid("MUM", 5_000));

        let outcome = state.sell_player(Some(card()), "Admin-1").unwrap();
        assert_eq!(outcome.sold_amount, 5_000);
        assert_eq!(outcome.wallet_before, 10_000);
        assert_eq!(outcome.wallet_after, 5_000);

        let team = state.team("MUM").unwrap();
        assert_eq!(team.funds, 5_000);
        assert_eq!(team.roster.len(), 1);

        let player = state.current_player().unwrap();
        assert_eq!(player.sold_status, SoldStatus::Sold);
        assert_eq!(player.sold_to.as_deref(), Some("MUM"));
        assert_eq!(player.sold_price, Some(5_000));
        assert!(player.assigned_card.is_some());
        assert!(player.highest_bidder.is_none());

        // SOLD log entry is prepended with wallet movement.
        let entry = &state.logs[0];
        assert_eq!(entry.kind, LogKind::Sold);
        assert_eq!(entry.wallet_before, Some(10_000));
        assert_eq!(entry.wallet_after, Some(5_000));

        assert!(state.highest_bidder.is_none());
        assert!(state.bid_history.is_empty());
    }

    #[test]
    fn sell_twice_fails_player_closed() {
        let mut state = test_state();
        state.place_bid("MUM", 3_000);
        state.sell_player(Some(card()), "Admin-1").unwrap();

        // A duplicate SOLD application must not double-charge the wallet.
        state.highest_bidder = Some("MUM".into());
        let err = state.sell_player(Some(card()), "Admin-1").unwrap_err();
        assert_eq!(err, SellError::PlayerClosed);
        assert_eq!(state.team("MUM").unwrap().funds, 7_000);
        assert_eq!(state.team("MUM").unwrap().roster.len(), 1);
    }

    #[test]
    fn sell_insufficient_funds_reports_amounts() {
        let mut state = test_state();
        state.place_bid("MUM", 5_000);
        // Wallet drained after the bid was recorded.
        state.team_mut("MUM").unwrap().funds = 1_000;

        let err = state.sell_player(Some(card()), "Admin-1").unwrap_err();
        assert_eq!(
            err,
            SellError::InsufficientFunds {
                available: 1_000,
                required: 5_000
            }
        );
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(state.current_player().unwrap().sold_status, SoldStatus::Open);
        assert!(state.logs.is_empty());
    }

    #[test]
    fn sell_team_full_mutates_nothing() {
        let mut state = test_state();
        for _ in 0..ROSTER_CAP {
            let filler = state.players[1].clone();
            state.team_mut("MUM").unwrap().roster.push(filler);
        }
        state.place_bid("MUM", 3_000);

        let err = state.sell_player(Some(card()), "Admin-1").unwrap_err();
        assert_eq!(err, SellError::TeamFull);
        assert_eq!(state.team("MUM").unwrap().funds, 10_000);
        assert_eq!(state.team("MUM").unwrap().roster.len(), ROSTER_CAP);
        assert_eq!(state.current_player().unwrap().sold_status, SoldStatus::Open);
        assert!(state.logs.is_empty());
    }

    #[test]
    fn sell_vanished_team_is_invalid_team() {
        let mut state = test_state();
        state.place_bid("MUM", 3_000);
        state.teams.retain(|t| t.id != "MUM");
        let err = state.sell_player(Some(card()), "Admin-1").unwrap_err();
        assert_eq!(err, SellError::InvalidTeam);
    }

    #[test]
    fn mark_unsold_closes_player_and_logs() {
        let mut state = test_state();
        state.place_bid("MUM", 3_000);
        assert!(state.mark_unsold("Admin-1"));

        let player = state.current_player().unwrap();
        assert_eq!(player.sold_status, SoldStatus::Unsold);
        assert!(player.highest_bidder.is_none());
        assert!(state.highest_bidder.is_none());
        assert!(state.bid_history.is_empty());

        let entry = &state.logs[0];
        assert_eq!(entry.kind, LogKind::Unsold);
        assert!(entry.sold_amount.is_none());
        assert!(entry.wallet_before.is_none());

        // Already closed: second call is rejected, nothing logged.
        assert!(!state.mark_unsold("Admin-1"));
        assert_eq!(state.logs.len(), 1);
    }

    #[test]
    fn reopen_refunds_recorded_sale_price() {
        let mut state = test_state();
        state.place_bid("MUM", 5_000);
        state.sell_player(Some(card()), "Admin-1").unwrap();
        assert_eq!(state.team("MUM").unwrap().funds, 5_000);

        assert!(state.reopen_player("Admin-1"));
        let team = state.team("MUM").unwrap();
        assert_eq!(team.funds, 10_000);
        assert!(team.roster.is_empty());

        let player = state.current_player().unwrap();
        assert_eq!(player.sold_status, SoldStatus::Open);
        assert!(player.sold_to.is_none());
        assert!(player.sold_price.is_none());
        assert!(player.assigned_card.is_none());

        assert_eq!(state.logs[0].kind, LogKind::Reopen);
    }

    #[test]
    fn reopen_on_open_player_is_idempotent_noop() {
        let mut state = test_state();
        let funds_before = state.team("MUM").unwrap().funds;
        assert!(!state.reopen_player("Admin-1"));
        assert!(state.logs.is_empty());
        assert_eq!(state.team("MUM").unwrap().funds, funds_before);
    }

    #[test]
    fn reopen_unsold_player_has_no_refund() {
        let mut state = test_state();
        state.mark_unsold("Admin-1");
        assert!(state.reopen_player("Admin-1"));
        assert_eq!(state.team("MUM").unwrap().funds, 10_000);
        assert_eq!(state.current_player().unwrap().sold_status, SoldStatus::Open);
    }

    #[test]
    fn wallet_conservation_over_sell_reopen_sequences() {
        let mut state = test_state();
        state.set_category(ALL_CATEGORIES);

        state.place_bid("MUM", 2_000);
        state.sell_player(Some(card()), "Admin-1").unwrap();
        let team = state.team("MUM").unwrap();
        assert_eq!(team.initial_funds - team.funds, team.spent());

        state.advance(Direction::Next);
        state.place_bid("MUM", 700);
        state.sell_player(Some(card()), "Admin-1").unwrap();
        let team = state.team("MUM").unwrap();
        assert_eq!(team.initial_funds - team.funds, team.spent());

        state.reopen_player("Admin-1");
        let team = state.team("MUM").unwrap();
        assert_eq!(team.initial_funds - team.funds, team.spent());
    }

    #[test]
    fn advance_wraps_within_category() {
        let mut state = test_state();
        state.set_category(ALL_CATEGORIES);
        assert_eq!(state.active_index, 0);

        assert_eq!(state.advance(Direction::Next), Some(2));
        assert_eq!(state.advance(Direction::Next), Some(3));
        assert_eq!(state.advance(Direction::Next), Some(1), "wraps circularly");
        assert_eq!(state.advance(Direction::Previous), Some(3));
    }

    #[test]
    fn advance_clears_bid_state() {
        let mut state = test_state();
        state.set_category(ALL_CATEGORIES);
        state.place_bid("MUM", 3_000);
        state.advance(Direction::Next);
        assert!(state.highest_bidder.is_none());
        assert!(state.bid_history.is_empty());
    }

    #[test]
    fn advance_on_empty_filter_clears_defensively() {
        let mut state = AuctionState::new(vec![], test_teams());
        state.highest_bidder = Some("MUM".into());
        assert_eq!(state.advance(Direction::Next), None);
        assert!(state.highest_bidder.is_none());
    }

    #[test]
    fn set_category_reanchors_pointer() {
        let mut state = test_state();
        state.set_category("Foreign_Fast_Bowlers");
        assert_eq!(state.selected_category, "Foreign_Fast_Bowlers");
        assert_eq!(state.active_index, 2);
        assert!(state.highest_bidder.is_none());
    }

    #[test]
    fn set_category_unknown_falls_back_to_all() {
        let mut state = test_state();
        state.set_category("Martian_Spinners");
        assert_eq!(state.selected_category, ALL_CATEGORIES);
        assert_eq!(state.active_index, 0);
    }

    #[test]
    fn empty_category_filter_resets_pointer_without_crash() {
        // A filter that matches zero players: pointer to 0, bidder cleared.
        let mut state = AuctionState::new(
            vec![record(1, "Solo", 100, "Star_Indian_Batter")],
            test_teams(),
        );
        state.place_bid("MUM", 500);
        state.players.clear();
        state.set_category("Foreign_Batters");
        assert_eq!(state.active_index, 0);
        assert!(state.highest_bidder.is_none());
        assert!(state.current_player().is_none());
        assert_eq!(state.category_summary(), CategorySummary::default());
    }

    #[test]
    fn category_summary_counts_outcomes() {
        let mut state = test_state();
        state.set_category(ALL_CATEGORIES);
        state.place_bid("MUM", 2_500);
        state.sell_player(Some(card()), "Admin-1").unwrap();
        state.advance(Direction::Next);
        state.mark_unsold("Admin-1");

        let summary = state.category_summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.sold, 1);
        assert_eq!(summary.unsold, 1);
        assert_eq!(summary.open, 1);
    }

    #[test]
    fn snapshot_is_structurally_independent() {
        let mut state = test_state();
        state.place_bid("MUM", 3_000);
        let snapshot = state.snapshot();

        // Mutating live state must never alter the stored snapshot.
        state.sell_player(Some(card()), "Admin-1").unwrap();
        state.team_mut("MUM").unwrap().funds = 1;

        assert_eq!(snapshot.player_pool[0].sold_status, SoldStatus::Open);
        assert_eq!(snapshot.teams[0].funds, 10_000);
        assert_eq!(snapshot.highest_bidder.as_deref(), Some("MUM"));
    }

    #[test]
    fn apply_snapshot_restores_exact_state() {
        let mut state = test_state();
        state.place_bid("MUM", 3_000);
        let snapshot = state.snapshot();

        state.sell_player(Some(card()), "Admin-1").unwrap();
        state.apply_snapshot(snapshot.clone());

        assert_eq!(state.snapshot(), snapshot);
        assert_eq!(state.current_player().unwrap().sold_status, SoldStatus::Open);
        assert_eq!(state.team("MUM").unwrap().funds, 10_000);
    }

    #[test]
    fn apply_snapshot_clamps_out_of_range_pointer() {
        let mut state = test_state();
        let mut snapshot = state.snapshot();
        snapshot.active_player_index = 99;
        snapshot.selected_category = String::new();
        state.apply_snapshot(snapshot);
        assert_eq!(state.active_index, 0);
        assert_eq!(state.selected_category, ALL_CATEGORIES);
    }

    #[test]
    fn malformed_snapshot_json_defaults_cleanly() {
        let snapshot: AuctionSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.player_pool.is_empty());
        assert!(snapshot.teams.is_empty());
        assert_eq!(snapshot.active_player_index, 0);
        assert!(snapshot.highest_bidder.is_none());
    }

    #[test]
    fn reset_restores_teams_and_clears_logs() {
        let mut state = test_state();
        state.place_bid("MUM", 5_000);
        state.sell_player(Some(card()), "Admin-1").unwrap();
        assert!(!state.logs.is_empty());

        state.reset_with_pool(vec![
            record(1, "Rassie van Berg", 2_000, "Foreign_Batters"),
            record(2, "Arjun Mehta", 500, "Star_Indian_Batter"),
        ]);

        assert_eq!(state.team("MUM").unwrap().funds, 10_000);
        assert!(state.team("MUM").unwrap().roster.is_empty());
        assert!(state.logs.is_empty());
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.current_player().unwrap().sold_status, SoldStatus::Open);
    }

    #[test]
    fn reconcile_preserves_local_transient_fields() {
        let mut state = test_state();
        state.place_bid("MUM", 4_000);

        // Server copy does not carry the in-flight bid.
        let server = vec![
            record(1, "Rassie van Berg", 2_000, "Foreign_Batters"),
            record(2, "Arjun Mehta", 500, "Star_Indian_Batter"),
            record(3, "Dale Venter", 800, "Foreign_Fast_Bowlers"),
        ];
        state.reconcile(server);

        let player = state.current_player().unwrap();
        assert_eq!(player.current_bid, 4_000);
        assert_eq!(player.highest_bidder.as_deref(), Some("MUM"));
    }

    #[test]
    fn reconcile_takes_server_sale_outcome() {
        let mut state = test_state();
        let mut sold = record(1, "Rassie van Berg", 2_000, "Foreign_Batters");
        sold.sold_status = "SOLD".into();
        sold.sold_to = Some("DEL".into());
        sold.sold_price = Some(6_000);
        sold.current_bid = Some(6_000);

        state.reconcile(vec![
            sold,
            record(2, "Arjun Mehta", 500, "Star_Indian_Batter"),
            record(3, "Dale Venter", 800, "Foreign_Fast_Bowlers"),
        ]);

        let player = &state.players[0];
        assert_eq!(player.sold_status, SoldStatus::Sold);
        assert_eq!(player.sold_to.as_deref(), Some("DEL"));
        assert_eq!(player.sold_price, Some(6_000));
    }

    #[test]
    fn reconcile_clamps_pointer_when_pool_shrinks() {
        let mut state = test_state();
        state.set_category(ALL_CATEGORIES);
        state.advance(Direction::Next);
        state.advance(Direction::Next);
        assert_eq!(state.active_index, 2);

        state.reconcile(vec![record(1, "Rassie van Berg", 2_000, "Foreign_Batters")]);
        assert_eq!(state.active_index, 0);
    }
}
