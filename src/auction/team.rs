// Team entity: wallet, roster of sale snapshots.

use serde::{Deserialize, Serialize};

use super::player::Player;
use crate::config::TeamConfig;

/// Maximum number of players a team may acquire.
pub const ROSTER_CAP: usize = 6;

/// A franchise participating in the auction.
///
/// `funds` is in lakhs, same unit as player prices. It only moves through
/// sell/reopen (and the undo/reset paths that restore whole snapshots), so
/// `initial_funds - funds` always equals the sum of roster sale prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    pub funds: u32,
    pub initial_funds: u32,
    /// Sale snapshots of acquired players, in acquisition order.
    #[serde(default)]
    pub roster: Vec<Player>,
}

impl Team {
    /// Build a team at its starting wallet from static configuration.
    pub fn from_config(config: &TeamConfig, starting_purse: u32) -> Self {
        Team {
            id: config.id.clone(),
            code: config.code.clone(),
            name: config.name.clone(),
            color: config.color.clone(),
            funds: starting_purse,
            initial_funds: starting_purse,
            roster: Vec::new(),
        }
    }

    pub fn roster_full(&self) -> bool {
        self.roster.len() >= ROSTER_CAP
    }

    pub fn can_afford(&self, amount: u32) -> bool {
        self.funds >= amount
    }

    /// Debit the wallet and append a sale snapshot. Callers must have
    /// validated funds and roster capacity first.
    pub fn acquire(&mut self, player: Player, price: u32) {
        self.funds = self.funds.saturating_sub(price);
        self.roster.push(player);
    }

    /// Refund a sale: credit the wallet (capped at the initial purse) and
    /// drop the player from the roster. No-op on the roster if the player
    /// is not present.
    pub fn release(&mut self, player_id: i64, refund: u32) {
        self.funds = (self.funds + refund).min(self.initial_funds);
        self.roster.retain(|p| p.id != player_id);
    }

    /// Amount spent so far, derived from recorded sale prices.
    pub fn spent(&self) -> u32 {
        self.roster.iter().filter_map(|p| p.sold_price).sum()
    }
}
