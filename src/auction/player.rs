// Player entity: identity, classification, valuation, sale outcome.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::PlayerRecord;

/// Sale outcome of a player. `Open` players are biddable; `Sold` and
/// `Unsold` are terminal until explicitly reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SoldStatus {
    #[default]
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "SOLD")]
    Sold,
    #[serde(rename = "UNSOLD")]
    Unsold,
}

impl SoldStatus {
    /// Parse a persisted status string. Anything unrecognized (including
    /// legacy/empty values) normalizes to `Open`.
    pub fn from_str_status(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SOLD" => SoldStatus::Sold,
            "UNSOLD" => SoldStatus::Unsold,
            _ => SoldStatus::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SoldStatus::Open => "OPEN",
            SoldStatus::Sold => "SOLD",
            SoldStatus::Unsold => "UNSOLD",
        }
    }
}

impl fmt::Display for SoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad role classification derived from the raw pool category.
///
/// Pool categories are free-form strings (e.g. `Foreign_Fast_Bowlers`);
/// this enum is the typed grouping used for display and tallies. Unknown
/// categories map to `Batter`, the explicit fallback variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandardRole {
    Batter,
    Bowler,
    AllRounder,
    WicketKeeper,
}

impl StandardRole {
    /// Map a raw category string to a standard role.
    pub fn from_category(category: &str) -> Self {
        match category.trim() {
            "Star_Indian_Batter" | "Foreign_Batters" | "Normal_Indian_Batters" => {
                StandardRole::Batter
            }
            "Indian_Fast_Bowlers" | "Foreign_Fast_Bowlers" | "Indian_Spinners"
            | "Foreign_Spinners" => StandardRole::Bowler,
            "All_Rounders_Indian" | "Foreign_All_Rounders" => StandardRole::AllRounder,
            "Indian_Wicketkeepers" | "Foreign_Wicket_Keepers" => StandardRole::WicketKeeper,
            // Named fallback: uncategorized players auction as batters.
            _ => StandardRole::Batter,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            StandardRole::Batter => "BATTER",
            StandardRole::Bowler => "BOWLER",
            StandardRole::AllRounder => "ALL-ROUNDER",
            StandardRole::WicketKeeper => "WICKET-KEEPER",
        }
    }
}

impl fmt::Display for StandardRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// The sale artifact chosen by the moderator when finalizing a sale
/// (a card template). Opaque to the state machine; carried on SOLD
/// events and stored with the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAssignment {
    pub id: String,
    pub label: String,
}

/// One bid in the active player's bid history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRecord {
    pub team_id: String,
    /// Bid amount in lakhs.
    pub amount: u32,
    pub timestamp: DateTime<Utc>,
}

/// A player in the auction pool.
///
/// All prices are integers in lakhs, the canonical minor unit; display
/// conversion to crores happens only at the presentation boundary
/// (see [`fmt_crores`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub rating: u32,
    #[serde(default)]
    pub matches: u32,
    #[serde(default)]
    pub runs: u32,
    #[serde(default)]
    pub wickets: u32,
    #[serde(default)]
    pub average: f64,
    #[serde(default)]
    pub strike_rate: f64,
    pub base_price: u32,
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
    pub current_bid: u32,
    #[serde(default)]
    pub highest_bidder: Option<String>,
    #[serde(default)]
    pub sold_status: SoldStatus,
    #[serde(default)]
    pub sold_to: Option<String>,
    #[serde(default)]
    pub sold_price: Option<u32>,
    #[serde(default)]
    pub assigned_card: Option<CardAssignment>,
}

impl Player {
    /// Build an in-memory player from a persisted record, defaulting every
    /// absent auction field to its safe value: missing current bid falls
    /// back to the base price, missing status to `Open`.
    pub fn from_record(record: PlayerRecord) -> Self {
        let base_price = record.base_price;
        Player {
            id: record.id,
            name: record.name,
            country: record.country,
            rating: record.rating,
            matches: record.matches,
            runs: record.runs,
            wickets: record.wickets,
            average: record.average,
            strike_rate: record.strike_rate,
            base_price,
            category: record.category,
            image: record.image,
            current_bid: record.current_bid.unwrap_or(base_price),
            highest_bidder: record.highest_bidder,
            sold_status: SoldStatus::from_str_status(&record.sold_status),
            sold_to: record.sold_to,
            sold_price: record.sold_price,
            assigned_card: record.assigned_card,
        }
    }

    pub fn standard_role(&self) -> StandardRole {
        StandardRole::from_category(&self.category)
    }

    pub fn is_closed(&self) -> bool {
        self.sold_status != SoldStatus::Open
    }

    /// Clear every sale field and return the player to `Open`.
    pub fn reopen(&mut self) {
        self.sold_status = SoldStatus::Open;
        self.sold_to = None;
        self.sold_price = None;
        self.assigned_card = None;
        self.highest_bidder = None;
    }
}

/// Discrete, monotonic bid increment ladder: +20 L below 200 L,
/// +50 L from 200 L, +100 L from 1000 L.
pub fn next_bid_increment(current_bid: u32) -> u32 {
    if current_bid >= 1000 {
        100
    } else if current_bid >= 200 {
        50
    } else {
        20
    }
}

/// Format a lakh amount as a crore string for display (100 L = 1 Cr).
/// Presentation-boundary helper; the store never converts units.
pub fn fmt_crores(lakhs: u32) -> String {
    format!("{:.2} Cr", lakhs as f64 / 100.0)
}
