// Append-only auction log: one immutable entry per completed moderator action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    #[serde(rename = "SOLD")]
    Sold,
    #[serde(rename = "UNSOLD")]
    Unsold,
    #[serde(rename = "REOPEN")]
    Reopen,
}

/// An immutable record of one completed SOLD / UNSOLD / REOPEN action.
/// Entries are prepended (newest first) and never mutated; only an
/// explicit auction reset clears the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionLogEntry {
    pub id: String,
    pub kind: LogKind,
    pub player_name: String,
    /// Sale amount in lakhs. `None` for UNSOLD / REOPEN entries.
    pub sold_amount: Option<u32>,
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub wallet_before: Option<u32>,
    pub wallet_after: Option<u32>,
    pub admin_name: String,
    pub card_assigned: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuctionLogEntry {
    /// Entry for a completed sale, capturing the wallet on both sides of
    /// the debit.
    pub fn sold(
        player_id: i64,
        player_name: &str,
        sold_amount: u32,
        team_id: &str,
        team_name: &str,
        wallet_before: u32,
        wallet_after: u32,
        admin_name: &str,
        card_assigned: Option<&str>,
    ) -> Self {
        let timestamp = Utc::now();
        AuctionLogEntry {
            id: format!("{player_id}-{}", timestamp.timestamp_millis()),
            kind: LogKind::Sold,
            player_name: player_name.to_string(),
            sold_amount: Some(sold_amount),
            team_id: Some(team_id.to_string()),
            team_name: Some(team_name.to_string()),
            wallet_before: Some(wallet_before),
            wallet_after: Some(wallet_after),
            admin_name: admin_name.to_string(),
            card_assigned: card_assigned.map(|c| c.to_string()),
            timestamp,
        }
    }

    /// Entry with no financial side: UNSOLD and REOPEN.
    pub fn outcome(kind: LogKind, player_id: i64, player_name: &str, admin_name: &str) -> Self {
        let timestamp = Utc::now();
        AuctionLogEntry {
            id: format!("{player_id}-{}", timestamp.timestamp_millis()),
            kind,
            player_name: player_name.to_string(),
            sold_amount: None,
            team_id: None,
            team_name: None,
            wallet_before: None,
            wallet_after: None,
            admin_name: admin_name.to_string(),
            card_assigned: None,
            timestamp,
        }
    }
}
