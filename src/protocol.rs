// Wire protocol: replication events between the moderator process and
// viewer mirrors, plus moderator console commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auction::player::CardAssignment;
use crate::auction::state::AuctionSnapshot;

/// WebSocket connection state as observed by a client. Surfaced to the
/// presentation layer; never consulted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// One replicated moderator action (or informational viewer signal).
///
/// The tag and field names are the wire contract shared with every viewer;
/// `UNDO`/`REDO`/`RESET_AUCTION` carry a full snapshot because they are not
/// safely re-derivable from a small delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuctionEvent {
    #[serde(rename = "BID", rename_all = "camelCase")]
    Bid { team_id: String, bid_amount: u32 },
    #[serde(rename = "SOLD", rename_all = "camelCase")]
    Sold {
        team_id: String,
        team_name: String,
        sold_amount: u32,
        assigned_card: Option<CardAssignment>,
    },
    #[serde(rename = "UNSOLD")]
    Unsold,
    /// Reopen of a terminal SOLD/UNSOLD outcome. The wire name is kept
    /// from the original dashboard contract.
    #[serde(rename = "REDO_SOLD_TO_UNSOLD")]
    Reopen,
    #[serde(rename = "NEXT_PLAYER")]
    NextPlayer,
    #[serde(rename = "PREVIOUS_PLAYER")]
    PreviousPlayer,
    #[serde(rename = "CATEGORY_CHANGED")]
    CategoryChanged { category: String },
    #[serde(rename = "BREAK_START", rename_all = "camelCase")]
    BreakStart {
        duration_seconds: u64,
        /// Absolute wall-clock deadline (epoch milliseconds). Clients
        /// recompute remaining time from this, never from tick counting.
        break_ends_at: i64,
    },
    #[serde(rename = "BREAK_END")]
    BreakEnd,
    #[serde(rename = "UNDO", rename_all = "camelCase")]
    Undo { state_snapshot: AuctionSnapshot },
    #[serde(rename = "REDO", rename_all = "camelCase")]
    Redo { state_snapshot: AuctionSnapshot },
    #[serde(rename = "RESET_AUCTION", rename_all = "camelCase")]
    ResetAuction { state_snapshot: AuctionSnapshot },
    /// Sent by a viewer when its socket opens. Informational only.
    #[serde(rename = "DASHBOARD_CONNECTED", rename_all = "camelCase")]
    DashboardConnected { team_id: String, team_name: String },
}

/// Common envelope around every event: who acted, on which player, when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    #[serde(default)]
    pub admin_name: Option<String>,
    #[serde(default)]
    pub player_id: Option<i64>,
    #[serde(default)]
    pub player_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuctionEvent,
}

impl EventEnvelope {
    /// Envelope for a moderator-originated event.
    pub fn moderator(
        admin_name: &str,
        player_id: Option<i64>,
        player_name: Option<String>,
        event: AuctionEvent,
    ) -> Self {
        EventEnvelope {
            admin_name: Some(admin_name.to_string()),
            player_id,
            player_name,
            timestamp: Utc::now(),
            event,
        }
    }

    /// Envelope for an informational viewer signal.
    pub fn viewer(event: AuctionEvent) -> Self {
        EventEnvelope {
            admin_name: None,
            player_id: None,
            player_name: None,
            timestamp: Utc::now(),
            event,
        }
    }
}

/// A parsed moderator console command.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    /// Bid for a team. `None` amount means "current bid plus the ladder
    /// increment" (first bid starts from the base price).
    Bid {
        team_id: String,
        amount: Option<u32>,
    },
    Sell { card_label: Option<String> },
    Unsold,
    Reopen,
    Next,
    Previous,
    SetCategory { category: String },
    Undo,
    Redo,
    BreakStart { seconds: u64 },
    BreakEnd,
    Reset,
    Status,
    Quit,
}
