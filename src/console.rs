// Moderator console: line-oriented command parsing for the admin seat.

use crate::protocol::UserCommand;

/// Parse one console line into a command.
///
/// Grammar (case-insensitive keywords, team ids/categories verbatim):
///   bid <TEAM> [amount]   sell [card label]   unsold      reopen
///   next | prev           category <NAME>     undo | redo
///   break <seconds>       endbreak            reset       status
///   quit | exit
pub fn parse_command(line: &str) -> Result<UserCommand, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err("empty command".to_string());
    }

    let mut parts = trimmed.split_whitespace();
    let keyword = parts.next().unwrap_or_default().to_lowercase();
    let rest: Vec<&str> = parts.collect();

    match keyword.as_str() {
        "bid" => {
            let Some(team_id) = rest.first() else {
                return Err("usage: bid <TEAM> [amount]".to_string());
            };
            let amount = match rest.get(1) {
                Some(raw) => Some(
                    raw.parse::<u32>()
                        .map_err(|_| format!("invalid bid amount `{raw}`"))?,
                ),
                None => None,
            };
            Ok(UserCommand::Bid {
                team_id: team_id.to_string(),
                amount,
            })
        }
        "sell" | "sold" => {
            let label = rest.join(" ");
            Ok(UserCommand::Sell {
                card_label: if label.is_empty() { None } else { Some(label) },
            })
        }
        "unsold" => Ok(UserCommand::Unsold),
        "reopen" => Ok(UserCommand::Reopen),
        "next" => Ok(UserCommand::Next),
        "prev" | "previous" => Ok(UserCommand::Previous),
        "category" => {
            if rest.is_empty() {
                return Err("usage: category <NAME>".to_string());
            }
            Ok(UserCommand::SetCategory {
                category: rest.join(" "),
            })
        }
        "undo" => Ok(UserCommand::Undo),
        "redo" => Ok(UserCommand::Redo),
        "break" => {
            let Some(raw) = rest.first() else {
                return Err("usage: break <seconds>".to_string());
            };
            let seconds = raw
                .parse::<u64>()
                .map_err(|_| format!("invalid break duration `{raw}`"))?;
            if seconds == 0 {
                return Err("break duration must be greater than 0".to_string());
            }
            Ok(UserCommand::BreakStart { seconds })
        }
        "endbreak" => Ok(UserCommand::BreakEnd),
        "reset" => Ok(UserCommand::Reset),
        "status" => Ok(UserCommand::Status),
        "quit" | "exit" => Ok(UserCommand::Quit),
        other => Err(format!("unknown command `{other}`")),
    }
}
