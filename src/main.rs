// Auction desk entry point.
//
// Moderator startup sequence:
// 1. Initialize tracing (log to file, not the console)
// 2. Load config
// 3. Open database, seed the pool on first run
// 4. Build the authoritative auction state from storage
// 5. Create channels
// 6. Spawn WebSocket hub task
// 7. Spawn moderator app loop
// 8. Read console commands until quit
// 9. Cleanup on exit
//
// `auctiondesk viewer ws://host:port [TEAM]` runs a viewer mirror instead.

use auction_desk::app;
use auction_desk::config;
use auction_desk::console;
use auction_desk::db;
use auction_desk::protocol::UserCommand;
use auction_desk::viewer;
use auction_desk::ws_server;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file; stdout belongs to the console)
    init_tracing()?;

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("viewer") {
        return run_viewer(&args).await;
    }

    info!("Auction desk starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: auction={}, {} teams, {} L starting purse",
        config.auction.name,
        config.teams.len(),
        config.auction.starting_purse
    );

    // 3. Open database, seed the pool on first run
    let db = db::Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    if db.player_count().context("failed to count players")? == 0 {
        let cwd = std::env::current_dir()?;
        match config::load_player_seed(&cwd) {
            Ok(Some(seed)) => {
                db.import_players(&seed.players)
                    .context("failed to import seed players")?;
                info!("Imported {} seed players", seed.players.len());
            }
            Ok(None) => warn!("Player pool is empty and no seed file found; starting degraded"),
            Err(e) => warn!("Failed to read player seed, starting degraded: {e}"),
        }
    }

    // 4. Build the authoritative auction state from storage
    let state = app::build_auction_state(&config, &db)
        .context("failed to build auction state from storage")?;
    info!(
        "Auction state ready: {} players, category {}",
        state.players.len(),
        state.selected_category
    );

    // 5. Create channels
    let (ws_tx, ws_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (outbound_tx, _) = broadcast::channel(256);

    let app_state = app::AppState::new(config.clone(), state, db, outbound_tx.clone());

    // 6. Spawn WebSocket hub task
    let ws_port = config.ws_port;
    let ws_handle = tokio::spawn(async move {
        match ws_server::bind(ws_port).await {
            Ok(listener) => {
                if let Err(e) = ws_server::run(listener, ws_tx, outbound_tx).await {
                    error!("WebSocket hub error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to bind WebSocket hub on port {}: {}", ws_port, e);
            }
        }
    });

    // 7. Spawn moderator app loop
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(ws_rx, cmd_rx, app_state).await {
            error!("Moderator loop error: {}", e);
        }
    });

    info!("Auction desk ready. Hub listening on 127.0.0.1:{ws_port}");
    println!("auction desk ready — type `status` for an overview, `quit` to exit");

    // 8. Read console commands until quit
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match console::parse_command(&line) {
            Ok(UserCommand::Quit) => {
                let _ = cmd_tx.send(UserCommand::Quit).await;
                break;
            }
            Ok(cmd) => {
                if cmd_tx.send(cmd).await.is_err() {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
    }

    // 9. Cleanup: wait for the app loop, then stop the hub (it loops forever)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), app_handle).await;
    ws_handle.abort();

    info!("Auction desk shut down cleanly");
    Ok(())
}

/// Run a viewer mirror against a moderator hub.
async fn run_viewer(args: &[String]) -> anyhow::Result<()> {
    let url = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| "ws://127.0.0.1:9800".to_string());

    let config = config::load_config().context("failed to load configuration")?;
    let team_id = args
        .get(3)
        .cloned()
        .or_else(|| config.teams.first().map(|t| t.id.clone()))
        .unwrap_or_else(|| "VIEWER".to_string());
    let team_name = config
        .teams
        .iter()
        .find(|t| t.id == team_id)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| team_id.clone());

    let db = db::Database::open(&config.db_path).context("failed to open database")?;
    let state = app::build_auction_state(&config, &db)
        .context("failed to build viewer mirror from storage")?;

    info!("Viewer mirror starting for {team_name}, hub {url}");
    viewer::run(&url, &team_id, &team_name, db, state).await
}

/// Initialize tracing to log to a file (not the terminal, which is used by
/// the moderator console).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("auction-desk.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auction_desk=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
