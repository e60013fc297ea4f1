// Configuration loading and parsing (auction.toml, teams.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub auction: AuctionConfig,
    pub teams: Vec<TeamConfig>,
    pub admin_name: String,
    pub ws_port: u16,
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// auction.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire auction.toml file.
#[derive(Debug, Clone, Deserialize)]
struct AuctionFile {
    auction: AuctionConfig,
    moderator: ModeratorSection,
    websocket: WebsocketSection,
    database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuctionConfig {
    pub name: String,
    /// Starting purse per team, in lakhs.
    pub starting_purse: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ModeratorSection {
    admin_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WebsocketSection {
    port: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

// ---------------------------------------------------------------------------
// teams.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[[teams]]` array in teams.toml.
#[derive(Debug, Clone, Deserialize)]
struct TeamsFile {
    teams: Vec<TeamConfig>,
}

/// Static definition of one franchise.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamConfig {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

// ---------------------------------------------------------------------------
// Player seed (defaults/players.toml, imported when the pool is empty)
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[[players]]` array in players.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSeedFile {
    pub players: Vec<PlayerSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSeed {
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
}

/// Load the player seed file, if present.
pub fn load_player_seed(base_dir: &Path) -> Result<Option<PlayerSeedFile>, ConfigError> {
    let seed_path = base_dir.join("defaults").join("players.toml");
    if !seed_path.exists() {
        return Ok(None);
    }
    let text = read_file(&seed_path)?;
    let seed: PlayerSeedFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: seed_path,
        source: e,
    })?;
    Ok(Some(seed))
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/auction.toml` and
/// `config/teams.toml`, relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy
/// defaults. Prefer `load_config()` which handles default initialization.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- auction.toml (required) ---
    let auction_path = config_dir.join("auction.toml");
    let auction_text = read_file(&auction_path)?;
    let auction_file: AuctionFile =
        toml::from_str(&auction_text).map_err(|e| ConfigError::ParseError {
            path: auction_path.clone(),
            source: e,
        })?;

    // --- teams.toml (required) ---
    let teams_path = config_dir.join("teams.toml");
    let teams_text = read_file(&teams_path)?;
    let teams_file: TeamsFile =
        toml::from_str(&teams_text).map_err(|e| ConfigError::ParseError {
            path: teams_path.clone(),
            source: e,
        })?;

    let config = Config {
        auction: auction_file.auction,
        teams: teams_file.teams,
        admin_name: auction_file.moderator.admin_name,
        ws_port: auction_file.websocket.port,
        db_path: auction_file.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files and
/// the player seed (which is read from defaults/ directly).
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        // Skip template files and the seed pool (not a runtime config).
        let name = file_name.to_str().unwrap_or_default();
        if name.ends_with(".example") || name == "players.toml" {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // File already exists in config/, keep the user's copy.
            }
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.auction.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "auction.name".into(),
            message: "must not be empty".into(),
        });
    }

    if config.auction.starting_purse == 0 {
        return Err(ConfigError::ValidationError {
            field: "auction.starting_purse".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.admin_name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "moderator.admin_name".into(),
            message: "must not be empty".into(),
        });
    }

    if config.teams.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "teams".into(),
            message: "at least one team must be configured".into(),
        });
    }

    for (i, team) in config.teams.iter().enumerate() {
        if team.id.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{i}].id"),
                message: "must not be empty".into(),
            });
        }
        if config.teams.iter().filter(|t| t.id == team.id).count() > 1 {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{i}].id"),
                message: format!("duplicate team id `{}`", team.id),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
