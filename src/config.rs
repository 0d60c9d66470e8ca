use crate::library::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::search::CaseSensitivity;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Media library server with per-user content restrictions.
#[derive(Parser, Debug, Clone)]
#[command(name = "shelfgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "SHELFGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Library management commands.
    Library {
        /// Library subcommand action.
        #[command(subcommand)]
        action: LibraryCommand,
    },

    /// Run a search against the catalog.
    Search {
        /// What to search.
        #[command(subcommand)]
        target: SearchCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user and print its API key.
    Add {
        /// Username.
        username: String,
        /// User role (admin or user).
        #[arg(short, long, default_value = "user")]
        role: String,
    },

    /// Delete a user.
    Del {
        /// Username to delete.
        username: String,
    },

    /// List all users.
    List,

    /// Update library sharing and content restrictions.
    Access {
        /// Username.
        username: String,
        /// JSON update, e.g. '{"ageRestriction": {"age": 12, "mode": "ALLOW_ONLY"}}'.
        /// Missing keys are left untouched, null clears a setting.
        update: String,
    },
}

/// Library management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum LibraryCommand {
    /// Add a new library.
    Add {
        /// Library name.
        name: String,
        /// Path to library directory.
        #[arg(short, long)]
        path: PathBuf,
        /// Library ID (generated if omitted).
        #[arg(long)]
        id: Option<String>,
    },

    /// Remove a library with its series and books.
    Del {
        /// Library name.
        name: String,
    },

    /// List all libraries.
    List,

    /// Import series and books from a JSON catalog file.
    Import {
        /// Path to the catalog file.
        file: PathBuf,
    },
}

/// Search subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum SearchCommand {
    /// Search books.
    Books(SearchArgs),
    /// Search series.
    Series(SearchArgs),
}

/// Arguments shared by search subcommands.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Condition JSON.
    #[arg(long)]
    pub condition: Option<String>,

    /// Full-text terms.
    #[arg(long)]
    pub text: Option<String>,

    /// Search as this user (unrestricted when omitted).
    #[arg(long)]
    pub user: Option<String>,

    /// Page index.
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// Page size.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub size: usize,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Catalog title.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

fn default_title() -> String {
    "My Library".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/shelfgate.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Serve read-only requests without an API key, as the anonymous user.
    #[serde(default)]
    pub anonymous_access: bool,
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Compare text case-sensitively.
    #[serde(default)]
    pub case_sensitive: bool,

    /// Page size when the request has none.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Largest page size a request may ask for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> usize {
    MAX_PAGE_SIZE
}

impl SearchConfig {
    /// Case policy for text conditions.
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        if self.case_sensitive {
            CaseSensitivity::Sensitive
        } else {
            CaseSensitivity::Insensitive
        }
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> crate::error::Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })?;

        if config.search.max_page_size == 0 {
            return Err(crate::error::AppError::Config(
                "search.max_page_size must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("shelfgate.toml"),
            dirs::config_dir()
                .map(|p| p.join("shelfgate").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/shelfgate/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# shelfgate configuration

[server]
bind = "0.0.0.0:8080"
title = "My Library"

[database]
# path = "/var/lib/shelfgate/shelfgate.db"

[auth]
# Serve requests without an API key as the anonymous user
anonymous_access = false

[search]
# Compare text conditions case-sensitively
case_sensitive = false
default_page_size = 20
max_page_size = 500
"#
        .to_string()
    }
}
