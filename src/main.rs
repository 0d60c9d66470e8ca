//! shelfgate server entry point.

use clap::Parser;
use shelfgate::{
    access::SearchContext,
    auth::{self, AccessUpdate, AuthService},
    config::{Cli, Command, Config, LibraryCommand, SearchArgs, SearchCommand, UserCommand},
    db::Database,
    library::{Catalog, CatalogImport, PageRequest, ReadStates},
    search::{EvalContext, SearchRequest, wire},
    server,
};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Library { action }) => cmd_library(action, &config).await,
        Some(Command::Search { target }) => cmd_search(target, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => {
            // Default: start server
            cmd_serve(config, None).await
        }
    }
}

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfgate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config
    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    // Initialize database
    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: shelfgate library add <name> --path /path/to/books");
    println!("And: shelfgate user add <username> --role admin");

    Ok(())
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let auth = AuthService::new(db.clone(), config.auth.anonymous_access);

    match action {
        UserCommand::Add { username, role } => {
            let user = auth.create_user(&username, &role)?;
            println!(
                "Created user: {} (role: {}, id: {})",
                user.username, user.role, user.id
            );
            println!("API key: {}", user.api_key);
        }

        UserCommand::Del { username } => {
            if auth.delete_user(&username)? {
                println!("Deleted user: {}", username);
            } else {
                println!("User not found: {}", username);
            }
        }

        UserCommand::List => {
            let users = auth.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<20} {:<10} {:<36} LIBRARIES", "USERNAME", "ROLE", "ID");
                println!("{}", "-".repeat(80));
                for user in users {
                    let libraries = if user.shared_all_libraries {
                        "all".to_string()
                    } else {
                        user.shared_library_ids
                            .iter()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(",")
                    };
                    println!(
                        "{:<20} {:<10} {:<36} {}",
                        user.username, user.role, user.id, libraries
                    );
                }
            }
        }

        UserCommand::Access { username, update } => {
            let update: AccessUpdate = serde_json::from_str(&update)?;
            let user = db
                .get_user_by_username(&username)?
                .ok_or_else(|| anyhow::anyhow!("User not found: {}", username))?;

            let user = auth.update_access(&user.id, update)?;
            println!("Updated access for: {}", user.username);
            println!("{}", serde_json::to_string_pretty(&user.restrictions)?);
        }
    }

    Ok(())
}

/// Library management commands.
async fn cmd_library(action: LibraryCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        LibraryCommand::Add { name, path, id } => {
            let library = shelfgate::db::Library {
                id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name: name.clone(),
                path: path.to_string_lossy().to_string(),
                created_at: shelfgate::db::now_timestamp(),
            };

            db.create_library(&library)?;
            println!(
                "Added library: {} -> {} (id: {})",
                name,
                path.display(),
                library.id
            );
        }

        LibraryCommand::Del { name } => {
            if db.delete_library(&name)? {
                println!("Deleted library: {}", name);
            } else {
                println!("Library not found: {}", name);
            }
        }

        LibraryCommand::List => {
            let libraries = db.list_libraries()?;
            if libraries.is_empty() {
                println!("No libraries found.");
            } else {
                println!("{:<20} {:<36} PATH", "NAME", "ID");
                println!("{}", "-".repeat(80));
                for lib in libraries {
                    println!("{:<20} {:<36} {}", lib.name, lib.id, lib.path);
                }
            }
        }

        LibraryCommand::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let import: CatalogImport = serde_json::from_str(&content)?;
            let summary = db.import_catalog(&import)?;
            println!(
                "Imported {} series and {} books ({} new libraries) from {}",
                summary.series,
                summary.books,
                summary.libraries,
                file.display()
            );
        }
    }

    Ok(())
}

/// Run a search from the command line.
async fn cmd_search(target: SearchCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let catalog = Catalog::new(db.get_all_series()?, db.get_all_books()?);

    let (args, is_books) = match target {
        SearchCommand::Books(args) => (args, true),
        SearchCommand::Series(args) => (args, false),
    };
    let SearchArgs {
        condition,
        text,
        user,
        page,
        size,
    } = args;

    let (context, reads) = match user {
        Some(username) => {
            let user = db
                .get_user_by_username(&username)?
                .ok_or_else(|| anyhow::anyhow!("User not found: {}", username))?;
            let reads = ReadStates::from_progress(&db.get_progress_for_user(&user.id)?);
            (auth::context_for(&user), reads)
        }
        None => (SearchContext::empty(), ReadStates::none()),
    };

    let condition = condition
        .map(|c| serde_json::from_str::<serde_json::Value>(&c))
        .transpose()?;
    let eval = EvalContext::at(chrono::Utc::now()).with_case(config.search.case_sensitivity());
    let page = PageRequest::new(page, size).clamped(config.search.max_page_size);

    let output = if is_books {
        let request = SearchRequest {
            condition: condition
                .as_ref()
                .map(wire::parse_book_condition)
                .transpose()?,
            full_text_search: text,
        };
        let result = catalog.search_books(&context, &request, &reads, &eval, page);
        serde_json::to_string_pretty(&result)?
    } else {
        let request = SearchRequest {
            condition: condition
                .as_ref()
                .map(wire::parse_series_condition)
                .transpose()?,
            full_text_search: text,
        };
        let result = catalog.search_series(&context, &request, &reads, &eval, page);
        serde_json::to_string_pretty(&result)?
    };

    println!("{}", output);
    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    init_logging();

    // Open database
    let db = Database::open(&config.database.path)?;

    // Create auth service
    let auth = AuthService::new(db.clone(), config.auth.anonymous_access);

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        anonymous_access = config.auth.anonymous_access,
        "Starting shelfgate server"
    );

    if db.list_libraries()?.is_empty() {
        tracing::warn!(
            "No libraries configured. Add one with: \
             shelfgate library add <name> --path /path/to/books"
        );
    }

    // Create application state and load the catalog snapshot
    let state = server::AppState::new_with_db(config.clone(), db, auth);
    state.reload_catalog()?;

    // Create router
    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
