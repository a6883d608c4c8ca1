use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use amandus::auth::PasswordHasher;
use amandus::config::ServerConfig;
use amandus::oauth::HttpOAuthClient;
use amandus::server::validation::{validate_email, validate_password, validate_username};
use amandus::server::{AppState, create_router};
use amandus::store::{SqliteStore, Store};
use amandus::types::{NewUser, UserRole};

#[derive(Parser)]
#[command(name = "amandus")]
#[command(about = "Collaborative editor backend for files in hosted git repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to, overriding the config file
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to, overriding the config file
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database, settings and repositories
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Config file (defaults to <data-dir>/amandus.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create the database and an admin user
    Init {
        /// Data directory for the database, settings and repositories
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Skip interactive prompts; the admin is taken from the flags below
        #[arg(long)]
        non_interactive: bool,

        #[arg(long, requires = "non_interactive")]
        username: Option<String>,

        #[arg(long, requires = "non_interactive")]
        email: Option<String>,

        #[arg(long, requires = "non_interactive")]
        password: Option<String>,
    },
}

struct AdminAccount {
    username: String,
    email: String,
    password: String,
}

fn run_init(data_dir: &Path, account: Option<AdminAccount>) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let config = ServerConfig {
        data_dir: data_dir.to_path_buf(),
        ..ServerConfig::default()
    };
    fs::create_dir_all(config.repositories_dir())?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if store.has_admin()? {
        bail!(
            "Server already initialized. An admin user exists in {}",
            config.db_path().display()
        );
    }

    let account = match account {
        Some(account) => account,
        None => prompt_admin_account()?,
    };

    for check in [
        validate_username(&account.username),
        validate_email(&account.email),
        validate_password(&account.password),
    ] {
        if let Err(e) = check {
            bail!("{}", e.message);
        }
    }

    let password_hash = PasswordHasher::new().hash(&account.password)?;
    let user = store.create_user(&NewUser {
        username: account.username,
        email: account.email,
        password_hash,
        role: UserRole::Admin,
    })?;

    println!();
    println!("========================================");
    println!("Created admin user '{}'", user.username);
    println!("Database: {}", config.db_path().display());
    println!("========================================");
    println!();

    Ok(())
}

fn prompt_admin_account() -> anyhow::Result<AdminAccount> {
    let username = inquire::Text::new("Admin username:")
        .with_validator(|input: &str| match validate_username(input) {
            Ok(()) => Ok(inquire::validator::Validation::Valid),
            Err(e) => Ok(inquire::validator::Validation::Invalid(e.message.into())),
        })
        .prompt()?;

    let email = inquire::Text::new("Admin email:")
        .with_validator(|input: &str| match validate_email(input) {
            Ok(()) => Ok(inquire::validator::Validation::Valid),
            Err(e) => Ok(inquire::validator::Validation::Invalid(e.message.into())),
        })
        .prompt()?;

    let password = inquire::Password::new("Admin password:")
        .with_validator(|input: &str| match validate_password(input) {
            Ok(()) => Ok(inquire::validator::Validation::Valid),
            Err(e) => Ok(inquire::validator::Validation::Invalid(e.message.into())),
        })
        .prompt()?;

    Ok(AdminAccount {
        username,
        email,
        password,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("amandus=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
                username,
                email,
                password,
            } => {
                let account = if non_interactive {
                    match (username, email, password) {
                        (Some(username), Some(email), Some(password)) => Some(AdminAccount {
                            username,
                            email,
                            password,
                        }),
                        _ => bail!(
                            "--non-interactive needs --username, --email and --password"
                        ),
                    }
                } else {
                    None
                };
                run_init(&data_dir, account)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            config,
        } => {
            let mut config = ServerConfig::load(config.as_deref(), &data_dir)?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            let store = SqliteStore::new(config.db_path())
                .with_context(|| format!("opening {}", config.db_path().display()))?;
            store.initialize()?;
            if !store.has_admin()? {
                bail!("Server not initialized. Run 'amandus admin init' first to create an admin user.");
            }

            fs::create_dir_all(config.repositories_dir())?;

            let provider = Arc::new(HttpOAuthClient::new(config.oauth.clone())?);
            let addr = config.socket_addr()?;
            let state = Arc::new(AppState::new(config, Arc::new(store), provider));

            let app = create_router(state);

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
