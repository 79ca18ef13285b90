//! WealthPulse CLI
//!
//! Command-line access to the WealthPulse API through the authenticated
//! gateway client. Tokens persist between invocations in the configured store.
//!
//! # Usage
//!
//! ```bash
//! # Log in (prompts for the password on stdin)
//! wealthpulse login investor@example.com
//!
//! # Show the session
//! wealthpulse status --format json
//!
//! # Call the API
//! wealthpulse get /portfolio/summary
//! wealthpulse post /assets '{"symbol":"VWCE","name":"Vanguard FTSE All-World"}'
//!
//! # Admins: view another user's portfolio, then return
//! wealthpulse act-as 42
//! wealthpulse exit-view
//! ```

mod output;

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};
use wealthpulse_client::{GatewayClient, GatewayConfig, GatewayError, UserId};

use crate::output::Status;

#[derive(Parser)]
#[command(name = "wealthpulse")]
#[command(about = "Command-line client for the WealthPulse portfolio tracker")]
#[command(version)]
struct Cli {
    /// Enable verbose output and print the action log after each command
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API base URL (overrides the config file)
    #[arg(long, global = true, env = "WEALTHPULSE_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Filter used when `RUST_LOG` is unset.
    fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        /// Account email
        email: String,

        /// Password (read from stdin when omitted)
        #[arg(short, long, env = "WEALTHPULSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored tokens
    Logout,

    /// Show the current session
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// View the application as another user (admin only)
    ActAs {
        /// Target user id
        user_id: i64,
    },

    /// Return to your own view
    ExitView,

    /// GET a path relative to the API base URL and print the JSON body
    Get {
        /// API path, e.g. /assets
        path: String,
    },

    /// POST a JSON body to a path and print the JSON response
    Post {
        /// API path
        path: String,

        /// Request body as JSON
        body: String,
    },

    /// Upload a file to an import endpoint
    Import {
        /// API path, e.g. /data/import
        path: String,

        /// File to upload
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = GatewayConfig::load().context("Failed to load configuration")?;
    if let Some(url) = &cli.api_url {
        config.base_url = url.clone();
    }
    let client = GatewayClient::builder()
        .config(config)
        .build()
        .context("Failed to create gateway client")?;

    debug!(base_url = %client.config().base_url, "Client ready");

    let result = run(&client, cli.command).await;

    if cli.verbose {
        let entries = client.action_log().entries();
        if !entries.is_empty() {
            eprintln!("\nAction log:");
            eprint!("{}", output::render_log(&entries));
        }
    }

    result
}

async fn run(client: &GatewayClient, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => login(client, &email, password).await,
        Commands::Logout => {
            client.logout();
            println!("Logged out");
            Ok(())
        }
        Commands::Status { format } => status(client, format).await,
        Commands::ActAs { user_id } => {
            client
                .act_as(UserId(user_id))
                .context("Failed to store impersonation target")?;
            println!("Now viewing as user {}", user_id);
            Ok(())
        }
        Commands::ExitView => {
            client
                .exit_view()
                .context("Failed to clear impersonation target")?;
            println!("Returned to your own view");
            Ok(())
        }
        Commands::Get { path } => {
            let body: serde_json::Value = client.get_json(&path).await.map_err(explain)?;
            print_json(&body)
        }
        Commands::Post { path, body } => {
            let body: serde_json::Value =
                serde_json::from_str(&body).context("Request body is not valid JSON")?;
            let response: serde_json::Value =
                client.post_json(&path, &body).await.map_err(explain)?;
            print_json(&response)
        }
        Commands::Import { path, file } => import(client, &path, &file).await,
    }
}

async fn login(client: &GatewayClient, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    client.login(email, &password).await.map_err(explain)?;
    println!("Logged in as {}", email);
    Ok(())
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn status(client: &GatewayClient, format: Format) -> Result<()> {
    // An expired access token may still be recoverable through the refresh token.
    let has_session = client.is_authenticated() || client.credentials().refresh_token().is_some();

    let user = if has_session {
        match client.me().await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!("Could not load profile: {}", e);
                None
            }
        }
    } else {
        None
    };

    let status = Status {
        base_url: client.config().base_url.clone(),
        // Re-read: fetching the profile may have refreshed or ended the session.
        authenticated: client.is_authenticated(),
        expires_at: client
            .credentials()
            .access_token()
            .and_then(|token| Status::expiry_of(token.expose())),
        has_refresh_token: client.credentials().refresh_token().is_some(),
        acting_as: client.acting_as(),
        user,
    };

    match format {
        Format::Text => print!("{}", status.render_text()),
        Format::Json => print_json(&status)?,
    }
    Ok(())
}

async fn import(client: &GatewayClient, path: &str, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .context("File name is not valid UTF-8")?;

    let response: serde_json::Value = client
        .upload(path, "file", file_name, bytes)
        .await
        .map_err(explain)?;
    print_json(&response)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Add a hint for errors that end the session.
fn explain(error: GatewayError) -> anyhow::Error {
    let fatal = error.is_fatal();
    let error = anyhow::Error::new(error);
    if fatal {
        error.context("Not logged in. Run `wealthpulse login <email>` first")
    } else {
        error
    }
}
