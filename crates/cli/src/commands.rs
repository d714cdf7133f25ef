//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use inkdesk_admin::{AdminConfig, AuthState, SessionManager, routes};
use inkdesk_core::GuardDecision;
use inkdesk_http::types::ProfileUpdate;
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::info;

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long, env = "INKDESK_EMAIL")]
        email: String,

        /// Password; prompted on stdin when omitted
        #[arg(long, env = "INKDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in admin
    Whoami,

    /// Show session and configuration status
    Status,

    /// Manage your own profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Password operations
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },

    /// List the admin routes you may open
    Routes {
        /// Show every route with its access decision
        #[arg(long)]
        all: bool,
    },

    /// Evaluate access to one location, e.g. `/blogs/42?tab=draft`
    Check { location: String },

    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Change your display name and/or e-mail address
    Update {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PasswordCommands {
    /// Change your password (both values prompted on stdin)
    Change,

    /// Send a password reset e-mail
    Forgot {
        #[arg(long)]
        email: String,
    },

    /// Set a new password with a reset token (new password prompted on stdin)
    Reset {
        #[arg(long)]
        token: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the effective configuration to a file
    Init {
        /// Output file path (defaults to the platform config directory)
        output: Option<PathBuf>,
    },
}

impl Commands {
    pub async fn execute(
        self,
        manager: &SessionManager,
        admin_config: &AdminConfig,
        json: bool,
    ) -> Result<()> {
        match self {
            Commands::Login { email, password } => {
                let password = match password {
                    Some(password) => password,
                    None => prompt("Password")?,
                };
                let profile = manager.login(&email, &password).await?;
                println!("Signed in as {profile}");
                Ok(())
            }
            Commands::Logout => {
                // Only the stored token is needed, no need to confirm it first
                manager.client().store().load()?;
                manager.logout().await;
                Ok(())
            }
            Commands::Whoami => {
                let AuthState::Authenticated(profile) = manager.initialize().await else {
                    bail!("Not signed in");
                };
                if json {
                    println!("{}", serde_json::to_string_pretty(&profile)?);
                } else {
                    println!("{profile}");
                    println!("permissions: {}", profile.granted().join(", "));
                }
                Ok(())
            }
            Commands::Status => {
                let state = manager.initialize().await;
                if json {
                    let status = json!({
                        "auth": state,
                        "api_url": admin_config.api_url,
                        "session_file": admin_config.session_path(),
                    });
                    println!("{}", serde_json::to_string_pretty(&status)?);
                } else {
                    match &state {
                        AuthState::Authenticated(profile) => println!("Signed in as {profile}"),
                        _ => println!("Not signed in"),
                    }
                    println!("API: {}", admin_config.api_url);
                    println!("Session file: {}", admin_config.session_path().display());
                }
                Ok(())
            }
            Commands::Profile { command } => command.execute(manager).await,
            Commands::Password { command } => command.execute(manager).await,
            Commands::Routes { all: false } => {
                manager.initialize().await;
                let visible = routes::visible(&manager.snapshot());
                if json {
                    println!("{}", serde_json::to_string_pretty(&visible)?);
                } else if visible.is_empty() {
                    println!("No routes available. Run `inkdesk login` first.");
                } else {
                    for route in visible {
                        println!("{:<12} {}", route.path, route.title);
                    }
                }
                Ok(())
            }
            Commands::Routes { all: true } => {
                manager.initialize().await;
                let decisions: Vec<_> = routes::ROUTES
                    .iter()
                    .map(|route| (route, manager.guard(route, route.path)))
                    .collect();
                if json {
                    let rows: Vec<_> = decisions
                        .iter()
                        .map(|(route, decision)| json!({ "route": route, "access": decision }))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    for (route, decision) in decisions {
                        println!("{:<12} {:<10} {}", route.path, route.title, describe(&decision));
                    }
                }
                Ok(())
            }
            Commands::Check { location } => {
                manager.initialize().await;
                let Some(decision) = manager.check(&location) else {
                    bail!("No admin route matches {location}");
                };
                if json {
                    println!("{}", serde_json::to_string_pretty(&decision)?);
                } else {
                    println!("{location}: {}", describe(&decision));
                }
                Ok(())
            }
            Commands::Config { command } => command.execute(admin_config),
        }
    }
}

impl ProfileCommands {
    pub async fn execute(self, manager: &SessionManager) -> Result<()> {
        match self {
            ProfileCommands::Update { name, email } => {
                let update = ProfileUpdate { name, email };
                if update.is_empty() {
                    bail!("Nothing to update: pass --name and/or --email");
                }
                require_session(manager).await?;
                let profile = manager.update_profile(&update).await?;
                println!("{profile}");
                Ok(())
            }
        }
    }
}

impl PasswordCommands {
    pub async fn execute(self, manager: &SessionManager) -> Result<()> {
        match self {
            PasswordCommands::Change => {
                require_session(manager).await?;
                let current = prompt("Current password")?;
                let new = prompt_new_password()?;
                manager.change_password(&current, &new).await?;
                Ok(())
            }
            PasswordCommands::Forgot { email } => {
                manager.forgot_password(&email).await?;
                Ok(())
            }
            PasswordCommands::Reset { token } => {
                let new = prompt_new_password()?;
                manager.reset_password(&token, &new).await?;
                Ok(())
            }
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, admin_config: &AdminConfig) -> Result<()> {
        match self {
            ConfigCommands::Show => {
                println!("{}", serde_json::to_string_pretty(admin_config)?);
                Ok(())
            }
            ConfigCommands::Init { output } => {
                let path = match output {
                    Some(path) => path,
                    None => config::default_config_path()
                        .context("Could not determine the platform config directory")?,
                };
                config::save(admin_config, &path)?;
                info!(path = %path.display(), "Wrote configuration");
                println!("Wrote configuration to {}", path.display());
                Ok(())
            }
        }
    }
}

async fn require_session(manager: &SessionManager) -> Result<()> {
    if !manager.initialize().await.is_authenticated() {
        bail!("Not signed in. Run `inkdesk login` first.");
    }
    Ok(())
}

fn describe(decision: &GuardDecision) -> String {
    match decision {
        GuardDecision::Render => "allowed".to_string(),
        GuardDecision::Pending => "pending".to_string(),
        GuardDecision::Redirect(redirect) if redirect.is_login() => {
            format!("sign-in required ({redirect})")
        }
        GuardDecision::Redirect(redirect) => format!("denied, redirects to {redirect}"),
    }
}

fn prompt_new_password() -> Result<String> {
    let new = prompt("New password")?;
    let confirm = prompt("Confirm new password")?;
    if new != confirm {
        bail!("Passwords do not match");
    }
    Ok(new)
}

/// Read one line from stdin after printing `label` to stderr
fn prompt(label: &str) -> Result<String> {
    eprint!("{label}: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        bail!("{label} must not be empty");
    }
    Ok(value)
}
