//! Subcommands and their execution against an `AuthSession`

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde_json::{Value, json};
use session_client::{
    Accounts, Announcements, AuthSession, Files, LoginCredentials, Navigator, RouteDecision,
    RouteGuard,
};
use tracing::{info, warn};

use crate::error::Error;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session credentials
    Login {
        #[arg(long)]
        username: String,

        #[arg(long, env = "API_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Show the signed-in user's profile
    Profile,

    /// Manage accounts
    Accounts {
        #[command(subcommand)]
        action: AccountsAction,
    },

    /// Manage uploaded files
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },

    /// List announcements
    Announcements,
}

#[derive(Debug, Subcommand)]
pub enum AccountsAction {
    List,
    Create {
        /// Account fields as a JSON object
        #[arg(long)]
        json: String,
    },
    Update {
        id: String,
        #[arg(long)]
        json: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum FilesAction {
    List,
    Upload {
        /// File to upload
        #[arg(long)]
        path: PathBuf,
        /// Name to upload it under (default: the file's own name)
        #[arg(long)]
        name: Option<String>,
    },
    Download {
        id: String,
        /// Destination path
        #[arg(long)]
        out: PathBuf,
    },
    Delete {
        id: String,
    },
}

impl Command {
    /// Screen this command corresponds to, for the route guard.
    fn route(&self) -> &'static str {
        match self {
            Command::Login { .. } => "/login",
            Command::Logout => "/",
            Command::Profile | Command::Announcements => "/dashboard",
            Command::Accounts { .. } => "/dashboard/accounts",
            Command::Files { .. } => "/dashboard/files",
        }
    }
}

/// Navigator for a terminal: logs the move and tells the user where the
/// session went.
#[derive(Debug, Default)]
pub struct CliNavigator;

impl Navigator for CliNavigator {
    fn navigate(&self, route: &str) {
        info!(route, "session redirect");
        eprintln!("redirect: {route}");
    }

    fn reload(&self, route: &str) {
        warn!(route, "application state reset");
        eprintln!("session reset, sign in again: {route}");
    }
}

/// Run one command. Returns the JSON to print, if any.
pub async fn run(command: Command, session: &AuthSession) -> anyhow::Result<Option<Value>> {
    let guard = RouteGuard::new(session.client().config().session.clone());
    if let RouteDecision::Redirect(to) = guard.check(command.route(), session.is_authenticated())
        && to == session.client().config().session.login_route
    {
        return Err(Error::NotSignedIn { redirect: to }.into());
    }

    let client = session.client().clone();
    let output = match command {
        Command::Login { username, password } => {
            let profile = session
                .login(&LoginCredentials { username, password })
                .await?;
            Some(profile)
        }
        Command::Logout => {
            session.logout().await;
            None
        }
        Command::Profile => Some(session.fetch_profile().await?),
        Command::Accounts { action } => {
            let accounts = Accounts::new(client);
            match action {
                AccountsAction::List => Some(accounts.list().await?),
                AccountsAction::Create { json } => {
                    Some(accounts.create(parse_json("json", &json)?).await?)
                }
                AccountsAction::Update { id, json } => {
                    Some(accounts.update(&id, parse_json("json", &json)?).await?)
                }
                AccountsAction::Delete { id } => {
                    accounts.delete(&id).await?;
                    Some(json!({ "deleted": id }))
                }
            }
        }
        Command::Files { action } => {
            let files = Files::new(client);
            match action {
                FilesAction::List => Some(files.list().await?),
                FilesAction::Upload { path, name } => {
                    let name = upload_name(&path, name)?;
                    let data = tokio::fs::read(&path).await.map_err(|source| Error::Read {
                        path: path.clone(),
                        source,
                    })?;
                    Some(files.upload(&name, data).await?)
                }
                FilesAction::Download { id, out } => {
                    let body = files.download(&id).await?;
                    tokio::fs::write(&out, &body)
                        .await
                        .map_err(|source| Error::Write {
                            path: out.clone(),
                            source,
                        })?;
                    Some(json!({ "id": id, "bytes": body.len(), "path": out }))
                }
                FilesAction::Delete { id } => {
                    files.delete(&id).await?;
                    Some(json!({ "deleted": id }))
                }
            }
        }
        Command::Announcements => Some(Value::Array(Announcements::new(client).list().await?)),
    };
    Ok(output)
}

fn upload_name(path: &Path, name: Option<String>) -> crate::error::Result<String> {
    match name {
        Some(name) => Ok(name),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::NoFileName {
                path: path.to_path_buf(),
            }),
    }
}

fn parse_json(arg: &'static str, raw: &str) -> crate::error::Result<Value> {
    serde_json::from_str(raw).map_err(|source| Error::InvalidJson { arg, source })
}
