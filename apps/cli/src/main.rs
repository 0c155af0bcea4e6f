mod client;
mod output;
mod session;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::client::{ApiClient, HistoryParams, RecordKind};
use crate::session::{SessionFile, StoredUser};

/// Terminal client for the Veritas fake-news detection and generation API.
#[derive(Debug, Parser)]
#[command(name = "veritas", version, about)]
struct Cli {
    /// Base URL of the API server.
    #[arg(long, env = "VERITAS_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Session file location (defaults to the platform config dir).
    #[arg(long, env = "VERITAS_SESSION")]
    session: Option<PathBuf>,

    /// Print raw JSON responses.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in with a username or email and password.
    Login {
        username_or_email: String,
        #[arg(long, env = "VERITAS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a password account and sign in.
    Register {
        username: String,
        email: String,
        #[arg(long, env = "VERITAS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the local session.
    Logout,
    /// Show the signed-in profile, refreshed from the server when reachable.
    Whoami,
    /// Update display name, email or avatar.
    Profile(ProfileArgs),
    /// Classify text (or a URL) as real or fake.
    Detect {
        text: String,
        /// Image URL or base64 data to check alongside the text.
        #[arg(long)]
        image: Option<String>,
        /// Run verification, rhetorical and fusion analysis on top of the baseline.
        #[arg(long)]
        improved: bool,
        /// Also look up related news coverage.
        #[arg(long)]
        related: bool,
    },
    /// Generate a synthetic article about a topic.
    Generate(GenerateArgs),
    /// List generation strategies.
    Strategies,
    /// Page through stored records.
    History {
        #[arg(value_enum)]
        kind: Kind,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
        /// Case-insensitive filter over text, topic, type and strategy.
        #[arg(long)]
        query: Option<String>,
    },
    /// Delete a stored record.
    Delete {
        #[arg(value_enum)]
        kind: Kind,
        id: String,
    },
    /// Download a record's PDF report.
    Pdf {
        #[arg(value_enum)]
        kind: Kind,
        id: String,
        /// Output path (defaults to `<kind>_<id>.pdf`).
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Verdict and strategy tallies over your history.
    Stats,
    /// Search news articles.
    News {
        query: String,
        #[arg(long, default_value_t = 4)]
        page_size: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Detection,
    Generation,
}

impl From<Kind> for RecordKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Detection => RecordKind::Detection,
            Kind::Generation => RecordKind::Generation,
        }
    }
}

#[derive(Debug, Args)]
struct ProfileArgs {
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    /// Avatar URL or base64 image.
    #[arg(long)]
    avatar: Option<String>,
}

#[derive(Debug, Args, Serialize)]
struct GenerateArgs {
    topic: String,
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<String>,
    #[arg(long = "model")]
    #[serde(skip_serializing_if = "Option::is_none")]
    model_type: Option<String>,
    /// formal, sensational, fun or normal.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
    /// politics, business, sports or technology.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("veritas_cli=warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let sessions = match &cli.session {
        Some(path) => SessionFile::new(path),
        None => SessionFile::default_location()?,
    };
    let stored = sessions.load()?;
    let api = ApiClient::new(&cli.api_url, stored.as_ref().map(|s| s.access_token.clone()))?;

    run(cli.command, cli.json, &api, &sessions, stored).await
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Builds a session from a login/register token response.
fn session_from_token(body: &Value, fallback_name: &str) -> Result<StoredUser> {
    let token = body
        .get("access_token")
        .and_then(Value::as_str)
        .context("Server response did not include an access token")?;
    let field = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(StoredUser {
        user_id: field("user_id"),
        username: field("username").or_else(|| Some(fallback_name.to_string())),
        email: field("email"),
        auth_provider: Some("password".to_string()),
        access_token: token.to_string(),
        ..Default::default()
    })
}

async fn run(
    command: Command,
    raw: bool,
    api: &ApiClient,
    sessions: &SessionFile,
    stored: Option<StoredUser>,
) -> Result<()> {
    match command {
        Command::Login {
            username_or_email,
            password,
        } => {
            let body = api.login(&username_or_email, &password).await?;
            let mut user = session_from_token(&body, &username_or_email)?;
            match api.with_token(&user.access_token).me().await {
                Ok(me) => user.merge_profile(&me["user"]),
                Err(e) => warn!("Could not load profile after login: {e}"),
            }
            sessions.save(&user)?;
            println!("Signed in as {}", user.label());
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let body = api.register(&username, &email, &password).await?;
            let mut user = session_from_token(&body, &username)?;
            user.email = Some(email);
            sessions.save(&user)?;
            println!("Account created. Signed in as {}", user.label());
        }
        Command::Logout => {
            sessions.clear()?;
            println!("Signed out");
        }
        Command::Whoami => {
            let Some(mut user) = stored else {
                bail!("Not signed in");
            };
            match api.me().await {
                Ok(me) => {
                    user.merge_profile(&me["user"]);
                    sessions.save(&user)?;
                }
                Err(e) if e.status() == Some(401) => {
                    warn!("Session token was rejected; run `veritas login` again")
                }
                Err(e) => warn!("Showing cached profile; server lookup failed: {e}"),
            }
            if raw {
                print_json(&serde_json::to_value(&user)?)?;
            } else {
                println!("{}", user.label());
                if let Some(email) = &user.email {
                    println!("  email:    {email}");
                }
                if let Some(provider) = &user.auth_provider {
                    println!("  provider: {provider}");
                }
                println!("  session:  {}", sessions.path().display());
            }
        }
        Command::Profile(args) => {
            let Some(mut user) = stored else {
                bail!("Not signed in");
            };
            let fields = json!({
                "display_name": &args.display_name,
                "email": &args.email,
                "avatar_url_or_b64": &args.avatar,
            });
            if fields.as_object().is_some_and(|f| f.values().all(Value::is_null)) {
                bail!("Nothing to update; pass --display-name, --email or --avatar");
            }
            match api.update_profile(&fields).await {
                Ok(_) => {
                    if let Ok(me) = api.me().await {
                        user.merge_profile(&me["user"]);
                    }
                    println!("Profile updated");
                }
                Err(e) => {
                    user.display_name = args.display_name.or(user.display_name);
                    user.email = args.email.or(user.email);
                    user.avatar = args.avatar.or(user.avatar);
                    println!("Server update failed ({e}); saved the change locally only");
                }
            }
            sessions.save(&user)?;
        }
        Command::Detect {
            text,
            image,
            improved,
            related,
        } => {
            let body = api.detect(&text, image.as_deref(), improved).await?;
            if raw {
                print_json(&body)?;
            } else {
                print!("{}", output::detection_summary(&body));
            }
            if related {
                match api.related_news(&text, body.get("result")).await {
                    Ok(news) if raw => print_json(&news)?,
                    Ok(news) => print!("\nRelated coverage:\n{}", output::articles(&news)),
                    Err(e) => println!("Related news unavailable: {e}"),
                }
            }
        }
        Command::Generate(args) => {
            let body = api.generate(&args).await?;
            if raw {
                print_json(&body)?;
            } else {
                let result = &body["result"];
                println!(
                    "[{} / {} / {}]\n",
                    result["strategy"].as_str().unwrap_or("-"),
                    result["style"].as_str().unwrap_or("-"),
                    result["domain"].as_str().unwrap_or("general"),
                );
                println!("{}", result["article"].as_str().unwrap_or_default());
            }
        }
        Command::Strategies => {
            let body = api.strategies().await?;
            if raw {
                print_json(&body)?;
            } else if let Some(list) = body["strategies"].as_array() {
                for s in list {
                    println!(
                        "{:<24} {}",
                        s["name"].as_str().unwrap_or("-"),
                        s["description"].as_str().unwrap_or_default()
                    );
                }
            }
        }
        Command::History {
            kind,
            page,
            page_size,
            query,
        } => {
            let params = HistoryParams {
                page: page.max(1),
                page_size: page_size.clamp(1, 100),
                q: query,
            };
            let body = api.history(kind.into(), &params).await?;
            if raw {
                print_json(&body)?;
            } else {
                match kind {
                    Kind::Detection => print!("{}", output::detection_page(&body)),
                    Kind::Generation => print!("{}", output::generation_page(&body)),
                }
            }
        }
        Command::Delete { kind, id } => {
            api.delete_record(kind.into(), &id).await?;
            println!("Deleted {id}");
        }
        Command::Pdf { kind, id, out } => {
            let bytes = api.download_pdf(kind.into(), &id).await?;
            let prefix = match kind {
                Kind::Detection => "detection",
                Kind::Generation => "generation",
            };
            let path = out.unwrap_or_else(|| PathBuf::from(format!("{prefix}_{id}.pdf")));
            std::fs::write(&path, &bytes).with_context(|| format!("Writing {}", path.display()))?;
            println!("Saved {} ({} bytes)", path.display(), bytes.len());
        }
        Command::Stats => {
            let body = api.stats().await?;
            if raw {
                print_json(&body)?;
            } else {
                print!("{}", output::stats(&body));
            }
        }
        Command::News { query, page_size } => {
            let body = api.search_news(&query, page_size).await?;
            if raw {
                print_json(&body)?;
            } else {
                print!("{}", output::articles(&body));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_history() {
        let cli = Cli::try_parse_from([
            "veritas", "--api-url", "http://api:8000", "history", "generation", "--page", "3",
        ])
        .unwrap();
        assert_eq!(cli.api_url, "http://api:8000");
        match cli.command {
            Command::History {
                kind: Kind::Generation,
                page,
                page_size,
                ..
            } => {
                assert_eq!(page, 3);
                assert_eq!(page_size, 10);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_generate_args_serialize_only_set_fields() {
        let cli = Cli::try_parse_from([
            "veritas", "generate", "city council vote", "--style", "formal",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let body = serde_json::to_value(&args).unwrap();
        assert_eq!(body, json!({"topic": "city council vote", "style": "formal"}));
    }

    #[test]
    fn test_session_from_token() {
        let body = json!({
            "success": true,
            "user_id": "7f1c",
            "access_token": "abc",
            "token_type": "bearer",
        });
        let user = session_from_token(&body, "bob").unwrap();
        assert_eq!(user.access_token, "abc");
        assert_eq!(user.user_id.as_deref(), Some("7f1c"));
        assert_eq!(user.username.as_deref(), Some("bob"));

        assert!(session_from_token(&json!({"success": true}), "bob").is_err());
    }
}
