use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use jira_rest::auth::AuthStrategy;
use jira_rest::client::{Api, JiraClient};
use jira_rest::config::{self, AppConfig};
use jira_rest::logging;
use jira_rest::oauth::OAuthHandler;
use jira_rest::session::{MemorySessionStore, SessionStore, SqliteSessionStore};
use reqwest::blocking::Response;
use reqwest::Method;

/// Talk to the Jira Cloud REST API from the command line
#[derive(Parser, Debug)]
#[command(name = "jira-rest", version, propagate_version = true)]
struct Cli {
    /// Config file; defaults to $XDG_CONFIG_HOME/jira-rest/config.toml
    #[arg(long, short = 'c', global = true, env = "JIRA_REST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the site's serverInfo
    ServerInfo,
    /// GET any resource below an API prefix
    Get {
        /// Path below the prefix, e.g. `issue/PR-1` or `board/7/sprint`
        resource: String,
        #[arg(long, value_enum, default_value_t = ApiArg::Platform)]
        api: ApiArg,
        /// Query parameter as key=value; repeatable
        #[arg(long = "query", short = 'q', value_parser = parse_pair)]
        query: Vec<(String, String)>,
    },
    /// Print the OAuth2 consent URL
    AuthorizeUrl {
        #[arg(long)]
        state: Option<String>,
    },
    /// Exchange an OAuth2 authorization code and store the tokens
    Exchange { code: String },
    /// Refresh the stored OAuth2 access token
    Refresh,
    /// Print the Atlassian account behind the stored OAuth2 token
    Me,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ApiArg {
    Platform,
    PlatformV3,
    Agile,
}

impl From<ApiArg> for Api {
    fn from(value: ApiArg) -> Self {
        match value {
            ApiArg::Platform => Api::Platform,
            ApiArg::PlatformV3 => Api::PlatformV3,
            ApiArg::Agile => Api::Agile,
        }
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    if key.trim().is_empty() {
        return Err(format!("empty query key in {raw:?}"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn open_session(config: &AppConfig) -> Result<Box<dyn SessionStore>, Box<dyn Error>> {
    if config.session.db_path.trim().is_empty() {
        tracing::debug!("session.db_path unset; tokens live for this process only");
        return Ok(Box::new(MemorySessionStore::new()));
    }
    Ok(Box::new(SqliteSessionStore::open(
        Path::new(&config.session.db_path),
        &config.session.name,
        Duration::from_secs(config.session.duration),
    )?))
}

/// OAuth handler with any session tokens loaded and refreshed if stale.
fn oauth_handler(
    config: &AppConfig,
    store: &dyn SessionStore,
) -> Result<OAuthHandler, Box<dyn Error>> {
    let mut handler = OAuthHandler::from_config(config)?;
    if handler.restore_from_session(store)? && handler.refresh_if_expired()? {
        tracing::info!("refreshed expired access token");
        handler.store_in_session(store)?;
    }
    Ok(handler)
}

fn api_client(config: &AppConfig, store: &dyn SessionStore) -> Result<JiraClient, Box<dyn Error>> {
    match config.strategy()? {
        AuthStrategy::OAuth2 => Ok(oauth_handler(config, store)?.jira_client()?),
        _ => Ok(JiraClient::with_options(
            &config.host,
            config.credentials()?,
            &config.client_options,
        )?),
    }
}

fn print_response(response: Response) -> Result<(), Box<dyn Error>> {
    let body = response.text()?;
    if body.trim().is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };
    logging::init(&config.log_level);
    tracing::debug!(host = %config.host, auth = %config.default_auth, "loaded config");

    let store = open_session(&config)?;

    match cli.command {
        Command::ServerInfo => {
            let client = api_client(&config, store.as_ref())?;
            print_response(client.server_info().get()?)?;
        }
        Command::Get {
            resource,
            api,
            query,
        } => {
            let client = api_client(&config, store.as_ref())?;
            let params = (!query.is_empty()).then_some(query.as_slice());
            print_response(client.execute(Method::GET, api.into(), &resource, params)?)?;
        }
        Command::AuthorizeUrl { state } => {
            let mut handler = OAuthHandler::from_config(&config)?;
            let state = state.unwrap_or_else(OAuthHandler::random_state);
            println!("{}", handler.authorization_url(&state)?);
            eprintln!("state: {state}");
        }
        Command::Exchange { code } => {
            let mut handler = OAuthHandler::from_config(&config)?;
            let tokens = handler.exchange_code(&code)?;
            handler.store_in_session(store.as_ref())?;
            tracing::info!(cloud_id = ?tokens.cloud_id, "stored oauth tokens");
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
        Command::Refresh => {
            let mut handler = OAuthHandler::from_config(&config)?;
            if !handler.restore_from_session(store.as_ref())? {
                return Err("no tokens in session; run `jira-rest exchange <code>` first".into());
            }
            let refresh_token = handler
                .token_set()
                .and_then(|t| t.refresh_token.clone())
                .ok_or("session holds no refresh token")?;
            let tokens = handler.refresh(&refresh_token)?;
            handler.store_in_session(store.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
        Command::Me => {
            let handler = oauth_handler(&config, store.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&handler.me()?)?);
        }
    }

    Ok(())
}
