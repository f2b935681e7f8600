use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use signin_core::auth::{
    AuthError, AuthState, AuthoritySegment, BrowserSurface, ClientConfig, OauthConfig,
    SignInDelegate, SignInOrchestrator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Browser-delegated OIDC sign-in from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in against a provider and print the resulting profile
    Login(LoginArgs),
}

#[derive(Args, Debug)]
struct LoginArgs {
    /// Provider issuer URL
    #[arg(long)]
    issuer: Url,
    /// Registered client identifier
    #[arg(long)]
    client_id: String,
    /// Registered redirect URI; its scheme decides which navigations are ours
    #[arg(long)]
    redirect_uri: Url,
    /// Authority/tenant id (the provider's "default" authority when omitted)
    #[arg(long)]
    authority: Option<String>,
    /// The issuer already contains the tenant path; skip the authority segment
    #[arg(long, conflicts_with = "authority")]
    embedded_authority: bool,
    /// Space-delimited scope list
    #[arg(long)]
    scope: Option<String>,
    /// Client secret; required for the code-for-token exchange
    #[arg(long)]
    client_secret: Option<String>,
    /// Pre-fill the provider's login form with this hint
    #[arg(long)]
    login_hint: Option<String>,
    /// Extra key=value authorization parameter (repeatable)
    #[arg(long = "authorize-param", value_parser = parse_key_val)]
    authorize_params: Vec<(String, String)>,
    /// Open the authorization URL in the system browser
    #[arg(long)]
    open: bool,
    /// Print the profile as raw JSON
    #[arg(long)]
    json: bool,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

fn authority(named: Option<String>, embedded: bool) -> AuthoritySegment {
    match (named, embedded) {
        (_, true) => AuthoritySegment::Embedded,
        (Some(id), false) => AuthoritySegment::Named(id),
        (None, false) => AuthoritySegment::Default,
    }
}

enum HostEvent {
    Presented(Url),
    Success { code: String, state: AuthState },
    Error(String),
}

/// Terminal host: supplies the registration, records the discovered
/// endpoints, and forwards flow results to the main loop.
struct TerminalDelegate {
    config: ClientConfig,
    oauth: Mutex<Option<OauthConfig>>,
    events: mpsc::UnboundedSender<HostEvent>,
    open_browser: bool,
}

impl SignInDelegate for TerminalDelegate {
    fn client_config(&self) -> Option<ClientConfig> {
        Some(self.config.clone())
    }

    fn auth_state(&self, _config: &ClientConfig, oauth: &OauthConfig) -> Map<String, Value> {
        *self.oauth.lock() = Some(oauth.clone());
        Map::new()
    }

    fn sign_in_success(&self, code: &str, state: &AuthState) {
        let _ = self.events.send(HostEvent::Success {
            code: code.to_owned(),
            state: state.clone(),
        });
    }

    fn sign_in_error(&self, error: &AuthError) {
        let _ = self.events.send(HostEvent::Error(error.to_string()));
    }

    fn browser_surface(&self) -> Option<Arc<dyn BrowserSurface>> {
        Some(Arc::new(TerminalSurface {
            events: self.events.clone(),
            open_browser: self.open_browser,
        }))
    }
}

/// Stand-in for an embedded browser: shows the URL (optionally launching the
/// system browser) and lets the user paste back the redirect they land on.
struct TerminalSurface {
    events: mpsc::UnboundedSender<HostEvent>,
    open_browser: bool,
}

impl BrowserSurface for TerminalSurface {
    fn present(&self, authorize_url: &Url) {
        if self.open_browser {
            if let Err(err) = open::that(authorize_url.as_str()) {
                eprintln!("failed to open browser: {err}");
            }
        }
        let _ = self.events.send(HostEvent::Presented(authorize_url.clone()));
    }
}

async fn login(args: LoginArgs) -> Result<()> {
    let mut config = ClientConfig::new(args.client_id, args.redirect_uri.clone(), args.issuer)
        .with_authority(authority(args.authority, args.embedded_authority));
    if let Some(scope) = args.scope {
        config = config.with_scope(scope);
    }
    if let Some(secret) = &args.client_secret {
        config = config.with_secret(secret.clone());
    }
    if let Some(hint) = args.login_hint {
        config = config.with_login_hint(hint);
    }
    for (key, value) in args.authorize_params {
        config = config.with_authorize_param(key, value);
    }

    let orchestrator = SignInOrchestrator::new()?;
    let (events, mut inbox) = mpsc::unbounded_channel();
    let delegate = Arc::new(TerminalDelegate {
        config: config.clone(),
        oauth: Mutex::new(None),
        events,
        open_browser: args.open,
    });
    let handle = orchestrator.sign_in(delegate.clone());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let redirect_scheme = config.redirect_uri.scheme().to_owned();
    let code = loop {
        let Some(event) = inbox.recv().await else {
            bail!("sign-in flow ended unexpectedly");
        };
        match event {
            HostEvent::Presented(url) => {
                println!("Open this URL in a browser to sign in:\n\n  {url}\n");
                loop {
                    println!("Paste the {redirect_scheme}:// redirect URL (Ctrl-D to abandon):");
                    let Some(line) = stdin.next_line().await? else {
                        handle.cancel();
                        bail!("sign-in abandoned");
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let candidate = match Url::parse(line) {
                        Ok(url) => url,
                        Err(err) => {
                            eprintln!("not a URL: {err}");
                            continue;
                        }
                    };
                    if orchestrator.handle_redirect(&candidate) {
                        break;
                    }
                    eprintln!("that URL does not use the {redirect_scheme} scheme; still waiting");
                }
            }
            HostEvent::Success { code, state } => {
                println!("Authorization code received (returning to {}).", state.source_redirect_url);
                break code;
            }
            HostEvent::Error(message) => bail!("sign-in failed: {message}"),
        }
    };

    if args.client_secret.is_none() {
        println!("No --client-secret given; skipping the code-for-token exchange.");
        println!("code: {code}");
        return Ok(());
    }

    let oauth = delegate
        .oauth
        .lock()
        .clone()
        .ok_or_else(|| anyhow!("provider configuration missing"))?;
    let token = orchestrator
        .exchange_auth_code(&config, &oauth, &code)
        .await
        .context("token exchange failed")?;
    println!("Access token acquired.");

    let profile = orchestrator
        .fetch_user_info(&oauth, &token)
        .await
        .context("profile fetch failed")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&Value::Object(profile))?);
    } else {
        for (claim, value) in &profile {
            println!("{claim}: {value}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Login(args) => login(args).await,
    }
}
