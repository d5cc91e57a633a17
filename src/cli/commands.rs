//! CLI command handlers for login, status, logout and request.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;

use crate::auth::{Credentials, FileStorage, TokenStore};
use crate::config::Environment;
use crate::error::{AuthError, Result};
use crate::gateway::AuthGateway;

use super::{Cli, Commands, LoginArgs, RequestArgs};

const PASSWORD_ENV: &str = "BEARER_GATE_PASSWORD";

/// Run the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let env = load_environment(cli.config.as_deref())?;
    let storage = match cli.state_dir {
        Some(dir) => FileStorage::new(dir),
        None => FileStorage::new_default(),
    };
    let store = Arc::new(TokenStore::new(&env, Arc::new(storage)));

    match cli.command {
        Commands::Login(args) => handle_login(&store, args).await,
        Commands::Status => handle_status(&store),
        Commands::Logout => handle_logout(&store),
        Commands::Request(args) => handle_request(&env, store, args).await,
    }
}

/// File first, then `BEARER_GATE_*` overrides.
pub fn load_environment(path: Option<&Path>) -> Result<Environment> {
    match path {
        Some(path) => Environment::load(path)?.apply_env(),
        None => Environment::from_env(),
    }
}

async fn handle_login(store: &TokenStore, args: LoginArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => std::env::var(PASSWORD_ENV).map_err(|_| {
            AuthError::Configuration(format!("pass --password or set {PASSWORD_ENV}"))
        })?,
    };
    let session = store
        .login(&Credentials::new(args.username.as_str(), password))
        .await?;
    match session.claims().expires_at() {
        Some(at) => println!("Logged in as {} (token expires {at})", args.username),
        None => println!("Logged in as {}", args.username),
    }
    Ok(())
}

fn handle_status(store: &TokenStore) -> Result<()> {
    let Some(claims) = store.claims() else {
        println!("Not logged in");
        return Ok(());
    };
    let state = if claims.is_expired_at(Utc::now()) {
        "expired"
    } else {
        "active"
    };
    match claims.expires_at() {
        Some(at) => println!("Session {state}, expires {at}"),
        None => println!("Session {state}"),
    }
    if let Some(sub) = claims.get("sub").and_then(|v| v.as_str()) {
        println!("Subject: {sub}");
    }
    Ok(())
}

fn handle_logout(store: &TokenStore) -> Result<()> {
    store.logout()?;
    println!("Logged out");
    Ok(())
}

async fn handle_request(env: &Environment, store: Arc<TokenStore>, args: RequestArgs) -> Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| AuthError::Configuration(format!("invalid HTTP method: {}", args.method)))?;
    let gateway = AuthGateway::new(env, store).with_navigator(Arc::new(|route: &str| {
        eprintln!("Session expired; log in again ({route})");
    }));

    let mut builder = gateway.request(method, &args.path);
    if let Some(raw) = args.json.as_deref() {
        let body: serde_json::Value = serde_json::from_str(raw)?;
        builder = builder.json(&body);
    }
    let response = gateway.send(builder).await?;
    let status = response.status();
    let body = response.text().await?;
    eprintln!("{status}");
    println!("{body}");
    Ok(())
}
