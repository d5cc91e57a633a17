//! bearer-gate — token session and authenticated request dispatch
//!
//! Keeps the current access token (and the CSRF claim inside it) in a
//! [`auth::TokenStore`], mirrors it to durable key-value storage and attaches
//! it to outbound requests through an [`gateway::AuthGateway`], which runs a
//! single refresh-and-retry cycle when the API answers 401.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bearer_gate::prelude::*;
//!
//! # async fn example() -> bearer_gate::error::Result<()> {
//! let env = Environment::from_env()?;
//! let store = Arc::new(TokenStore::new(&env, Arc::new(FileStorage::new_default())));
//! store.login(&Credentials::new("alice", "secret")).await?;
//!
//! let gateway = AuthGateway::new(&env, store.clone());
//! let me: serde_json::Value = gateway.get_json("users/me").await?;
//! println!("{me}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
