//! # Amandus
//!
//! Backend of a collaborative web editor for text files, mostly
//! robot-framework tests, kept in GitHub, GitLab and Bitbucket repositories.
//! Usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! amandus = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use amandus::config::ServerConfig;
//! use amandus::oauth::HttpOAuthClient;
//! use amandus::server::{AppState, create_router};
//! use amandus::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let provider = Arc::new(HttpOAuthClient::new(config.oauth.clone()).unwrap());
//! let state = Arc::new(AppState::new(config, Arc::new(store), provider));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `amandus` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod oauth;
pub mod server;
pub mod settings;
pub mod store;
pub mod tokens;
pub mod types;
pub mod workspace;
