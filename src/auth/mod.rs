//! Session ownership: login/refresh endpoints, token claims and durable storage.

pub mod api;
pub mod claims;
pub mod session;
pub mod storage;
pub mod token_store;

pub use api::AuthApi;
pub use claims::TokenClaims;
pub use session::{AuthResponse, Credentials, Session};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use token_store::{TokenSource, TokenStore};
