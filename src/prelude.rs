//! Convenience re-exports for common use.

pub use crate::auth::{
    Credentials, FileStorage, KeyValueStorage, MemoryStorage, Session, TokenClaims, TokenSource,
    TokenStore,
};
pub use crate::config::Environment;
pub use crate::error::{AuthError, Result};
pub use crate::gateway::{AuthGateway, Navigator, Transport};
