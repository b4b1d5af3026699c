//! notype Auth: federated and local identity resolution, Argon2id
//! password hashing, and opaque server-side sessions.

pub mod config;
pub mod cookie;
pub mod error;
pub mod identity;
pub mod password;
pub mod session;
pub mod token;

pub use config::{AuthConfig, SessionConfig};
pub use cookie::{CookiePolicy, DeploymentMode};
pub use error::AuthError;
pub use identity::IdentityResolver;
pub use password::{Argon2Hasher, SecretHasher};
pub use session::{IssuedSession, SessionAuthority};
pub use token::{RandomTokenGenerator, TokenGenerator};
