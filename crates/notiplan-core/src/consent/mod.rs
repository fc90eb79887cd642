//! Two independent consent layers: per-group in-app consent and the OS
//! notification permission.

pub mod group;
pub mod system;

pub use group::{
    ConsentEnv, GroupConsent, GroupConsentStore, MemoryConsentEnv, SqliteConsentEnv,
    DEFAULT_KEY_PREFIX,
};
pub use system::{AuthorizationOptions, SystemConsent, SystemConsentGateway};
