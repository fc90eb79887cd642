//! System-level consent: the OS notification permission ("hard ask").

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::platform::{PermissionEnv, PlatformStatus};

/// Normalized OS consent state. Never stored; always re-queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemConsent {
    /// Notifications are authorized.
    Success,
    /// The user refused at some earlier point; the OS will not prompt again.
    DeniedPreviously,
    /// The user refused the prompt shown during this call.
    DeniedNow,
    /// No decision yet (or a provisional/ephemeral grant).
    Undetermined,
}

impl SystemConsent {
    pub fn is_allowed(self) -> bool {
        self == SystemConsent::Success
    }

    /// Map a raw platform status onto the four normalized states.
    pub fn from_platform(status: PlatformStatus) -> Self {
        match status {
            PlatformStatus::Authorized => SystemConsent::Success,
            PlatformStatus::Denied => SystemConsent::DeniedPreviously,
            PlatformStatus::NotDetermined
            | PlatformStatus::Provisional
            | PlatformStatus::Ephemeral => SystemConsent::Undetermined,
        }
    }
}

/// Alert styles requested from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationOptions {
    pub alert: bool,
    pub badge: bool,
    pub sound: bool,
}

impl Default for AuthorizationOptions {
    fn default() -> Self {
        Self {
            alert: true,
            badge: true,
            sound: true,
        }
    }
}

/// Queries and requests OS-level notification permission.
#[derive(Clone)]
pub struct SystemConsentGateway {
    env: Arc<dyn PermissionEnv>,
    options: AuthorizationOptions,
}

impl SystemConsentGateway {
    pub fn new(env: Arc<dyn PermissionEnv>) -> Self {
        Self::with_options(env, AuthorizationOptions::default())
    }

    pub fn with_options(env: Arc<dyn PermissionEnv>, options: AuthorizationOptions) -> Self {
        Self { env, options }
    }

    pub fn options(&self) -> AuthorizationOptions {
        self.options
    }

    /// Current OS consent, without prompting.
    ///
    /// A failing settings query reads as `Undetermined`.
    pub async fn current(&self) -> SystemConsent {
        match self.env.authorization_status().await {
            Ok(status) => SystemConsent::from_platform(status),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read system authorization status");
                SystemConsent::Undetermined
            }
        }
    }

    /// Ask the OS for permission with the configured options.
    pub async fn authorize(&self) -> Result<SystemConsent, PlatformError> {
        self.authorize_with(self.options).await
    }

    /// Ask the OS for permission.
    ///
    /// Prompts at most once, and only while the OS has no decision on
    /// record. An existing grant returns `Success` and an existing refusal
    /// returns `DeniedPreviously`, both without prompting.
    pub async fn authorize_with(
        &self,
        options: AuthorizationOptions,
    ) -> Result<SystemConsent, PlatformError> {
        let status = self.env.authorization_status().await?;
        match status {
            PlatformStatus::Authorized => Ok(SystemConsent::Success),
            PlatformStatus::Denied => Ok(SystemConsent::DeniedPreviously),
            PlatformStatus::NotDetermined => {
                tracing::debug!(?options, "presenting system authorization prompt");
                let granted = self.env.request_authorization(options).await?;
                Ok(if granted {
                    SystemConsent::Success
                } else {
                    SystemConsent::DeniedNow
                })
            }
            PlatformStatus::Provisional | PlatformStatus::Ephemeral => {
                Ok(SystemConsent::Undetermined)
            }
        }
    }
}
