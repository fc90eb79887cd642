//! Strategy evaluation: group-level consent first, then system-level.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::consent::{GroupConsent, GroupConsentStore, SystemConsentGateway};
use crate::group::GroupId;
use crate::main_queue::MainQueue;
use crate::strategy::{AskMode, GroupLevel, PermissionAsker, PermissionStrategy, SystemLevel};

/// Outcome of evaluating a strategy for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionResult {
    Allowed,
    DeniedOnSystemLevel,
    DeniedOnGroupLevel,
}

impl PermissionResult {
    pub fn is_allowed(self) -> bool {
        self == PermissionResult::Allowed
    }
}

/// Interprets a [`PermissionStrategy`] against the consent stores.
///
/// A group-level denial returns before the OS is consulted at all. Consent
/// prompts run on the [`MainQueue`].
#[derive(Clone)]
pub struct StrategyEvaluator {
    consent: GroupConsentStore,
    gateway: SystemConsentGateway,
    main_queue: MainQueue,
}

impl StrategyEvaluator {
    pub fn new(
        consent: GroupConsentStore,
        gateway: SystemConsentGateway,
        main_queue: MainQueue,
    ) -> Self {
        Self {
            consent,
            gateway,
            main_queue,
        }
    }

    pub fn consent(&self) -> &GroupConsentStore {
        &self.consent
    }

    pub fn gateway(&self) -> &SystemConsentGateway {
        &self.gateway
    }

    pub fn main_queue(&self) -> &MainQueue {
        &self.main_queue
    }

    pub async fn evaluate(&self, strategy: &PermissionStrategy, group: &GroupId) -> PermissionResult {
        if !self.check_group_level(&strategy.group_level, group).await {
            tracing::info!(group = %group, level = ?strategy.group_level, "denied on group level");
            return PermissionResult::DeniedOnGroupLevel;
        }

        if !self.check_system_level(strategy.system_level).await {
            tracing::info!(group = %group, level = ?strategy.system_level, "denied on system level");
            return PermissionResult::DeniedOnSystemLevel;
        }

        tracing::debug!(group = %group, "permission allowed");
        PermissionResult::Allowed
    }

    async fn check_group_level(&self, level: &GroupLevel, group: &GroupId) -> bool {
        match level {
            GroupLevel::Bypass => true,
            GroupLevel::AllowAutomatically => {
                self.record(group, true);
                true
            }
            GroupLevel::IfAlreadyAllowed => self.stored(group).is_allowed(),
            GroupLevel::IfAllowed(other) => self.stored(other).is_allowed(),
            GroupLevel::AskPermission { mode, asker } => match self.stored(group) {
                GroupConsent::Allowed => true,
                GroupConsent::Denied if *mode == AskMode::Once => false,
                GroupConsent::NotAsked | GroupConsent::Denied => {
                    self.prompt(group, Arc::clone(asker)).await
                }
            },
        }
    }

    async fn check_system_level(&self, level: SystemLevel) -> bool {
        match level {
            SystemLevel::IfAlreadyAllowed => self.gateway.current().await.is_allowed(),
            SystemLevel::AskPermission => match self.gateway.authorize().await {
                Ok(consent) => consent.is_allowed(),
                Err(e) => {
                    tracing::warn!(error = %e, "system authorization failed");
                    false
                }
            },
        }
    }

    async fn prompt(&self, group: &GroupId, asker: Arc<dyn PermissionAsker>) -> bool {
        tracing::debug!(group = %group, "presenting group consent prompt");
        let answer = self.main_queue.run(async move { asker.ask().await }).await;
        let granted = match answer {
            Ok(granted) => granted,
            Err(e) => {
                tracing::warn!(group = %group, error = %e, "group consent prompt failed");
                false
            }
        };
        self.record(group, granted);
        granted
    }

    /// Unreadable consent reads as never asked.
    fn stored(&self, group: &GroupId) -> GroupConsent {
        self.consent.get(group).unwrap_or_else(|e| {
            tracing::warn!(group = %group, error = %e, "failed to read group consent");
            GroupConsent::NotAsked
        })
    }

    fn record(&self, group: &GroupId, allowed: bool) {
        if let Err(e) = self.consent.set(group, allowed) {
            tracing::warn!(group = %group, error = %e, "failed to record group consent");
        }
    }
}
