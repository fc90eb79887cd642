//! Notification payloads handed to the platform.

use serde::{Deserialize, Serialize};

/// Sound played when the notification is presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Sound {
    Default,
    Named(String),
}

/// What the user sees. Rendering is up to the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub sound: Option<Sound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_content_identifier: Option<String>,
}

impl NotificationContent {
    /// Content with the default sound.
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            body: body.into(),
            sound: Some(Sound::Default),
            ..Self::default()
        }
    }

    /// Title and body only, default sound.
    pub fn titled(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, "", body)
    }

    /// Content without any sound.
    pub fn muted(title: impl Into<String>, subtitle: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sound: None,
            ..Self::new(title, subtitle, body)
        }
    }

    pub fn with_sound(mut self, sound: Option<Sound>) -> Self {
        self.sound = sound;
        self
    }
}
