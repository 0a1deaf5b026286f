//! Push-notification domain types: devices, subscriptions and status filters.
//!
//! These are the inputs request constructors derive their wire parameters
//! from. They are plain data: cloning one never shares state.

use serde::{Deserialize, Serialize};

/// Push service platform of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Apple Push Notification service.
    Apple,
    /// Firebase Cloud Messaging.
    Google,
    /// Browser Web Push (RFC 8030).
    WebPush,
}

impl Platform {
    /// Value sent as `PN_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apple => "Apple",
            Self::Google => "Google",
            Self::WebPush => "WebPush",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device that receives push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Push service platform.
    pub platform: Platform,
    /// Application id registered with the push service.
    pub application_id: String,
    /// Current device token.
    pub token: String,
    /// Token the server last knew, when the token has been rotated since.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_token: Option<String>,
    /// Id assigned by the server after a successful registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Device {
    /// Create an unregistered device.
    pub fn new(
        platform: Platform,
        application_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            application_id: application_id.into(),
            token: token.into(),
            previous_token: None,
            device_id: None,
        }
    }

    /// Set the previously known token.
    #[must_use]
    pub fn with_previous_token(mut self, token: impl Into<String>) -> Self {
        self.previous_token = Some(token.into());
        self
    }

    /// Set the server-assigned device id.
    #[must_use]
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Replace the current token, remembering the old one for renewal.
    ///
    /// If a rotation is already pending, the token the server knows stays
    /// the previous one.
    pub fn rotate_token(&mut self, new_token: impl Into<String>) {
        let new_token = new_token.into();
        if new_token == self.token {
            return;
        }
        let old = std::mem::replace(&mut self.token, new_token);
        if self.previous_token.is_none() {
            self.previous_token = Some(old);
        }
    }

    /// Whether the next registration is a token renewal.
    pub fn is_renewal(&self) -> bool {
        self.previous_token
            .as_deref()
            .is_some_and(|prev| prev != self.token)
    }
}

/// Subscription mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionMode {
    /// MERGE mode.
    Merge,
    /// DISTINCT mode.
    Distinct,
    /// COMMAND mode.
    Command,
    /// RAW mode.
    Raw,
}

impl SubscriptionMode {
    /// Value sent as `LS_mode`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "MERGE",
            Self::Distinct => "DISTINCT",
            Self::Command => "COMMAND",
            Self::Raw => "RAW",
        }
    }
}

/// Requested buffer size or frequency override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RequestedLimit {
    /// No limit.
    Unlimited,
    /// Explicit limit.
    Value(f64),
}

impl RequestedLimit {
    /// Wire rendering: `unlimited` or the number.
    pub fn to_wire(self) -> String {
        match self {
            Self::Unlimited => "unlimited".to_string(),
            Self::Value(v) => v.to_string(),
        }
    }
}

/// A push subscription, pending or confirmed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription mode.
    pub mode: SubscriptionMode,
    /// Item group.
    pub group: String,
    /// Field schema.
    pub schema: String,
    /// Data adapter name.
    #[serde(default)]
    pub data_adapter: Option<String>,
    /// Serialized notification format (JSON).
    #[serde(default)]
    pub notification_format: Option<String>,
    /// Trigger expression.
    #[serde(default)]
    pub trigger: Option<String>,
    /// Merge into an existing similar subscription instead of duplicating it.
    #[serde(default)]
    pub coalescing: bool,
    /// Requested buffer size override.
    #[serde(default)]
    pub requested_buffer_size: Option<RequestedLimit>,
    /// Requested maximum frequency override.
    #[serde(default)]
    pub requested_max_frequency: Option<RequestedLimit>,
    /// Id assigned by the server once the subscription is active.
    #[serde(default)]
    pub subscription_id: Option<String>,
}

impl Subscription {
    /// Create a subscription with no optional settings.
    pub fn new(mode: SubscriptionMode, group: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            mode,
            group: group.into(),
            schema: schema.into(),
            data_adapter: None,
            notification_format: None,
            trigger: None,
            coalescing: false,
            requested_buffer_size: None,
            requested_max_frequency: None,
            subscription_id: None,
        }
    }

    /// Set the data adapter.
    #[must_use]
    pub fn data_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.data_adapter = Some(adapter.into());
        self
    }

    /// Set the serialized notification format.
    #[must_use]
    pub fn notification_format(mut self, format: impl Into<String>) -> Self {
        self.notification_format = Some(format.into());
        self
    }

    /// Set the trigger expression.
    #[must_use]
    pub fn trigger(mut self, expression: impl Into<String>) -> Self {
        self.trigger = Some(expression.into());
        self
    }

    /// Enable or disable coalescing.
    #[must_use]
    pub fn coalescing(mut self, enable: bool) -> Self {
        self.coalescing = enable;
        self
    }

    /// Override the buffer size.
    #[must_use]
    pub fn requested_buffer_size(mut self, limit: RequestedLimit) -> Self {
        self.requested_buffer_size = Some(limit);
        self
    }

    /// Override the maximum frequency.
    #[must_use]
    pub fn requested_max_frequency(mut self, limit: RequestedLimit) -> Self {
        self.requested_max_frequency = Some(limit);
        self
    }

    /// Target an existing server-side subscription.
    #[must_use]
    pub fn subscription_id(mut self, id: impl Into<String>) -> Self {
        self.subscription_id = Some(id.into());
        self
    }
}

/// Status filter for bulk deactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusFilter {
    /// Every subscription of the device.
    All,
    /// Subscriptions whose trigger has not fired.
    Active,
    /// Subscriptions whose trigger has fired.
    Triggered,
}

impl StatusFilter {
    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Active => "ACTIVE",
            Self::Triggered => "TRIGGERED",
        }
    }

    /// Value sent as `PN_subscriptionStatus`; `None` means no restriction.
    pub fn wire_status(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            other => Some(other.as_str()),
        }
    }
}

impl std::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "ACTIVE" => Ok(Self::Active),
            "TRIGGERED" => Ok(Self::Triggered),
            other => Err(format!("unknown subscription status filter: {other}")),
        }
    }
}

/// Fresh client-side ephemeral id for a subscription request.
pub fn new_ephemeral_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
