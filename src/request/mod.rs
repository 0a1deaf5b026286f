//! Push-notification control requests.
//!
//! A [`Request`] is an immutable bag of wire parameters tagged with a
//! [`RequestKind`] and a unique id. Each constructor derives the parameters
//! deterministically from its inputs: building the same logical operation
//! twice yields equal parameter sets and different ids.
//!
//! # Parameter layout
//!
//! ```text
//! register     LS_op PN_type PN_appId PN_deviceToken [PN_newDeviceToken]
//! activate     LS_op PN_deviceId LS_subId LS_mode LS_group LS_schema
//!              [LS_data_adapter] [PN_subscriptionId] [PN_notificationFormat]
//!              [PN_trigger] [PN_coalescing] [LS_requested_buffer_size]
//!              [LS_requested_max_frequency]
//! deactivate   LS_op PN_deviceId PN_subscriptionId
//! deactivate   LS_op PN_deviceId [PN_subscriptionStatus]      (by filter)
//! ```
//!
//! `LS_reqId` is not a parameter; [`Request::to_wire`] prepends it.

pub mod ids;
pub mod keys;
pub mod kind;
pub mod params;

pub use ids::RequestIdGenerator;
pub use kind::RequestKind;
pub use params::RequestParams;

use crate::model::{Device, StatusFilter, Subscription};
use keys::{
    LS_DATA_ADAPTER, LS_GROUP, LS_MODE, LS_OP, LS_REQUESTED_BUFFER_SIZE,
    LS_REQUESTED_MAX_FREQUENCY, LS_SCHEMA, LS_SUB_ID, OP_ACTIVATE, OP_DEACTIVATE, OP_REGISTER,
    PN_APP_ID, PN_COALESCING, PN_DEVICE_ID, PN_DEVICE_TOKEN, PN_NEW_DEVICE_TOKEN,
    PN_NOTIFICATION_FORMAT, PN_SUBSCRIPTION_ID, PN_SUBSCRIPTION_STATUS, PN_TRIGGER, PN_TYPE,
};

/// Reasons a request cannot be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The device has no server-assigned id yet.
    MissingDeviceId,
    /// The subscription has no server-assigned id yet.
    MissingSubscriptionId,
    /// The device has an empty application id.
    MissingAppId,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDeviceId => write!(f, "Device is not registered: no device id"),
            Self::MissingSubscriptionId => {
                write!(f, "Subscription is not active: no subscription id")
            }
            Self::MissingAppId => write!(f, "Device has no application id"),
        }
    }
}

impl std::error::Error for RequestError {}

/// A control request ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: u64,
    kind: RequestKind,
    params: RequestParams,
    subscription_id: Option<String>,
}

impl Request {
    /// Build a device registration.
    ///
    /// Without a previous token, or when it equals the current one, the
    /// current token is sent alone. Otherwise the previous token goes in
    /// `PN_deviceToken` and the current one in `PN_newDeviceToken`, telling
    /// the server this is a renewal of a known device.
    pub fn register(ids: &RequestIdGenerator, device: &Device) -> Result<Self, RequestError> {
        if device.application_id.is_empty() {
            return Err(RequestError::MissingAppId);
        }

        let mut params = RequestParams::new();
        params.insert(LS_OP, OP_REGISTER);
        params.insert(PN_TYPE, device.platform.as_str());
        params.insert(PN_APP_ID, &device.application_id);
        match device.previous_token.as_deref() {
            Some(prev) if prev != device.token => {
                params.insert(PN_DEVICE_TOKEN, prev);
                params.insert(PN_NEW_DEVICE_TOKEN, &device.token);
            }
            _ => params.insert(PN_DEVICE_TOKEN, &device.token),
        }

        Ok(Self::assemble(ids, RequestKind::MpnRegister, params, None))
    }

    /// Build a subscription activation, or a modification in place when the
    /// subscription already carries a server id.
    pub fn subscribe(
        ids: &RequestIdGenerator,
        device: &Device,
        ephemeral_id: &str,
        subscription: &Subscription,
    ) -> Result<Self, RequestError> {
        let device_id = device
            .device_id
            .as_deref()
            .ok_or(RequestError::MissingDeviceId)?;

        let mut params = RequestParams::new();
        params.insert(LS_OP, OP_ACTIVATE);
        params.insert(PN_DEVICE_ID, device_id);
        params.insert(LS_SUB_ID, ephemeral_id);
        params.insert(LS_MODE, subscription.mode.as_str());
        params.insert(LS_GROUP, &subscription.group);
        params.insert(LS_SCHEMA, &subscription.schema);
        params.insert_opt(LS_DATA_ADAPTER, subscription.data_adapter.as_deref());
        params.insert_opt(PN_SUBSCRIPTION_ID, subscription.subscription_id.as_deref());
        params.insert_opt(
            PN_NOTIFICATION_FORMAT,
            subscription.notification_format.as_deref(),
        );
        params.insert_opt(PN_TRIGGER, subscription.trigger.as_deref());
        if subscription.coalescing {
            params.insert(PN_COALESCING, "true");
        }
        if let Some(limit) = subscription.requested_buffer_size {
            params.insert(LS_REQUESTED_BUFFER_SIZE, &limit.to_wire());
        }
        if let Some(limit) = subscription.requested_max_frequency {
            params.insert(LS_REQUESTED_MAX_FREQUENCY, &limit.to_wire());
        }

        Ok(Self::assemble(
            ids,
            RequestKind::MpnSubscribe,
            params,
            subscription.subscription_id.clone(),
        ))
    }

    /// Build the deactivation of a confirmed subscription.
    pub fn unsubscribe(
        ids: &RequestIdGenerator,
        device: &Device,
        subscription: &Subscription,
    ) -> Result<Self, RequestError> {
        let device_id = device
            .device_id
            .as_deref()
            .ok_or(RequestError::MissingDeviceId)?;
        let subscription_id = subscription
            .subscription_id
            .as_deref()
            .ok_or(RequestError::MissingSubscriptionId)?;

        let mut params = RequestParams::new();
        params.insert(LS_OP, OP_DEACTIVATE);
        params.insert(PN_DEVICE_ID, device_id);
        params.insert(PN_SUBSCRIPTION_ID, subscription_id);

        Ok(Self::assemble(
            ids,
            RequestKind::MpnUnsubscribe,
            params,
            Some(subscription_id.to_string()),
        ))
    }

    /// Build a bulk deactivation of the subscriptions matching `filter`.
    ///
    /// [`StatusFilter::All`] omits `PN_subscriptionStatus` entirely.
    pub fn unsubscribe_by_filter(
        ids: &RequestIdGenerator,
        device: &Device,
        filter: StatusFilter,
    ) -> Result<Self, RequestError> {
        let device_id = device
            .device_id
            .as_deref()
            .ok_or(RequestError::MissingDeviceId)?;

        let mut params = RequestParams::new();
        params.insert(LS_OP, OP_DEACTIVATE);
        params.insert(PN_DEVICE_ID, device_id);
        params.insert_opt(PN_SUBSCRIPTION_STATUS, filter.wire_status());

        Ok(Self::assemble(
            ids,
            RequestKind::MpnUnsubscribeByFilter,
            params,
            None,
        ))
    }

    fn assemble(
        ids: &RequestIdGenerator,
        kind: RequestKind,
        params: RequestParams,
        subscription_id: Option<String>,
    ) -> Self {
        Self {
            id: ids.next_id(),
            kind,
            params,
            subscription_id,
        }
    }

    /// Unique request id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Operation kind.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Wire parameters.
    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    /// Server id of the targeted subscription, if any.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }

    /// Encoded control request body, `LS_reqId` first.
    pub fn to_wire(&self) -> String {
        self.params.to_wire(self.id)
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.params, f)
    }
}
