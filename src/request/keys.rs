//! Wire parameter keys and operation names for push-notification requests.
//!
//! These strings are read verbatim by the server and must not change.

/// Request id, prepended at encoding time.
pub const LS_REQ_ID: &str = "LS_reqId";
/// Operation name (`register`, `activate`, `deactivate`).
pub const LS_OP: &str = "LS_op";
/// Device platform.
pub const PN_TYPE: &str = "PN_type";
/// Application id.
pub const PN_APP_ID: &str = "PN_appId";
/// Current (or previous, on renewal) device token.
pub const PN_DEVICE_TOKEN: &str = "PN_deviceToken";
/// Replacement device token on renewal.
pub const PN_NEW_DEVICE_TOKEN: &str = "PN_newDeviceToken";
/// Server-assigned device id.
pub const PN_DEVICE_ID: &str = "PN_deviceId";
/// Client-generated ephemeral subscription id.
pub const LS_SUB_ID: &str = "LS_subId";
/// Item group.
pub const LS_GROUP: &str = "LS_group";
/// Field schema.
pub const LS_SCHEMA: &str = "LS_schema";
/// Subscription mode.
pub const LS_MODE: &str = "LS_mode";
/// Data adapter name.
pub const LS_DATA_ADAPTER: &str = "LS_data_adapter";
/// Server-assigned push subscription id.
pub const PN_SUBSCRIPTION_ID: &str = "PN_subscriptionId";
/// Serialized notification format.
pub const PN_NOTIFICATION_FORMAT: &str = "PN_notificationFormat";
/// Trigger expression.
pub const PN_TRIGGER: &str = "PN_trigger";
/// Coalescing flag.
pub const PN_COALESCING: &str = "PN_coalescing";
/// Requested buffer size.
pub const LS_REQUESTED_BUFFER_SIZE: &str = "LS_requested_buffer_size";
/// Requested maximum frequency.
pub const LS_REQUESTED_MAX_FREQUENCY: &str = "LS_requested_max_frequency";
/// Status filter for bulk deactivation.
pub const PN_SUBSCRIPTION_STATUS: &str = "PN_subscriptionStatus";

/// `LS_op` value for device registration.
pub const OP_REGISTER: &str = "register";
/// `LS_op` value for subscription activation.
pub const OP_ACTIVATE: &str = "activate";
/// `LS_op` value for subscription deactivation.
pub const OP_DEACTIVATE: &str = "deactivate";
