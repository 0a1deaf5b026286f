//! Operation-kind tag space shared with the session engine.

/// Kind of a request travelling over the session control channel.
///
/// The discriminants are stable wire-level integers. Only the four `Mpn*`
/// kinds are built by this crate; the rest belong to the session engine and
/// are listed so both sides agree on the numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestKind {
    /// Data subscription.
    Sub = 1,
    /// Data unsubscription.
    Unsub = 2,
    /// Client message.
    Msg = 3,
    /// Push device registration.
    MpnRegister = 4,
    /// Push subscription activation or modification.
    MpnSubscribe = 5,
    /// Push subscription deactivation.
    MpnUnsubscribe = 6,
    /// Bulk push subscription deactivation by status.
    MpnUnsubscribeByFilter = 7,
    /// Forced rebind.
    Force = 8,
    /// Bandwidth constraint.
    Constrain = 9,
    /// Subscription reconfiguration.
    Reconfigure = 10,
    /// Remote log.
    Log = 11,
}

impl RequestKind {
    /// Wire integer for this kind.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Kind for a wire integer, if it is one of the known tags.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Sub,
            2 => Self::Unsub,
            3 => Self::Msg,
            4 => Self::MpnRegister,
            5 => Self::MpnSubscribe,
            6 => Self::MpnUnsubscribe,
            7 => Self::MpnUnsubscribeByFilter,
            8 => Self::Force,
            9 => Self::Constrain,
            10 => Self::Reconfigure,
            11 => Self::Log,
            _ => return None,
        })
    }

    /// Whether this is a push-notification control kind owned by this crate.
    pub fn is_mpn(self) -> bool {
        matches!(
            self,
            Self::MpnRegister
                | Self::MpnSubscribe
                | Self::MpnUnsubscribe
                | Self::MpnUnsubscribeByFilter
        )
    }

    /// Short name used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sub => "sub",
            Self::Unsub => "unsub",
            Self::Msg => "msg",
            Self::MpnRegister => "mpn_register",
            Self::MpnSubscribe => "mpn_subscribe",
            Self::MpnUnsubscribe => "mpn_unsubscribe",
            Self::MpnUnsubscribeByFilter => "mpn_unsubscribe_filter",
            Self::Force => "force",
            Self::Constrain => "constrain",
            Self::Reconfigure => "reconfigure",
            Self::Log => "log",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
