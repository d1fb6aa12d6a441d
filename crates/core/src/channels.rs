//! Delivery channel names and the per-kind channel set.
//!
//! The string constants are what the WebSocket frames and the email ledger
//! report, so they must stay stable.

use serde::Serialize;

/// Persisted alert pushed to the recipient's live feed.
pub const CHANNEL_IN_APP: &str = "in_app";

/// Desktop/browser-level alert raised by the client alongside a feed push.
pub const CHANNEL_LOCAL: &str = "local";

/// Transactional email sent through the outbound mail provider.
pub const CHANNEL_EMAIL: &str = "email";

/// A single delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Local,
    Email,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::InApp => CHANNEL_IN_APP,
            Channel::Local => CHANNEL_LOCAL,
            Channel::Email => CHANNEL_EMAIL,
        }
    }
}

/// The set of channels an event kind is delivered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSet {
    in_app: bool,
    local: bool,
    email: bool,
}

impl ChannelSet {
    /// In-app feed plus local alert; every kind gets at least these.
    pub const fn realtime() -> Self {
        Self {
            in_app: true,
            local: true,
            email: false,
        }
    }

    pub const fn with_email(mut self) -> Self {
        self.email = true;
        self
    }

    pub fn contains(&self, channel: Channel) -> bool {
        match channel {
            Channel::InApp => self.in_app,
            Channel::Local => self.local,
            Channel::Email => self.email,
        }
    }

    /// Channels in a stable order, for logging and serialization.
    pub fn to_vec(&self) -> Vec<Channel> {
        [Channel::InApp, Channel::Local, Channel::Email]
            .into_iter()
            .filter(|c| self.contains(*c))
            .collect()
    }
}

impl Serialize for ChannelSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_vec().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_set_excludes_email() {
        let set = ChannelSet::realtime();
        assert!(set.contains(Channel::InApp));
        assert!(set.contains(Channel::Local));
        assert!(!set.contains(Channel::Email));
    }

    #[test]
    fn serializes_as_channel_names() {
        let set = ChannelSet::realtime().with_email();
        let json = serde_json::to_value(set).unwrap();
        assert_eq!(json, serde_json::json!(["in_app", "local", "email"]));
    }
}
