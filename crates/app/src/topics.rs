//! Bus topic layout.

use relaysync_domain::channel::RelayChannel;

/// Inbound topics the hub acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundTopic {
    /// `<base>/relay/<n>/set`: direct ON/OFF/TOGGLE command.
    RelaySet(RelayChannel),
    /// `<base>/relay/<n>/schedule/set`: desired schedule as JSON.
    ScheduleSet(RelayChannel),
}

/// Builds and recognises topics under a common base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Topics {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn relay_set(&self, channel: RelayChannel) -> String {
        self.relay(channel, "set")
    }

    #[must_use]
    pub fn schedule_set(&self, channel: RelayChannel) -> String {
        self.relay(channel, "schedule/set")
    }

    #[must_use]
    pub fn schedule_current(&self, channel: RelayChannel) -> String {
        self.relay(channel, "schedule/current")
    }

    #[must_use]
    pub fn schedule_ack(&self, channel: RelayChannel) -> String {
        self.relay(channel, "schedule/slave/ack")
    }

    #[must_use]
    pub fn executed(&self, channel: RelayChannel) -> String {
        self.relay(channel, "executed")
    }

    #[must_use]
    pub fn state(&self, channel: RelayChannel) -> String {
        self.relay(channel, "state")
    }

    #[must_use]
    pub fn telemetry(&self) -> String {
        format!("{}/telemetry", self.base)
    }

    #[must_use]
    pub fn link(&self) -> String {
        format!("{}/link", self.base)
    }

    /// Every topic the bus adapter must subscribe to.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        RelayChannel::ALL
            .into_iter()
            .flat_map(|channel| [self.relay_set(channel), self.schedule_set(channel)])
            .collect()
    }

    /// Recognise an inbound topic; anything outside the layout yields `None`.
    #[must_use]
    pub fn parse(&self, topic: &str) -> Option<InboundTopic> {
        let rest = topic.strip_prefix(&self.base)?.strip_prefix("/relay/")?;
        let (number, action) = rest.split_once('/')?;
        let channel = match number {
            "1" => RelayChannel::new(1),
            "2" => RelayChannel::new(2),
            "3" => RelayChannel::new(3),
            _ => return None,
        }
        .ok()?;
        match action {
            "set" => Some(InboundTopic::RelaySet(channel)),
            "schedule/set" => Some(InboundTopic::ScheduleSet(channel)),
            _ => None,
        }
    }

    fn relay(&self, channel: RelayChannel, suffix: &str) -> String {
        format!("{}/relay/{}/{suffix}", self.base, channel.number())
    }
}
