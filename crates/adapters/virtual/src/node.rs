//! The simulated relay node behind the virtual radio.

use relaysync_domain::channel::{PerChannel, RelayChannel};
use relaysync_domain::schedule::{RelaySchedule, SwitchState};
use relaysync_domain::time::WallTime;
use relaysync_domain::wire::{
    ExecutedPacket, Frame, RelayCommand, ScheduleAckPacket, TelemetryPacket,
};

/// State a real node would hold in its own memory.
pub(crate) struct SimulatedNode {
    auto_ack: bool,
    relays: PerChannel<SwitchState>,
    schedules: PerChannel<RelaySchedule>,
    time: WallTime,
}

impl SimulatedNode {
    pub(crate) fn new(auto_ack: bool) -> Self {
        Self {
            auto_ack,
            relays: PerChannel::from_fn(|_| SwitchState::Off),
            schedules: PerChannel::default(),
            time: WallTime::UNSYNCHRONISED,
        }
    }

    pub(crate) fn schedule(&self, channel: RelayChannel) -> &RelaySchedule {
        &self.schedules[channel]
    }

    pub(crate) fn relay(&self, channel: RelayChannel) -> SwitchState {
        self.relays[channel]
    }

    pub(crate) fn telemetry(&self, ms: u32) -> TelemetryPacket {
        TelemetryPacket {
            temperature: 21.0,
            humidity: 45.0,
            soil: 50,
            battery: 100,
            relays: RelayChannel::ALL.map(|channel| self.relays[channel]),
            presence: false,
            ms,
        }
    }

    /// Apply a frame from the hub and return the node's replies.
    pub(crate) fn handle(&mut self, frame: &Frame) -> Vec<Frame> {
        match frame {
            Frame::ScheduleRules(packet) if self.auto_ack => {
                self.schedules[packet.channel] = packet.schedule.clone();
                // Bounded by MAX_RULES.
                #[allow(clippy::cast_possible_truncation)]
                let count = packet.schedule.len() as u8;
                vec![Frame::ScheduleAck(ScheduleAckPacket {
                    channel: packet.channel.number(),
                    ok: true,
                    count,
                    ms: packet.ms,
                })]
            }
            Frame::Command(command) => RelayChannel::ALL
                .into_iter()
                .zip(command.relays)
                .filter_map(|(channel, slot)| slot.map(|cmd| (channel, cmd)))
                .map(|(channel, cmd)| {
                    let state = match cmd {
                        RelayCommand::On => SwitchState::On,
                        RelayCommand::Off => SwitchState::Off,
                        RelayCommand::Toggle => self.relays[channel].toggled(),
                    };
                    self.relays[channel] = state;
                    Frame::Executed(ExecutedPacket {
                        channel: channel.number(),
                        state,
                        minute_of_day: self.time.minute_of_day,
                        weekday_mon0: self.time.weekday_mon0,
                        ms: command.ms,
                    })
                })
                .collect(),
            Frame::TimeSync(sync) => {
                self.time = sync.time;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}
