//! Fixed-layout binary frames exchanged with remote nodes over the radio.
//!
//! Every frame except telemetry starts with a one-byte type tag. Multi-byte
//! integers are little-endian and there is no padding.
//!
//! | Tag | Frame | Length |
//! |-----|-------|--------|
//! | 1 | [`CommandPacket`] | 11 |
//! | 2 | [`HelloPacket`] | 6 |
//! | 6 | [`TimeSyncPacket`] | 9 |
//! | 14 | [`ScheduleRulesPacket`] | 47 |
//! | 15 | [`ScheduleAckPacket`] | 8 |
//! | 16 | [`ExecutedPacket`] | 10 |
//! | — | [`TelemetryPacket`] | 18 (recognised by length) |
//!
//! Decoding checks the exact length for the tag and the range of every
//! field, so any byte slice received from the air can be fed to
//! [`Frame::decode`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::channel::RelayChannel;
use crate::error::{CapacityError, RelaySyncError, ValidationError, WireError};
use crate::schedule::{DaysMask, MAX_RULES, RelaySchedule, ScheduleRule, SwitchState};
use crate::time::WallTime;

pub const TAG_COMMAND: u8 = 1;
pub const TAG_HELLO: u8 = 2;
pub const TAG_TIME_SYNC: u8 = 6;
pub const TAG_SCHEDULE_RULES: u8 = 14;
pub const TAG_SCHEDULE_ACK: u8 = 15;
pub const TAG_EXECUTED: u8 = 16;

pub const COMMAND_LEN: usize = 11;
pub const HELLO_LEN: usize = 6;
pub const TIME_SYNC_LEN: usize = 9;
pub const SCHEDULE_RULES_LEN: usize = 3 + MAX_RULES * RULE_SLOT_LEN + 4;
pub const SCHEDULE_ACK_LEN: usize = 8;
pub const EXECUTED_LEN: usize = 10;
pub const TELEMETRY_LEN: usize = 18;

const RULE_SLOT_LEN: usize = 4;
const KEEP: u8 = 255;
const MINUTES_PER_DAY: u16 = 1440;

/// Direct relay instruction carried by a [`CommandPacket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    Off,
    On,
    Toggle,
}

impl RelayCommand {
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Toggle => 2,
        }
    }
}

impl From<SwitchState> for RelayCommand {
    fn from(state: SwitchState) -> Self {
        match state {
            SwitchState::On => Self::On,
            SwitchState::Off => Self::Off,
        }
    }
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "OFF",
            Self::On => "ON",
            Self::Toggle => "TOGGLE",
        })
    }
}

impl FromStr for RelayCommand {
    type Err = ValidationError;

    /// Case-insensitive `ON`, `OFF` or `TOGGLE`, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("ON") {
            Ok(Self::On)
        } else if trimmed.eq_ignore_ascii_case("OFF") {
            Ok(Self::Off)
        } else if trimmed.eq_ignore_ascii_case("TOGGLE") {
            Ok(Self::Toggle)
        } else {
            Err(ValidationError::InvalidCommand(s.to_owned()))
        }
    }
}

/// Fire-and-forget relay command. `None` slots keep the relay as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket {
    pub relays: [Option<RelayCommand>; 3],
    pub irrigation: bool,
    pub live_secs: u16,
    pub ms: u32,
}

impl CommandPacket {
    /// Command addressing a single channel; the other two keep their state.
    #[must_use]
    pub fn for_channel(channel: RelayChannel, command: RelayCommand, ms: u32) -> Self {
        let mut relays = [None; 3];
        relays[channel.index()] = Some(command);
        Self {
            relays,
            irrigation: false,
            live_secs: 0,
            ms,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG_COMMAND);
        for relay in self.relays {
            out.push(relay.map_or(KEEP, RelayCommand::as_byte));
        }
        out.push(u8::from(self.irrigation));
        out.extend_from_slice(&self.live_secs.to_le_bytes());
        out.extend_from_slice(&self.ms.to_le_bytes());
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let mut relays = [None; 3];
        for (i, relay) in relays.iter_mut().enumerate() {
            *relay = match r.u8()? {
                0 => Some(RelayCommand::Off),
                1 => Some(RelayCommand::On),
                2 => Some(RelayCommand::Toggle),
                KEEP => None,
                other => return Err(r.invalid(["r1", "r2", "r3"][i], other)),
            };
        }
        Ok(Self {
            relays,
            irrigation: r.u8()? != 0,
            live_secs: r.u16()?,
            ms: r.u32()?,
        })
    }
}

/// Presence announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloPacket {
    pub channel: u8,
    pub ms: u32,
}

impl HelloPacket {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG_HELLO);
        out.push(self.channel);
        out.extend_from_slice(&self.ms.to_le_bytes());
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            channel: r.u8()?,
            ms: r.u32()?,
        })
    }
}

/// Wall-clock distribution so nodes can evaluate schedules locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSyncPacket {
    pub time: WallTime,
    pub ms: u32,
}

impl TimeSyncPacket {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG_TIME_SYNC);
        out.extend_from_slice(&self.time.minute_of_day.to_le_bytes());
        out.push(self.time.weekday_mon0);
        out.push(u8::from(self.time.valid));
        out.extend_from_slice(&self.ms.to_le_bytes());
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let minute_of_day = r.minute_of_day()?;
        let weekday_mon0 = r.weekday()?;
        Ok(Self {
            time: WallTime {
                minute_of_day,
                weekday_mon0,
                valid: r.u8()? != 0,
            },
            ms: r.u32()?,
        })
    }
}

/// A full schedule for one channel, padded to a constant size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRulesPacket {
    pub channel: RelayChannel,
    pub schedule: RelaySchedule,
    pub ms: u32,
}

impl ScheduleRulesPacket {
    /// Build the packet from an unchecked channel number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ChannelOutOfRange`] if `channel` is not
    /// 1..=3, or [`CapacityError::TooManyRules`] if the schedule is over
    /// capacity.
    pub fn build(channel: u8, schedule: &RelaySchedule, ms: u32) -> Result<Self, RelaySyncError> {
        let channel = RelayChannel::new(channel)?;
        if schedule.len() > MAX_RULES {
            return Err(CapacityError::TooManyRules {
                count: schedule.len(),
                max: MAX_RULES,
            }
            .into());
        }
        Ok(Self {
            channel,
            schedule: schedule.clone(),
            ms,
        })
    }

    /// Encode into the fixed-size wire record.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SCHEDULE_RULES_LEN] {
        let mut out = [0u8; SCHEDULE_RULES_LEN];
        out[0] = TAG_SCHEDULE_RULES;
        out[1] = self.channel.number();
        // Bounded by MAX_RULES.
        #[allow(clippy::cast_possible_truncation)]
        let count = self.schedule.len() as u8;
        out[2] = count;
        for (slot, rule) in out[3..3 + MAX_RULES * RULE_SLOT_LEN]
            .chunks_exact_mut(RULE_SLOT_LEN)
            .zip(self.schedule.rules())
        {
            slot.copy_from_slice(&[
                rule.hour(),
                rule.minute(),
                rule.state().as_byte(),
                rule.days().bits(),
            ]);
        }
        out[SCHEDULE_RULES_LEN - 4..].copy_from_slice(&self.ms.to_le_bytes());
        out
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let raw_channel = r.u8()?;
        let channel =
            RelayChannel::new(raw_channel).map_err(|_| r.invalid("channel", raw_channel))?;
        let count = r.u8()?;
        if usize::from(count) > MAX_RULES {
            return Err(r.invalid("count", count));
        }
        let mut schedule = RelaySchedule::empty();
        for index in 0..MAX_RULES {
            let [hour, minute, state, days] = r.take::<RULE_SLOT_LEN>()?;
            if index >= usize::from(count) {
                continue;
            }
            if state > 1 {
                return Err(r.invalid("state", state));
            }
            let days = DaysMask::from_bits(days).map_err(|_| r.invalid("days", days))?;
            let rule = ScheduleRule::new(hour, minute, SwitchState::from_byte(state), days)
                .map_err(|_| r.invalid("time", u32::from(hour) * 100 + u32::from(minute)))?;
            schedule
                .push(rule)
                .map_err(|_| r.invalid("count", count))?;
        }
        Ok(Self {
            channel,
            schedule,
            ms: r.u32()?,
        })
    }
}

/// Node's answer to a [`ScheduleRulesPacket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleAckPacket {
    /// Raw channel number; range-checked by the receiver.
    pub channel: u8,
    pub ok: bool,
    pub count: u8,
    pub ms: u32,
}

impl ScheduleAckPacket {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG_SCHEDULE_ACK);
        out.push(self.channel);
        out.push(u8::from(self.ok));
        out.push(self.count);
        out.extend_from_slice(&self.ms.to_le_bytes());
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            channel: r.u8()?,
            ok: r.u8()? != 0,
            count: r.u8()?,
            ms: r.u32()?,
        })
    }
}

/// Node's report that it switched a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutedPacket {
    /// Raw channel number; range-checked by the receiver.
    pub channel: u8,
    pub state: SwitchState,
    pub minute_of_day: u16,
    pub weekday_mon0: u8,
    pub ms: u32,
}

impl ExecutedPacket {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG_EXECUTED);
        out.push(self.channel);
        out.push(self.state.as_byte());
        out.extend_from_slice(&self.minute_of_day.to_le_bytes());
        out.push(self.weekday_mon0);
        out.extend_from_slice(&self.ms.to_le_bytes());
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let channel = r.u8()?;
        let state = match r.u8()? {
            0 => SwitchState::Off,
            1 => SwitchState::On,
            other => return Err(r.invalid("state", other)),
        };
        Ok(Self {
            channel,
            state,
            minute_of_day: r.minute_of_day()?,
            weekday_mon0: r.weekday()?,
            ms: r.u32()?,
        })
    }
}

/// Periodic sensor reading broadcast by a node (untagged).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryPacket {
    pub temperature: f32,
    pub humidity: f32,
    pub soil: u8,
    pub battery: u8,
    pub relays: [SwitchState; 3],
    pub presence: bool,
    pub ms: u32,
}

impl TelemetryPacket {
    /// Fixed-size wire form, without allocating.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; TELEMETRY_LEN] {
        let mut out = [0u8; TELEMETRY_LEN];
        out[0..4].copy_from_slice(&self.temperature.to_le_bytes());
        out[4..8].copy_from_slice(&self.humidity.to_le_bytes());
        out[8] = self.soil;
        out[9] = self.battery;
        for (slot, relay) in out[10..13].iter_mut().zip(self.relays) {
            *slot = relay.as_byte();
        }
        out[13] = u8::from(self.presence);
        out[14..18].copy_from_slice(&self.ms.to_le_bytes());
        out
    }

    /// Inverse of [`to_bytes`](Self::to_bytes). Every 18-byte pattern is a reading.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; TELEMETRY_LEN]) -> Self {
        let [t0, t1, t2, t3, h0, h1, h2, h3, soil, battery, r1, r2, r3, presence, m0, m1, m2, m3] =
            *bytes;
        Self {
            temperature: f32::from_le_bytes([t0, t1, t2, t3]),
            humidity: f32::from_le_bytes([h0, h1, h2, h3]),
            soil,
            battery,
            relays: [r1, r2, r3].map(SwitchState::from_byte),
            presence: presence != 0,
            ms: u32::from_le_bytes([m0, m1, m2, m3]),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        r.take::<TELEMETRY_LEN>().map(|bytes| Self::from_bytes(&bytes))
    }
}

/// Any frame that can travel over the radio.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Command(CommandPacket),
    Hello(HelloPacket),
    TimeSync(TimeSyncPacket),
    ScheduleRules(ScheduleRulesPacket),
    ScheduleAck(ScheduleAckPacket),
    Executed(ExecutedPacket),
    Telemetry(TelemetryPacket),
}

impl Frame {
    /// Serialize to wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SCHEDULE_RULES_LEN);
        match self {
            Self::Command(p) => p.encode(&mut out),
            Self::Hello(p) => p.encode(&mut out),
            Self::TimeSync(p) => p.encode(&mut out),
            Self::ScheduleRules(p) => out.extend_from_slice(&p.to_bytes()),
            Self::ScheduleAck(p) => p.encode(&mut out),
            Self::Executed(p) => p.encode(&mut out),
            Self::Telemetry(p) => p.encode(&mut out),
        }
        out
    }

    /// Decode an untrusted byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] for empty input, unknown tags, a length that does
    /// not match the tag, or a field outside its valid range.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() == TELEMETRY_LEN {
            let mut r = Reader::new("Telemetry", bytes);
            return TelemetryPacket::decode(&mut r).map(Self::Telemetry);
        }
        let (&tag, body) = bytes.split_first().ok_or(WireError::Empty)?;
        let (kind, expected) = match tag {
            TAG_COMMAND => ("Command", COMMAND_LEN),
            TAG_HELLO => ("Hello", HELLO_LEN),
            TAG_TIME_SYNC => ("TimeSync", TIME_SYNC_LEN),
            TAG_SCHEDULE_RULES => ("ScheduleRules", SCHEDULE_RULES_LEN),
            TAG_SCHEDULE_ACK => ("ScheduleAck", SCHEDULE_ACK_LEN),
            TAG_EXECUTED => ("Executed", EXECUTED_LEN),
            _ => {
                return Err(WireError::UnknownType {
                    tag,
                    len: bytes.len(),
                });
            }
        };
        if bytes.len() != expected {
            return Err(WireError::WrongLength {
                kind,
                expected,
                actual: bytes.len(),
            });
        }
        let mut r = Reader::new(kind, body);
        match tag {
            TAG_COMMAND => CommandPacket::decode(&mut r).map(Self::Command),
            TAG_HELLO => HelloPacket::decode(&mut r).map(Self::Hello),
            TAG_TIME_SYNC => TimeSyncPacket::decode(&mut r).map(Self::TimeSync),
            TAG_SCHEDULE_RULES => ScheduleRulesPacket::decode(&mut r).map(Self::ScheduleRules),
            TAG_SCHEDULE_ACK => ScheduleAckPacket::decode(&mut r).map(Self::ScheduleAck),
            _ => ExecutedPacket::decode(&mut r).map(Self::Executed),
        }
    }

    /// Human-readable frame name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "Command",
            Self::Hello(_) => "Hello",
            Self::TimeSync(_) => "TimeSync",
            Self::ScheduleRules(_) => "ScheduleRules",
            Self::ScheduleAck(_) => "ScheduleAck",
            Self::Executed(_) => "Executed",
            Self::Telemetry(_) => "Telemetry",
        }
    }
}

/// Cursor over a length-checked frame body.
struct Reader<'a> {
    kind: &'static str,
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(kind: &'static str, bytes: &'a [u8]) -> Self {
        Self { kind, bytes }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let bytes: &'a [u8] = self.bytes;
        let (head, rest) = bytes
            .split_first_chunk::<N>()
            .ok_or(WireError::WrongLength {
                kind: self.kind,
                expected: N,
                actual: bytes.len(),
            })?;
        self.bytes = rest;
        Ok(*head)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        self.take::<1>().map(|[b]| b)
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        self.take().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        self.take().map(u32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, WireError> {
        self.take().map(f32::from_le_bytes)
    }

    fn minute_of_day(&mut self) -> Result<u16, WireError> {
        let value = self.u16()?;
        if value >= MINUTES_PER_DAY {
            return Err(self.invalid("minute_of_day", value));
        }
        Ok(value)
    }

    fn weekday(&mut self) -> Result<u8, WireError> {
        let value = self.u8()?;
        if value > 6 {
            return Err(self.invalid("weekday", value));
        }
        Ok(value)
    }

    fn invalid(&self, field: &'static str, value: impl Into<u32>) -> WireError {
        WireError::InvalidField {
            kind: self.kind,
            field,
            value: value.into(),
        }
    }
}
