//! Schedule rules — time-of-day ON/OFF directives for a relay.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CapacityError, RelaySyncError, ValidationError};

/// Maximum number of rules a single relay schedule may hold.
pub const MAX_RULES: usize = 10;

/// ON/OFF position of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    /// Wire encoding (`0` = OFF, `1` = ON).
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    /// Decode the wire encoding; any non-zero value means ON.
    #[must_use]
    pub fn from_byte(value: u8) -> Self {
        if value == 0 { Self::Off } else { Self::On }
    }

    /// Bus payload (`"ON"` / `"OFF"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwitchState {
    type Err = ValidationError;

    /// Strict: only the exact uppercase spellings are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            other => Err(ValidationError::InvalidState(other.to_owned())),
        }
    }
}

/// Set of weekdays, bit 0 = Monday through bit 6 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DaysMask(u8);

impl DaysMask {
    pub const ALL: Self = Self(0b111_1111);

    /// Wrap a raw mask.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DaysMaskOverflow`] when bit 7 is set.
    pub fn from_bits(bits: u8) -> Result<Self, ValidationError> {
        if bits & 0x80 == 0 {
            Ok(Self(bits))
        } else {
            Err(ValidationError::DaysMaskOverflow(bits))
        }
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether the rule applies on the given weekday (`0` = Monday).
    #[must_use]
    pub fn contains(self, weekday_mon0: u8) -> bool {
        weekday_mon0 < 7 && self.0 & (1 << weekday_mon0) != 0
    }

    /// Parse the Monday-first `"1111100"` representation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DaysLength`] if the text is not exactly
    /// seven characters, or [`ValidationError::DaysNotBinary`] if any
    /// character is not `'0'` or `'1'`.
    pub fn parse_binary(text: &str) -> Result<Self, ValidationError> {
        let count = text.chars().count();
        if count != 7 {
            return Err(ValidationError::DaysLength(count));
        }
        let mut mask = 0u8;
        for (day, byte) in text.bytes().enumerate() {
            match byte {
                b'1' => mask |= 1 << day,
                b'0' => {}
                _ => return Err(ValidationError::DaysNotBinary(text.to_owned())),
            }
        }
        Ok(Self(mask))
    }

    /// Monday-first binary string, e.g. `"1010101"`.
    #[must_use]
    pub fn to_binary(self) -> String {
        (0..7)
            .map(|day| if self.contains(day) { '1' } else { '0' })
            .collect()
    }
}

impl TryFrom<u8> for DaysMask {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_bits(value)
    }
}

impl From<DaysMask> for u8 {
    fn from(value: DaysMask) -> Self {
        value.0
    }
}

/// A single directive: switch to `state` at `hour:minute` on the given days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleRule {
    hour: u8,
    minute: u8,
    state: SwitchState,
    days: DaysMask,
}

impl ScheduleRule {
    /// Build a rule after checking the time of day.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::HourOutOfRange`] or
    /// [`ValidationError::MinuteOutOfRange`].
    pub fn new(
        hour: u8,
        minute: u8,
        state: SwitchState,
        days: DaysMask,
    ) -> Result<Self, ValidationError> {
        if hour > 23 {
            return Err(ValidationError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(ValidationError::MinuteOutOfRange(minute));
        }
        Ok(Self {
            hour,
            minute,
            state,
            days,
        })
    }

    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    #[must_use]
    pub fn minute(&self) -> u8 {
        self.minute
    }

    #[must_use]
    pub fn state(&self) -> SwitchState {
        self.state
    }

    #[must_use]
    pub fn days(&self) -> DaysMask {
        self.days
    }

    /// Zero-padded `"HH:MM"`.
    #[must_use]
    pub fn at(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Ordered list of at most [`MAX_RULES`] rules for one relay.
///
/// Equality is positional: two schedules are equal when they have the same
/// length and each rule matches the rule at the same index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RelaySchedule {
    rules: Vec<ScheduleRule>,
}

impl RelaySchedule {
    /// An empty schedule (the relay is never switched by time).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a schedule from rules, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::TooManyRules`] when more than
    /// [`MAX_RULES`] rules are given.
    pub fn new(rules: Vec<ScheduleRule>) -> Result<Self, RelaySyncError> {
        if rules.len() > MAX_RULES {
            return Err(CapacityError::TooManyRules {
                count: rules.len(),
                max: MAX_RULES,
            }
            .into());
        }
        Ok(Self { rules })
    }

    /// Append a rule.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::TooManyRules`] when the schedule is full.
    pub fn push(&mut self, rule: ScheduleRule) -> Result<(), CapacityError> {
        if self.rules.len() >= MAX_RULES {
            return Err(CapacityError::TooManyRules {
                count: self.rules.len() + 1,
                max: MAX_RULES,
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    #[must_use]
    pub fn rules(&self) -> &[ScheduleRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(hour: u8, minute: u8, state: SwitchState) -> ScheduleRule {
        ScheduleRule::new(hour, minute, state, DaysMask::ALL).unwrap()
    }

    #[test]
    fn should_reject_hour_above_23() {
        let result = ScheduleRule::new(24, 0, SwitchState::On, DaysMask::ALL);
        assert_eq!(result, Err(ValidationError::HourOutOfRange(24)));
    }

    #[test]
    fn should_reject_minute_above_59() {
        let result = ScheduleRule::new(0, 60, SwitchState::On, DaysMask::ALL);
        assert_eq!(result, Err(ValidationError::MinuteOutOfRange(60)));
    }

    #[test]
    fn should_format_at_with_zero_padding() {
        assert_eq!(rule(6, 5, SwitchState::On).at(), "06:05");
        assert_eq!(rule(23, 59, SwitchState::Off).at(), "23:59");
    }

    #[test]
    fn should_parse_days_monday_first() {
        let mask = DaysMask::parse_binary("1010101").unwrap();
        assert_eq!(mask.bits(), 0b101_0101);
        assert!(mask.contains(0));
        assert!(!mask.contains(1));
        assert!(mask.contains(6));
        assert_eq!(mask.to_binary(), "1010101");

        let weekdays = DaysMask::parse_binary("1111100").unwrap();
        assert_eq!(weekdays.bits(), 0b001_1111);
    }

    #[test]
    fn should_reject_days_with_wrong_length() {
        assert_eq!(
            DaysMask::parse_binary("111"),
            Err(ValidationError::DaysLength(3))
        );
        assert_eq!(
            DaysMask::parse_binary("11111111"),
            Err(ValidationError::DaysLength(8))
        );
    }

    #[test]
    fn should_reject_non_binary_days() {
        assert!(matches!(
            DaysMask::parse_binary("11x1100"),
            Err(ValidationError::DaysNotBinary(_))
        ));
    }

    #[test]
    fn should_reject_mask_using_eighth_bit() {
        assert!(DaysMask::from_bits(0x80).is_err());
        assert_eq!(DaysMask::from_bits(0x7F).unwrap(), DaysMask::ALL);
    }

    #[test]
    fn should_reject_mask_using_eighth_bit_in_serde() {
        let parsed: Result<DaysMask, _> = serde_json::from_str("128");
        assert!(parsed.is_err());
        let ok: DaysMask = serde_json::from_str("96").unwrap();
        assert_eq!(ok.bits(), 0b110_0000);
        assert_eq!(serde_json::to_string(&DaysMask::ALL).unwrap(), "127");
    }

    #[test]
    fn should_parse_switch_state_strictly() {
        assert_eq!("ON".parse::<SwitchState>().unwrap(), SwitchState::On);
        assert_eq!("OFF".parse::<SwitchState>().unwrap(), SwitchState::Off);
        assert!("on".parse::<SwitchState>().is_err());
        assert_eq!(SwitchState::On.toggled(), SwitchState::Off);
    }

    #[test]
    fn should_accept_ten_rules_and_reject_eleven() {
        let ten = vec![rule(1, 0, SwitchState::On); 10];
        assert_eq!(RelaySchedule::new(ten).unwrap().len(), 10);

        let eleven = vec![rule(1, 0, SwitchState::On); 11];
        assert!(matches!(
            RelaySchedule::new(eleven),
            Err(RelaySyncError::Capacity(CapacityError::TooManyRules {
                count: 11,
                max: 10
            }))
        ));
    }

    #[test]
    fn should_refuse_push_beyond_capacity() {
        let mut schedule = RelaySchedule::new(vec![rule(1, 0, SwitchState::On); 10]).unwrap();
        assert!(schedule.push(rule(2, 0, SwitchState::Off)).is_err());
        assert_eq!(schedule.len(), 10);
    }

    #[test]
    fn should_compare_schedules_by_position() {
        let a = RelaySchedule::new(vec![rule(6, 0, SwitchState::On), rule(22, 0, SwitchState::Off)])
            .unwrap();
        let b = RelaySchedule::new(vec![rule(22, 0, SwitchState::Off), rule(6, 0, SwitchState::On)])
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, RelaySchedule::empty());
    }
}
