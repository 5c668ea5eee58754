//! Strict schedule JSON codec.
//!
//! The accepted grammar is deliberately tiny:
//!
//! ```text
//! schedule := '[' ( rule ( ',' rule )* )? ']'
//! rule     := '{' pair ( ',' pair )* '}'
//! pair     := string ':' string        (keys: "at", "state", "days")
//! ```
//!
//! Strings are taken verbatim up to the next `"`; there is no escape
//! processing because none of the valid values can contain one. Anything
//! that does not fit fails the whole parse and no partial schedule is
//! returned.

use std::fmt::Write as _;

use crate::error::{CapacityError, ParseError, RelaySyncError, ValidationError};
use crate::schedule::{DaysMask, MAX_RULES, RelaySchedule, ScheduleRule, SwitchState};

/// Parse a schedule from its bus representation.
///
/// # Errors
///
/// - [`RelaySyncError::Parse`] for structural problems (brackets, quoting,
///   unknown/missing/duplicate keys, trailing characters)
/// - [`RelaySyncError::Validation`] for malformed or out-of-range values
/// - [`RelaySyncError::Capacity`] for more than [`MAX_RULES`] rules
pub fn parse_schedule(text: &str) -> Result<RelaySchedule, RelaySyncError> {
    let mut cursor = Cursor::new(text);
    let mut rules = Vec::new();
    let mut state = ArrayState::Open;

    loop {
        state = match state {
            ArrayState::Open => {
                cursor.expect(b'[')?;
                if cursor.eat(b']') {
                    ArrayState::Closed
                } else {
                    ArrayState::Element
                }
            }
            ArrayState::Element => {
                if rules.len() >= MAX_RULES {
                    return Err(CapacityError::TooManyRules {
                        count: rules.len() + 1,
                        max: MAX_RULES,
                    }
                    .into());
                }
                rules.push(parse_rule(&mut cursor)?);
                ArrayState::AfterElement
            }
            ArrayState::AfterElement => match cursor.next_significant() {
                Some(b',') => ArrayState::Element,
                Some(b']') => ArrayState::Closed,
                Some(_) => {
                    return Err(ParseError::Expected {
                        expected: ']',
                        offset: cursor.pos - 1,
                    }
                    .into());
                }
                None => return Err(ParseError::UnexpectedEnd.into()),
            },
            ArrayState::Closed => {
                cursor.skip_whitespace();
                if !cursor.at_end() {
                    return Err(ParseError::TrailingCharacters { offset: cursor.pos }.into());
                }
                return RelaySchedule::new(rules);
            }
        };
    }
}

/// Render a schedule in canonical form, the exact inverse of
/// [`parse_schedule`].
#[must_use]
pub fn to_json(schedule: &RelaySchedule) -> String {
    let mut out = String::with_capacity(2 + schedule.len() * 48);
    out.push('[');
    for (i, rule) in schedule.rules().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(
            out,
            r#"{{"at":"{}","state":"{}","days":"{}"}}"#,
            rule.at(),
            rule.state(),
            rule.days().to_binary()
        );
    }
    out.push(']');
    out
}

#[derive(Debug, Clone, Copy)]
enum ArrayState {
    Open,
    Element,
    AfterElement,
    Closed,
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Skip whitespace and consume the next byte.
    fn next_significant(&mut self) -> Option<u8> {
        self.skip_whitespace();
        let byte = self.text.as_bytes().get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skip whitespace and consume `byte` if it comes next.
    fn eat(&mut self, byte: u8) -> bool {
        self.skip_whitespace();
        if self.text.as_bytes().get(self.pos) == Some(&byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.eat(byte) {
            return Ok(());
        }
        if self.at_end() {
            Err(ParseError::UnexpectedEnd)
        } else {
            Err(ParseError::Expected {
                expected: char::from(byte),
                offset: self.pos,
            })
        }
    }

    fn quoted(&mut self) -> Result<&'a str, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.text.as_bytes().get(start) != Some(&b'"') {
            return Err(ParseError::ExpectedString { offset: start });
        }
        let body = &self.text[start + 1..];
        let len = body
            .find('"')
            .ok_or(ParseError::UnterminatedString { offset: start })?;
        self.pos = start + 1 + len + 1;
        Ok(&body[..len])
    }
}

#[derive(Default)]
struct RawRule<'a> {
    at: Option<&'a str>,
    state: Option<&'a str>,
    days: Option<&'a str>,
}

impl<'a> RawRule<'a> {
    fn set(&mut self, key: &str, value: &'a str) -> Result<(), ParseError> {
        let (slot, name) = match key {
            "at" => (&mut self.at, "at"),
            "state" => (&mut self.state, "state"),
            "days" => (&mut self.days, "days"),
            other => return Err(ParseError::UnknownKey(other.to_owned())),
        };
        if slot.replace(value).is_some() {
            return Err(ParseError::DuplicateKey(name));
        }
        Ok(())
    }

    fn into_rule(self) -> Result<ScheduleRule, RelaySyncError> {
        let at = self.at.ok_or(ParseError::MissingKey("at"))?;
        let state = self.state.ok_or(ParseError::MissingKey("state"))?;
        let days = self.days.ok_or(ParseError::MissingKey("days"))?;

        let (hour, minute) = parse_at(at)?;
        let state: SwitchState = state.parse()?;
        let days = DaysMask::parse_binary(days)?;
        Ok(ScheduleRule::new(hour, minute, state, days)?)
    }
}

fn parse_rule(cursor: &mut Cursor<'_>) -> Result<ScheduleRule, RelaySyncError> {
    cursor.expect(b'{')?;
    let mut raw = RawRule::default();
    loop {
        let key = cursor.quoted()?;
        cursor.expect(b':')?;
        let value = cursor.quoted()?;
        raw.set(key, value)?;

        match cursor.next_significant() {
            Some(b',') => {}
            Some(b'}') => break,
            Some(_) => {
                return Err(ParseError::Expected {
                    expected: '}',
                    offset: cursor.pos - 1,
                }
                .into());
            }
            None => return Err(ParseError::UnexpectedEnd.into()),
        }
    }
    raw.into_rule()
}

/// Split `"HH:MM"` into hour and minute.
fn parse_at(at: &str) -> Result<(u8, u8), ValidationError> {
    let bytes = at.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(ValidationError::TimeFormat(at.to_owned()));
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(ValidationError::TimeDigits(at.to_owned()));
    }
    let [h1, h0, m1, m0] = digits.map(|d| d - b'0');
    let hour = h1 * 10 + h0;
    let minute = m1 * 10 + m0;
    if hour > 23 {
        return Err(ValidationError::HourOutOfRange(hour));
    }
    if minute > 59 {
        return Err(ValidationError::MinuteOutOfRange(minute));
    }
    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_json(at: &str, state: &str, days: &str) -> String {
        format!(r#"{{"at":"{at}","state":"{state}","days":"{days}"}}"#)
    }

    fn array_of(n: usize) -> String {
        let items: Vec<String> = (0..n)
            .map(|i| rule_json(&format!("{:02}:00", i % 24), "ON", "1111111"))
            .collect();
        format!("[{}]", items.join(","))
    }

    #[test]
    fn should_parse_single_rule() {
        let schedule = parse_schedule(&format!("[{}]", rule_json("07:30", "ON", "1111111"))).unwrap();
        assert_eq!(schedule.len(), 1);
        let rule = schedule.rules()[0];
        assert_eq!(rule.hour(), 7);
        assert_eq!(rule.minute(), 30);
        assert_eq!(rule.state(), SwitchState::On);
        assert_eq!(rule.days(), DaysMask::ALL);
    }

    #[test]
    fn should_parse_empty_array() {
        let schedule = parse_schedule("[]").unwrap();
        assert!(schedule.is_empty());
        assert!(parse_schedule("  [ ]  ").unwrap().is_empty());
    }

    #[test]
    fn should_tolerate_whitespace_between_tokens() {
        let text = r#" [ { "at" : "06:10" , "state" : "OFF" , "days" : "1010101" } ] "#;
        let schedule = parse_schedule(text).unwrap();
        assert_eq!(schedule.rules()[0].days().bits(), 0b101_0101);
    }

    #[test]
    fn should_accept_keys_in_any_order() {
        let text = r#"[{"days":"0000011","state":"OFF","at":"23:59"}]"#;
        let rule = parse_schedule(text).unwrap().rules()[0];
        assert_eq!(rule.at(), "23:59");
        assert_eq!(rule.days().bits(), 0b110_0000);
    }

    #[test]
    fn should_accept_ten_rules() {
        assert_eq!(parse_schedule(&array_of(10)).unwrap().len(), 10);
    }

    #[test]
    fn should_reject_eleven_rules_with_capacity_error() {
        let err = parse_schedule(&array_of(11)).unwrap_err();
        assert!(matches!(
            err,
            RelaySyncError::Capacity(CapacityError::TooManyRules { count: 11, max: 10 })
        ));
    }

    #[test]
    fn should_reject_hour_out_of_range() {
        let err = parse_schedule(&format!("[{}]", rule_json("25:30", "ON", "1111111"))).unwrap_err();
        assert!(matches!(
            err,
            RelaySyncError::Validation(ValidationError::HourOutOfRange(25))
        ));
    }

    #[test]
    fn should_reject_minute_out_of_range() {
        let err = parse_schedule(&format!("[{}]", rule_json("10:60", "ON", "1111111"))).unwrap_err();
        assert!(matches!(
            err,
            RelaySyncError::Validation(ValidationError::MinuteOutOfRange(60))
        ));
    }

    #[test]
    fn should_reject_non_padded_or_non_digit_time() {
        let short = parse_schedule(&format!("[{}]", rule_json("7:30", "ON", "1111111"))).unwrap_err();
        assert!(matches!(
            short,
            RelaySyncError::Validation(ValidationError::TimeFormat(_))
        ));
        let letters =
            parse_schedule(&format!("[{}]", rule_json("0a:30", "ON", "1111111"))).unwrap_err();
        assert!(matches!(
            letters,
            RelaySyncError::Validation(ValidationError::TimeDigits(_))
        ));
        let sign = parse_schedule(&format!("[{}]", rule_json("-1:30", "ON", "1111111"))).unwrap_err();
        assert!(matches!(
            sign,
            RelaySyncError::Validation(ValidationError::TimeDigits(_))
        ));
    }

    #[test]
    fn should_reject_unknown_state() {
        let err = parse_schedule(&format!("[{}]", rule_json("07:30", "X", "1111111"))).unwrap_err();
        assert!(matches!(
            err,
            RelaySyncError::Validation(ValidationError::InvalidState(_))
        ));
    }

    #[test]
    fn should_reject_bad_days() {
        let short = parse_schedule(&format!("[{}]", rule_json("07:30", "ON", "111111"))).unwrap_err();
        assert!(matches!(
            short,
            RelaySyncError::Validation(ValidationError::DaysLength(6))
        ));
        let binary =
            parse_schedule(&format!("[{}]", rule_json("07:30", "ON", "1112111"))).unwrap_err();
        assert!(matches!(
            binary,
            RelaySyncError::Validation(ValidationError::DaysNotBinary(_))
        ));
    }

    #[test]
    fn should_reject_missing_key() {
        let err = parse_schedule(r#"[{"at":"07:30","state":"ON"}]"#).unwrap_err();
        assert!(matches!(
            err,
            RelaySyncError::Parse(ParseError::MissingKey("days"))
        ));
    }

    #[test]
    fn should_reject_unknown_and_duplicate_keys() {
        let unknown =
            parse_schedule(r#"[{"at":"07:30","state":"ON","days":"1111111","x":"1"}]"#).unwrap_err();
        assert!(matches!(
            unknown,
            RelaySyncError::Parse(ParseError::UnknownKey(_))
        ));
        let duplicate =
            parse_schedule(r#"[{"at":"07:30","at":"08:30","state":"ON","days":"1111111"}]"#)
                .unwrap_err();
        assert!(matches!(
            duplicate,
            RelaySyncError::Parse(ParseError::DuplicateKey("at"))
        ));
    }

    #[test]
    fn should_reject_non_string_values() {
        let err = parse_schedule(r#"[{"at":730,"state":"ON","days":"1111111"}]"#).unwrap_err();
        assert!(matches!(
            err,
            RelaySyncError::Parse(ParseError::ExpectedString { .. })
        ));
    }

    #[test]
    fn should_reject_structural_errors() {
        for text in [
            "",
            "{}",
            "[",
            "[{}]",
            r#"[{"at":"07:30""#,
            r#"[{"at":"07:30,"state":"ON"}]"#,
            r#"[{"at":"07:30","state":"ON","days":"1111111"} {"at":"08:00"}]"#,
        ] {
            let result = parse_schedule(text);
            assert!(
                matches!(result, Err(RelaySyncError::Parse(_))),
                "expected parse error for {text:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn should_reject_trailing_characters() {
        let err = parse_schedule("[] x").unwrap_err();
        assert!(matches!(
            err,
            RelaySyncError::Parse(ParseError::TrailingCharacters { offset: 3 })
        ));
        assert!(parse_schedule("[]\n\t ").is_ok());
    }

    #[test]
    fn should_serialize_canonically() {
        let text = r#"[ {"state":"ON", "days":"1111100", "at":"09:05"} ]"#;
        let schedule = parse_schedule(text).unwrap();
        assert_eq!(
            to_json(&schedule),
            r#"[{"at":"09:05","state":"ON","days":"1111100"}]"#
        );
        assert_eq!(to_json(&RelaySchedule::empty()), "[]");
    }

    #[test]
    fn should_reparse_serialized_schedule_to_equal_value() {
        let text = format!(
            "[{},{},{}]",
            rule_json("00:00", "OFF", "0000000"),
            rule_json("12:34", "ON", "1010101"),
            rule_json("23:59", "OFF", "1111111")
        );
        let schedule = parse_schedule(&text).unwrap();
        let again = parse_schedule(&to_json(&schedule)).unwrap();
        assert_eq!(schedule, again);
        assert_eq!(to_json(&again), text);
    }
}
