//! Common error types used across the workspace.
//!
//! Each failure class gets its own typed enum; [`RelaySyncError`] wraps them
//! with `#[from]` conversions so every layer can use `?`.

/// Top-level error for relaysync operations.
#[derive(Debug, thiserror::Error)]
pub enum RelaySyncError {
    /// The schedule JSON is not shaped as expected.
    #[error("parse error")]
    Parse(#[from] ParseError),

    /// A value is out of range or badly formatted.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A bounded container is full.
    #[error("capacity error")]
    Capacity(#[from] CapacityError),

    /// A frame could not be delivered.
    #[error("delivery error")]
    Delivery(#[from] DeliveryError),

    /// A binary frame received from the radio could not be decoded.
    #[error("wire error")]
    Wire(#[from] WireError),

    /// The persistence collaborator failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The message-bus collaborator failed.
    #[error("bus error")]
    Bus(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Structural problems in the schedule JSON text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected '{expected}' at offset {offset}")]
    Expected { expected: char, offset: usize },

    #[error("expected a quoted string at offset {offset}")]
    ExpectedString { offset: usize },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unknown key \"{0}\"")]
    UnknownKey(String),

    #[error("duplicate key \"{0}\"")]
    DuplicateKey(&'static str),

    #[error("missing key \"{0}\"")]
    MissingKey(&'static str),

    #[error("trailing characters at offset {offset}")]
    TrailingCharacters { offset: usize },
}

/// Values that are well-formed but not acceptable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("time must be formatted as HH:MM, got \"{0}\"")]
    TimeFormat(String),

    #[error("time digits must be ASCII decimal, got \"{0}\"")]
    TimeDigits(String),

    #[error("hour {0} out of range (0..=23)")]
    HourOutOfRange(u8),

    #[error("minute {0} out of range (0..=59)")]
    MinuteOutOfRange(u8),

    #[error("state must be ON or OFF, got \"{0}\"")]
    InvalidState(String),

    #[error("days must be 7 characters, got {0}")]
    DaysLength(usize),

    #[error("days must only contain '0' or '1', got \"{0}\"")]
    DaysNotBinary(String),

    #[error("days mask {0:#04x} uses more than 7 bits")]
    DaysMaskOverflow(u8),

    #[error("relay channel {0} out of range (1..=3)")]
    ChannelOutOfRange(u8),

    #[error("relay command must be ON, OFF or TOGGLE, got \"{0}\"")]
    InvalidCommand(String),

    #[error("invalid peer address \"{0}\"")]
    PeerAddress(String),
}

/// A bounded container refused a new element.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("too many rules: {count} (max {max})")]
    TooManyRules { count: usize, max: usize },

    #[error("peer table full ({max} peers)")]
    PeerTableFull { max: usize },
}

/// A frame did not reach its destination.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("no reachable peers")]
    NoPeers,

    #[error("transport refused frame for {peer}: {reason}")]
    SendFailed { peer: String, reason: String },
}

/// Malformed binary frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("empty frame")]
    Empty,

    #[error("unknown frame type {tag} ({len} bytes)")]
    UnknownType { tag: u8, len: usize },

    #[error("{kind} frame must be {expected} bytes, got {actual}")]
    WrongLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} frame field {field} has invalid value {value}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        value: u32,
    },
}
