use thiserror::Error;

use crate::field::FieldKind;

/// Errors produced while parsing a cron pattern.
///
/// All of these are recoverable input errors surfaced to the caller; none
/// is ever fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    /// The pattern contained an embedded newline.
    #[error("'\\n' is an invalid field separator")]
    NewlineSeparator,

    /// The pattern did not contain exactly six whitespace-separated fields.
    #[error("wrong number of fields: expected 6, got {0}")]
    FieldCount(usize),

    /// A character that does not begin (or continue) any rule.
    #[error("unexpected character {0:?} in {1} field")]
    UnexpectedCharacter(char, FieldKind),

    /// A field ended where a rule was still expected.
    #[error("unexpected end of {0} field")]
    UnexpectedEnd(FieldKind),

    /// Digits were expected but not found.
    #[error("{text:?} does not start with a valid integer in {kind} field")]
    InvalidInteger { kind: FieldKind, text: String },

    /// An integer literal fell outside the field's valid range.
    #[error("value {value} out of range [{min};{max}] for {kind} field")]
    ValueOutOfRange {
        kind: FieldKind,
        value: i64,
        min: i32,
        max: i32,
    },

    /// `-` appeared with no rule before it.
    #[error("range has no beginning in {0} field")]
    RangeMissingBegin(FieldKind),

    /// `-` appeared after something other than an integer literal.
    #[error("expected an integer before '-' in {0} field")]
    RangeNotInteger(FieldKind),

    /// A range whose end is smaller than its beginning.
    #[error("invalid range {begin}-{end}: end is before begin")]
    RangeInverted { begin: i32, end: i32 },

    /// `/` appeared with no rule before it.
    #[error("step has no base in {0} field")]
    StepMissingBase(FieldKind),

    /// A step frequency of zero.
    #[error("step frequency must be positive in {0} field")]
    ZeroStepFrequency(FieldKind),
}

pub type Result<T> = std::result::Result<T, CronError>;
