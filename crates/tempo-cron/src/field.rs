//! Field kinds, per-field calendar operations, and the token parser.

use std::fmt;

use chrono::{Datelike, Duration, Months, NaiveDateTime, Timelike};

use crate::error::{CronError, Result};
use crate::node::CronNode;

/// The six dimensions of a cron pattern.
///
/// Discriminants follow pattern order, so a kind doubles as an index into
/// a schedule's field array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Minute = 0,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
    Year,
}

impl FieldKind {
    /// The six fields in pattern order.
    pub const PATTERN_ORDER: [FieldKind; 6] = [
        FieldKind::Minute,
        FieldKind::Hour,
        FieldKind::DayOfMonth,
        FieldKind::Month,
        FieldKind::DayOfWeek,
        FieldKind::Year,
    ];

    /// Smallest value the field accepts.
    pub const fn min(self) -> i32 {
        match self {
            FieldKind::Minute | FieldKind::Hour | FieldKind::DayOfWeek => 0,
            FieldKind::DayOfMonth | FieldKind::Month => 1,
            FieldKind::Year => 1970,
        }
    }

    /// Largest value the field accepts.
    pub const fn max(self) -> i32 {
        match self {
            FieldKind::Minute => 59,
            FieldKind::Hour => 23,
            FieldKind::DayOfMonth => 31,
            FieldKind::Month => 12,
            FieldKind::DayOfWeek => 6,
            FieldKind::Year => 2999,
        }
    }

    /// Number of distinct values in the field's cycle.
    pub const fn cycle(self) -> i32 {
        self.max() - self.min() + 1
    }

    /// Extract this field's component from `dt`.
    ///
    /// Day-of-week is ISO-ordered starting at 0 = Monday.
    pub fn component(self, dt: NaiveDateTime) -> i32 {
        match self {
            FieldKind::Minute => dt.minute() as i32,
            FieldKind::Hour => dt.hour() as i32,
            FieldKind::DayOfMonth => dt.day() as i32,
            FieldKind::Month => dt.month() as i32,
            FieldKind::DayOfWeek => dt.weekday().num_days_from_monday() as i32,
            FieldKind::Year => dt.year(),
        }
    }

    /// Add `n` units of this field's kind to `dt`.
    ///
    /// Month and year additions clamp the day to the end of the target
    /// month when it would not otherwise exist (Jan 31 + 1 month is
    /// Feb 28/29), which is the calendar primitive's own behaviour. The
    /// day-of-week unit is a day; a weekday is not a settable component.
    /// `None` means the calendar ran out.
    pub fn advance(self, dt: NaiveDateTime, n: i32) -> Option<NaiveDateTime> {
        debug_assert!(n >= 0, "fields only ever advance forwards");
        match self {
            FieldKind::Minute => dt.checked_add_signed(Duration::minutes(n as i64)),
            FieldKind::Hour => dt.checked_add_signed(Duration::hours(n as i64)),
            FieldKind::DayOfMonth | FieldKind::DayOfWeek => {
                dt.checked_add_signed(Duration::days(n as i64))
            }
            FieldKind::Month => dt.checked_add_months(Months::new(n as u32)),
            FieldKind::Year => dt.checked_add_months(Months::new(12 * n as u32)),
        }
    }

    /// Set this field's component of `dt` to its minimum, the odometer
    /// carry applied to fields below the one that advanced.
    ///
    /// Both day kinds set the day-of-month to 1: the weekday is a derived
    /// property of the date, not a component of its own.
    pub fn reset(self, dt: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            FieldKind::Minute => dt.with_minute(0),
            FieldKind::Hour => dt.with_hour(0),
            FieldKind::DayOfMonth | FieldKind::DayOfWeek => dt.with_day(1),
            FieldKind::Month => dt.with_month(1),
            FieldKind::Year => dt.with_year(self.min()),
        }
    }

    /// The less significant fields whose components reset when this field
    /// advances. Day-of-month and day-of-week share the day step, so both
    /// carry into hours and minutes only.
    pub fn carries(self) -> &'static [FieldKind] {
        match self {
            FieldKind::Year => &[
                FieldKind::Month,
                FieldKind::DayOfMonth,
                FieldKind::Hour,
                FieldKind::Minute,
            ],
            FieldKind::Month => &[FieldKind::DayOfMonth, FieldKind::Hour, FieldKind::Minute],
            FieldKind::DayOfMonth | FieldKind::DayOfWeek => {
                &[FieldKind::Hour, FieldKind::Minute]
            }
            FieldKind::Hour => &[FieldKind::Minute],
            FieldKind::Minute => &[],
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
            FieldKind::Year => "year",
        };
        f.write_str(name)
    }
}

/// One parsed dimension of a cron pattern: a field kind bound to the node
/// tree its token produced.
#[derive(Debug, Clone)]
pub struct CronField {
    kind: FieldKind,
    root: Option<CronNode>,
}

impl CronField {
    /// An empty, unparsed field of the given kind.
    pub fn new(kind: FieldKind) -> Self {
        Self { kind, root: None }
    }

    /// Parse `token` into this field's node tree, bounds-checking every
    /// literal against the kind's range.
    pub fn parse(&mut self, token: &str) -> Result<()> {
        self.root = Some(Parser::new(self.kind, token).run()?);
        Ok(())
    }

    /// Whether the field holds a successfully parsed tree.
    pub fn is_valid(&self) -> bool {
        self.root.is_some()
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether the token was anything more specific than a bare `*`.
    ///
    /// The day dimension needs this: an unrestricted day field never
    /// vetoes a date selected by its sibling.
    pub fn is_restricted(&self) -> bool {
        !matches!(self.root(), CronNode::Any)
    }

    /// Whether at least one value in the field's range satisfies the tree.
    pub fn is_satisfiable(&self) -> bool {
        self.root().is_satisfiable(self.kind.min(), self.kind.max())
    }

    /// Whether `dt`'s component for this field satisfies the tree.
    pub fn matches(&self, dt: NaiveDateTime) -> bool {
        self.root().matches(self.kind.component(dt))
    }

    /// Add `n` units of this field's kind to `dt`.
    pub fn advance(&self, dt: NaiveDateTime, n: i32) -> Option<NaiveDateTime> {
        self.kind.advance(dt, n)
    }

    /// Set this field's component of `dt` to its minimum.
    pub fn reset(&self, dt: NaiveDateTime) -> Option<NaiveDateTime> {
        self.kind.reset(dt)
    }

    pub(crate) fn root(&self) -> &CronNode {
        self.root
            .as_ref()
            .expect("cron field queried before a successful parse")
    }
}

/// Recursive-descent parser for one field token.
///
/// The token is consumed left to right. The immediately previously parsed
/// node is handed down explicitly as `prev` so that `-` and `/` can attach
/// to it; there is no shared "last node" state to alias.
struct Parser<'a> {
    kind: FieldKind,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(kind: FieldKind, token: &'a str) -> Self {
        Self { kind, rest: token }
    }

    fn run(mut self) -> Result<CronNode> {
        let mut root = self.node(None)?;
        // Later characters may only extend the node already parsed: a
        // range continuation, a step, or further list elements. Anything
        // else is trailing garbage.
        while let Some(c) = self.peek() {
            match c {
                '-' | '/' | ',' => root = self.node(Some(root))?,
                c => return Err(CronError::UnexpectedCharacter(c, self.kind)),
            }
        }
        Ok(root)
    }

    fn node(&mut self, prev: Option<CronNode>) -> Result<CronNode> {
        match self.peek() {
            None => Err(CronError::UnexpectedEnd(self.kind)),
            Some(c) if c.is_ascii_digit() => Ok(CronNode::Value(self.integer_in_range()?)),
            Some('-') => self.range(prev),
            Some('/') => self.step(prev),
            Some('*') => {
                self.bump();
                Ok(CronNode::Any)
            }
            Some(',') => self.list(prev),
            Some(c) => Err(CronError::UnexpectedCharacter(c, self.kind)),
        }
    }

    fn range(&mut self, prev: Option<CronNode>) -> Result<CronNode> {
        let begin = match prev {
            None => return Err(CronError::RangeMissingBegin(self.kind)),
            Some(CronNode::Value(v)) => v,
            Some(_) => return Err(CronError::RangeNotInteger(self.kind)),
        };
        self.bump(); // '-'
        let end = self.integer_in_range()?;
        if begin > end {
            return Err(CronError::RangeInverted { begin, end });
        }
        Ok(CronNode::Range { begin, end })
    }

    fn step(&mut self, prev: Option<CronNode>) -> Result<CronNode> {
        let base = prev.ok_or(CronError::StepMissingBase(self.kind))?;
        self.bump(); // '/'
        // The frequency follows the integer rule but is not range-checked:
        // `*/90` in the minute field is legal (it can only ever hit 0).
        // Zero is rejected; divisibility by zero is not a rule. Anything
        // past i32 behaves identically to i32::MAX.
        let freq = self.integer()?;
        if freq == 0 {
            return Err(CronError::ZeroStepFrequency(self.kind));
        }
        let freq = i32::try_from(freq).unwrap_or(i32::MAX);
        Ok(CronNode::Step {
            base: Box::new(base),
            freq,
        })
    }

    fn list(&mut self, prev: Option<CronNode>) -> Result<CronNode> {
        let first = prev.ok_or(CronError::UnexpectedCharacter(',', self.kind))?;
        let mut nodes = vec![first];
        while let Some(c) = self.peek() {
            let node = if c == ',' {
                self.bump();
                self.node(None)?
            } else if c == '-' || c == '/' {
                // A continuation refines the element just parsed:
                // `1,5-9` turns the trailing 5 into the range 5-9.
                let base = nodes.pop();
                self.node(base)?
            } else {
                return Err(CronError::UnexpectedCharacter(c, self.kind));
            };
            nodes.push(node);
        }
        Ok(CronNode::List(nodes))
    }

    fn integer_in_range(&mut self) -> Result<i32> {
        let value = self.integer()?;
        let (min, max) = (self.kind.min(), self.kind.max());
        if value < min as i64 || (max as i64) < value {
            return Err(CronError::ValueOutOfRange {
                kind: self.kind,
                value,
                min,
                max,
            });
        }
        Ok(value as i32)
    }

    /// Consume a run of ASCII digits. No sign, no clamping; absurdly long
    /// literals saturate and fail the range check with the saturated value.
    fn integer(&mut self) -> Result<i64> {
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(CronError::InvalidInteger {
                kind: self.kind,
                text: self.rest.to_string(),
            });
        }
        let (digits, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(digits
            .bytes()
            .fold(0i64, |acc, b| acc.saturating_mul(10).saturating_add((b - b'0') as i64)))
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) {
        let mut chars = self.rest.chars();
        chars.next();
        self.rest = chars.as_str();
    }
}
