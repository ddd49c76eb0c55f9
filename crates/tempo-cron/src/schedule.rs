//! The six-field schedule: pattern validation, matching, and the `next`
//! rollover search.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use crate::error::{CronError, Result};
use crate::field::{CronField, FieldKind};
use crate::node::CronNode;

/// How far past the starting year `next` searches before concluding the
/// schedule has no occurrence. The Gregorian calendar repeats exactly every
/// 400 years, weekdays included, so a pattern that has not matched inside
/// the window never will.
const SEARCH_HORIZON_YEARS: i32 = 400;

/// A parsed six-field cron pattern: minute, hour, day-of-month, month,
/// day-of-week, year.
///
/// Immutable once parsed. `matches` and `next` work on caller-supplied
/// instants and never touch shared state, so one `Cron` can serve
/// concurrent queries.
#[derive(Debug, Clone)]
pub struct Cron {
    pattern: String,
    fields: [CronField; 6],
    /// False when some field's rule can never be satisfied by any value in
    /// its range (e.g. `*/13` in the month field); `next` short-circuits.
    satisfiable: bool,
}

impl Cron {
    /// Parse a six-field pattern.
    ///
    /// Runs of whitespace separate fields; leading and trailing whitespace
    /// is ignored. Embedded newlines are rejected outright.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.contains('\n') {
            return Err(CronError::NewlineSeparator);
        }
        let tokens: Vec<&str> = pattern.split_whitespace().collect();
        if tokens.len() != FieldKind::PATTERN_ORDER.len() {
            return Err(CronError::FieldCount(tokens.len()));
        }
        let mut fields = FieldKind::PATTERN_ORDER.map(CronField::new);
        for (field, token) in fields.iter_mut().zip(&tokens) {
            field.parse(token)?;
        }
        let satisfiable = fields.iter().all(CronField::is_satisfiable);
        Ok(Self {
            pattern: tokens.join(" "),
            fields,
            satisfiable,
        })
    }

    /// The canonical pattern string: the six tokens joined by single
    /// spaces.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `dt` satisfies all six fields, at whole-minute granularity
    /// (seconds are not considered).
    ///
    /// Day-of-month and day-of-week are alternative day selectors: when
    /// both are restricted, a date qualifies if either one matches, the
    /// classic cron convention, kept as-is.
    pub fn matches(&self, dt: NaiveDateTime) -> bool {
        let dom = self.field(FieldKind::DayOfMonth);
        let dow = self.field(FieldKind::DayOfWeek);
        let day_ok = if dom.is_restricted() && dow.is_restricted() {
            dom.matches(dt) || dow.matches(dt)
        } else {
            dom.matches(dt) && dow.matches(dt)
        };
        day_ok
            && self.field(FieldKind::Minute).matches(dt)
            && self.field(FieldKind::Hour).matches(dt)
            && self.field(FieldKind::Month).matches(dt)
            && self.field(FieldKind::Year).matches(dt)
    }

    /// The first instant strictly after `after` at which the pattern
    /// matches, or `None` when no such instant exists.
    ///
    /// The candidate starts one minute ahead with seconds truncated, then
    /// each field from most significant (year) to least (minute) catches
    /// the candidate up to its next target, resetting everything below it
    /// like an odometer rolling over. Every step moves the candidate
    /// strictly forward, so the loop either lands on an occurrence or runs
    /// past the search horizon.
    pub fn next(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.satisfiable {
            return None;
        }
        let mut dt = after
            .checked_add_signed(Duration::minutes(1))?
            .with_second(0)?
            .with_nanosecond(0)?;
        let horizon = after.year().saturating_add(SEARCH_HORIZON_YEARS);

        while !self.matches(dt) {
            if dt.year() > horizon {
                return None;
            }
            self.align(FieldKind::Year, &mut dt)?;
            self.align(FieldKind::Month, &mut dt)?;
            self.align_day(&mut dt)?;
            self.align(FieldKind::Hour, &mut dt)?;
            self.align(FieldKind::Minute, &mut dt)?;
        }
        Some(dt)
    }

    fn field(&self, kind: FieldKind) -> &CronField {
        &self.fields[kind as usize]
    }

    /// Catch `dt` up on one field: drive the candidate to the node tree's
    /// target, then walk unit by unit until the field's predicate holds.
    /// The walk is bounded by one field cycle; if it runs out (a day value
    /// the current month does not have, say) the outer loop in `next`
    /// resumes from wherever the candidate got to.
    fn align(&self, kind: FieldKind, dt: &mut NaiveDateTime) -> Option<()> {
        let field = self.field(kind);
        self.align_node(field.root(), kind, dt)?;
        let mut remaining = kind.cycle();
        while !field.matches(*dt) && remaining > 0 {
            *dt = field.advance(*dt, 1)?;
            remaining -= 1;
        }
        Some(())
    }

    /// The day dimension. Day-of-month and day-of-week share the day carry
    /// step: with one restricted sibling the restricted field drives; with
    /// both restricted the candidate walks a day at a time until either
    /// matches, which is at most a week away since a weekday rule is
    /// involved.
    fn align_day(&self, dt: &mut NaiveDateTime) -> Option<()> {
        let dom = self.field(FieldKind::DayOfMonth);
        let dow = self.field(FieldKind::DayOfWeek);
        match (dom.is_restricted(), dow.is_restricted()) {
            (false, false) => Some(()),
            (true, false) => self.align(FieldKind::DayOfMonth, dt),
            (false, true) => self.align(FieldKind::DayOfWeek, dt),
            (true, true) => {
                while !(dom.matches(*dt) || dow.matches(*dt)) {
                    self.add(FieldKind::DayOfMonth, dt, 1)?;
                }
                Some(())
            }
        }
    }

    /// Drive `dt` toward one node's target for one field. Constants and
    /// the out-of-range side of ranges go through `catch_up`; steps
    /// delegate to their base and then walk to the next accepted multiple;
    /// lists pick the first child whose target is ahead without wrapping,
    /// falling back to the first child.
    fn align_node(&self, node: &CronNode, kind: FieldKind, dt: &mut NaiveDateTime) -> Option<()> {
        match node {
            CronNode::Any => Some(()),
            CronNode::Value(v) => self.catch_up(kind, dt, *v),
            CronNode::Range { begin, end } => {
                let current = kind.component(*dt);
                if current < *begin || *end < current {
                    self.catch_up(kind, dt, *begin)
                } else if kind == FieldKind::Minute {
                    // Strictly-next semantics: a minute already inside the
                    // range moves one ahead rather than staying put.
                    self.add(kind, dt, 1)
                } else {
                    Some(())
                }
            }
            CronNode::Step { base, freq } => {
                self.align_node(base, kind, dt)?;
                let mut remaining = kind.cycle();
                while remaining > 0 {
                    let current = kind.component(*dt);
                    if current % freq == 0 && base.matches(current) {
                        break;
                    }
                    self.add(kind, dt, 1)?;
                    remaining -= 1;
                }
                Some(())
            }
            CronNode::List(nodes) => {
                let current = kind.component(*dt);
                let chosen = nodes
                    .iter()
                    .find(|n| n.advance(current, kind.max()) >= 0)
                    .unwrap_or(&nodes[0]);
                self.align_node(chosen, kind, dt)
            }
        }
    }

    /// Move `dt`'s component for `kind` forward to `target`: ahead by the
    /// difference, or around into the next cycle when the target has
    /// already passed. A passed target on the year field ends the search
    /// (years only ascend); the minute field never wraps here, the walk
    /// in `align` exhausts the hour instead.
    fn catch_up(&self, kind: FieldKind, dt: &mut NaiveDateTime, target: i32) -> Option<()> {
        let current = kind.component(*dt);
        if current < target {
            self.add(kind, dt, target - current)
        } else if current > target {
            match kind {
                FieldKind::Year => None,
                FieldKind::Minute => Some(()),
                _ => self.add(kind, dt, kind.max() - current + target),
            }
        } else {
            Some(())
        }
    }

    /// Advance `dt` by `n` units of `kind`, then reset every less
    /// significant field to its minimum, the odometer carry.
    fn add(&self, kind: FieldKind, dt: &mut NaiveDateTime, n: i32) -> Option<()> {
        *dt = kind.advance(*dt, n)?;
        for &lower in kind.carries() {
            *dt = lower.reset(*dt)?;
        }
        Some(())
    }
}

impl FromStr for Cron {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self> {
        Cron::parse(s)
    }
}

impl fmt::Display for Cron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn wildcard_pattern_matches_everything() {
        let cron = Cron::parse("* * * * * *").unwrap();
        assert!(cron.matches(dt(1999, 12, 31, 23, 59)));
        assert!(cron.matches(dt(2026, 8, 7, 0, 0)));
        // And next is simply the following minute.
        assert_eq!(
            cron.next(dt(2026, 8, 7, 10, 30)).unwrap(),
            dt(2026, 8, 7, 10, 31)
        );
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(matches!(
            Cron::parse("* * * * *"),
            Err(CronError::FieldCount(5))
        ));
        assert!(matches!(
            Cron::parse("* * * * * * *"),
            Err(CronError::FieldCount(7))
        ));
    }

    #[test]
    fn rejects_embedded_newline() {
        assert!(matches!(
            Cron::parse("* * *\n* * *"),
            Err(CronError::NewlineSeparator)
        ));
    }

    #[test]
    fn rejects_out_of_range_minute_without_clamping() {
        assert!(matches!(
            Cron::parse("60 * * * * *"),
            Err(CronError::ValueOutOfRange { value: 60, .. })
        ));
    }

    #[test]
    fn rejects_inverted_range_in_pattern() {
        assert!(matches!(
            Cron::parse("10-5 * * * * *"),
            Err(CronError::RangeInverted { .. })
        ));
    }

    #[test]
    fn whitespace_runs_collapse_to_canonical_pattern() {
        let cron = Cron::parse("  30   4  1 1 *    * ").unwrap();
        assert_eq!(cron.pattern(), "30 4 1 1 * *");
        assert_eq!(cron.to_string(), "30 4 1 1 * *");
    }

    #[test]
    fn from_str_round_trips() {
        let cron: Cron = "*/15 * * * * *".parse().unwrap();
        assert_eq!(cron.pattern(), "*/15 * * * * *");
        assert!("*/0 * * * * *".parse::<Cron>().is_err());
    }

    #[test]
    fn quarter_hour_step_matches_exactly_four_minutes() {
        let cron = Cron::parse("*/15 * * * * *").unwrap();
        for minute in 0..60 {
            let expected = minute % 15 == 0;
            assert_eq!(
                cron.matches(dt(2026, 6, 10, 12, minute)),
                expected,
                "minute {minute}"
            );
        }
        assert_eq!(
            cron.next(dt(2026, 6, 10, 12, 7)).unwrap(),
            dt(2026, 6, 10, 12, 15)
        );
        assert_eq!(
            cron.next(dt(2026, 6, 10, 12, 45)).unwrap(),
            dt(2026, 6, 10, 13, 0)
        );
    }

    #[test]
    fn fixed_date_lands_on_next_applicable_year() {
        let cron = Cron::parse("30 4 1 1 * *").unwrap();
        // From mid-March the next January 1st is next year's.
        assert_eq!(
            cron.next(dt(2026, 3, 15, 10, 0)).unwrap(),
            dt(2027, 1, 1, 4, 30)
        );
        // From earlier the same year it is this year's.
        assert_eq!(
            cron.next(dt(2026, 1, 1, 2, 0)).unwrap(),
            dt(2026, 1, 1, 4, 30)
        );
        // From exactly the occurrence, strictly after means next year.
        assert_eq!(
            cron.next(dt(2026, 1, 1, 4, 30)).unwrap(),
            dt(2027, 1, 1, 4, 30)
        );
    }

    #[test]
    fn weekday_only_pattern_ignores_day_of_month() {
        // Midnight every Monday (day-of-week 0).
        let cron = Cron::parse("0 0 * * 0 *").unwrap();
        // 2026-08-03 is a Monday.
        assert!(cron.matches(dt(2026, 8, 3, 0, 0)));
        assert!(cron.matches(dt(2026, 8, 10, 0, 0)));
        assert!(!cron.matches(dt(2026, 8, 4, 0, 0)));
        assert_eq!(
            cron.next(dt(2026, 8, 4, 9, 0)).unwrap(),
            dt(2026, 8, 10, 0, 0)
        );
        // Several weeks in a row, across a month boundary.
        let mut t = dt(2026, 8, 20, 12, 0);
        for expected in [dt(2026, 8, 24, 0, 0), dt(2026, 8, 31, 0, 0), dt(2026, 9, 7, 0, 0)] {
            t = cron.next(t).unwrap();
            assert_eq!(t, expected);
        }
    }

    #[test]
    fn restricted_day_fields_combine_with_or() {
        // The 13th of any month, or any Friday (day-of-week 4).
        let cron = Cron::parse("0 0 13 * 4 *").unwrap();
        let mut t = dt(2026, 3, 1, 0, 0); // a Sunday
        let expected = [
            dt(2026, 3, 6, 0, 0),  // Friday
            dt(2026, 3, 13, 0, 0), // Friday the 13th
            dt(2026, 3, 20, 0, 0), // Friday
            dt(2026, 3, 27, 0, 0), // Friday
            dt(2026, 4, 3, 0, 0),  // Friday
            dt(2026, 4, 10, 0, 0), // Friday
            dt(2026, 4, 13, 0, 0), // a Monday, selected by day-of-month
        ];
        for want in expected {
            t = cron.next(t).unwrap();
            assert_eq!(t, want);
            assert!(cron.matches(t));
        }
    }

    #[test]
    fn unrestricted_sibling_does_not_veto() {
        // Day-of-month 15 with wildcard day-of-week: plain AND.
        let cron = Cron::parse("0 12 15 * * *").unwrap();
        assert_eq!(
            cron.next(dt(2026, 5, 20, 0, 0)).unwrap(),
            dt(2026, 6, 15, 12, 0)
        );
    }

    #[test]
    fn step_over_range_lands_on_last_multiple() {
        let cron = Cron::parse("10-40/10 * * * * *").unwrap();
        // From :36 the next multiple inside the range is :40, not the
        // next hour's :10.
        assert_eq!(
            cron.next(dt(2026, 6, 1, 9, 36)).unwrap(),
            dt(2026, 6, 1, 9, 40)
        );
        // Past the range the search wraps into the next hour.
        assert_eq!(
            cron.next(dt(2026, 6, 1, 9, 42)).unwrap(),
            dt(2026, 6, 1, 10, 10)
        );
        for minute in [10, 20, 30, 40] {
            assert!(cron.matches(dt(2026, 6, 1, 9, minute)));
        }
        for minute in [0, 15, 41, 50] {
            assert!(!cron.matches(dt(2026, 6, 1, 9, minute)));
        }
    }

    #[test]
    fn list_of_minutes_fires_in_order() {
        let cron = Cron::parse("5,20,50 * * * * *").unwrap();
        let mut t = dt(2026, 6, 1, 9, 0);
        for expected in [
            dt(2026, 6, 1, 9, 5),
            dt(2026, 6, 1, 9, 20),
            dt(2026, 6, 1, 9, 50),
            dt(2026, 6, 1, 10, 5),
        ] {
            t = cron.next(t).unwrap();
            assert_eq!(t, expected);
        }
    }

    #[test]
    fn hour_range_with_minute_step() {
        let cron = Cron::parse("*/30 9-17 * * * *").unwrap();
        assert_eq!(
            cron.next(dt(2026, 6, 1, 8, 10)).unwrap(),
            dt(2026, 6, 1, 9, 0)
        );
        assert_eq!(
            cron.next(dt(2026, 6, 1, 17, 30)).unwrap(),
            dt(2026, 6, 2, 9, 0)
        );
    }

    #[test]
    fn leap_day_is_found_in_the_next_leap_year() {
        let cron = Cron::parse("0 0 29 2 * *").unwrap();
        assert_eq!(
            cron.next(dt(2026, 3, 1, 0, 0)).unwrap(),
            dt(2028, 2, 29, 0, 0)
        );
        assert!(cron.matches(dt(2028, 2, 29, 0, 0)));
    }

    #[test]
    fn impossible_date_terminates_with_no_occurrence() {
        // February 31st never exists.
        let cron = Cron::parse("0 0 31 2 * *").unwrap();
        assert_eq!(cron.next(dt(2026, 1, 15, 0, 0)), None);
        // Neither does April 31st.
        let cron = Cron::parse("0 0 31 4 * *").unwrap();
        assert_eq!(cron.next(dt(2026, 1, 15, 0, 0)), None);
    }

    #[test]
    fn unsatisfiable_step_terminates_immediately() {
        // No month is divisible by 13.
        let cron = Cron::parse("0 0 1 */13 * *").unwrap();
        assert_eq!(cron.next(dt(2026, 1, 1, 0, 0)), None);
    }

    #[test]
    fn future_year_field_jumps_forward() {
        let cron = Cron::parse("0 0 1 1 * 2050").unwrap();
        assert_eq!(
            cron.next(dt(2026, 6, 1, 10, 0)).unwrap(),
            dt(2050, 1, 1, 0, 0)
        );
    }

    #[test]
    fn past_year_field_is_exhausted() {
        let cron = Cron::parse("0 0 1 1 * 2020").unwrap();
        assert_eq!(cron.next(dt(2026, 6, 1, 10, 0)), None);
    }

    #[test]
    fn next_is_strictly_increasing_and_self_consistent() {
        for pattern in [
            "* * * * * *",
            "*/15 * * * * *",
            "30 4 1 1 * *",
            "0 0 * * 0 *",
            "5,20,50 */6 * * * *",
            "0 12 1-7 * * *",
        ] {
            let cron = Cron::parse(pattern).unwrap();
            let mut t = dt(2026, 1, 10, 7, 23);
            for _ in 0..50 {
                let n = cron.next(t).unwrap();
                assert!(n > t, "{pattern}: {n} not after {t}");
                assert!(cron.matches(n), "{pattern}: {n} does not match");
                t = n;
            }
        }
    }

    #[test]
    fn occurrences_are_minute_aligned() {
        let cron = Cron::parse("* * * * * *").unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(10, 30, 45)
            .unwrap();
        let n = cron.next(after).unwrap();
        assert_eq!(n, dt(2026, 8, 7, 10, 31));
        assert!(n > after);
    }

    #[test]
    fn schedule_is_reusable_across_calls() {
        let cron = Cron::parse("0 6 * * * *").unwrap();
        let a = cron.next(dt(2026, 4, 1, 0, 0)).unwrap();
        let b = cron.next(dt(2026, 4, 1, 0, 0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, dt(2026, 4, 1, 6, 0));
    }
}
