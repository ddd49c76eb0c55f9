//! `tempo-cron` — six-field cron pattern parsing and evaluation.
//!
//! # Overview
//!
//! A pattern holds six whitespace-separated fields in the order minute,
//! hour, day-of-month, month, day-of-week, year. Each field is a `*`, a
//! literal, an `a-b` range, an `x/n` step (the base may itself be a
//! literal, range or `*`), or a comma list combining any of those.
//! [`Cron::next`] computes the first instant strictly after a given one at
//! which every field matches, carrying overflow from minutes up to years
//! like an odometer over the irregular calendar.
//!
//! # Fields
//!
//! | Field        | Range            |
//! |--------------|------------------|
//! | minute       | 0–59             |
//! | hour         | 0–23             |
//! | day-of-month | 1–31             |
//! | month        | 1–12             |
//! | day-of-week  | 0–6 (0 = Monday) |
//! | year         | 1970–2999        |
//!
//! Day-of-month and day-of-week are alternative day selectors: when both
//! are restricted, a date qualifies if either one matches.
//!
//! ```
//! use chrono::NaiveDate;
//! use tempo_cron::Cron;
//!
//! let cron: Cron = "*/15 9-17 * * * *".parse().unwrap();
//! let after = NaiveDate::from_ymd_opt(2026, 5, 4)
//!     .unwrap()
//!     .and_hms_opt(9, 20, 0)
//!     .unwrap();
//! let hit = cron.next(after).unwrap();
//! assert_eq!(
//!     hit,
//!     NaiveDate::from_ymd_opt(2026, 5, 4)
//!         .unwrap()
//!         .and_hms_opt(9, 30, 0)
//!         .unwrap()
//! );
//! ```

pub mod error;
pub mod field;
pub mod node;
pub mod schedule;

pub use error::{CronError, Result};
pub use field::{CronField, FieldKind};
pub use node::CronNode;
pub use schedule::Cron;
