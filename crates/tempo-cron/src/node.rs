//! The matching primitives a cron field is built from.
//!
//! A field token parses into a tree of these nodes: literals and wildcards
//! at the leaves, ranges, steps and lists above them. Each node answers two
//! questions about a single numeric component (a minute, an hour, a year):
//! does a value satisfy the rule, and how far ahead is the next value that
//! would.

/// One parsed rule inside a cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronNode {
    /// A literal value: `30`.
    Value(i32),
    /// The wildcard `*`, matching every value.
    Any,
    /// An inclusive range: `10-15`.
    Range { begin: i32, end: i32 },
    /// A step over a base rule: `*/5`, `10-40/10`.
    Step { base: Box<CronNode>, freq: i32 },
    /// A comma-separated list of alternatives: `1,5,20-25`.
    List(Vec<CronNode>),
}

impl CronNode {
    /// Whether `value` satisfies this rule.
    pub fn matches(&self, value: i32) -> bool {
        match self {
            CronNode::Value(v) => value == *v,
            CronNode::Any => true,
            CronNode::Range { begin, end } => *begin <= value && value <= *end,
            CronNode::Step { base, freq } => base.matches(value) && value % freq == 0,
            CronNode::List(nodes) => nodes.iter().any(|n| n.matches(value)),
        }
    }

    /// Signed offset from `value` to the rule's next target.
    ///
    /// Positive means "advance this many units"; zero means "already
    /// satisfied". A negative result means the target lies behind `value`
    /// and the caller has to wrap into the next cycle. A range reports 1
    /// while `value` sits inside it: one step ahead, never "stay put".
    /// `max` is the owning field's upper bound; lists use it to skip
    /// children whose target would point one past the end of the cycle.
    pub fn advance(&self, value: i32, max: i32) -> i32 {
        match self {
            CronNode::Value(v) => v - value,
            CronNode::Any => 0,
            CronNode::Range { begin, end } => {
                if *begin <= value && value <= *end {
                    1
                } else {
                    begin - value
                }
            }
            CronNode::Step { base, freq } => {
                let base_advance = base.advance(value, max);
                if base_advance == 1 {
                    // Inside the base's territory: snap to the next multiple.
                    freq - value % freq
                } else {
                    base_advance
                }
            }
            CronNode::List(nodes) => nodes
                .iter()
                .map(|n| n.advance(value, max))
                .find(|&a| a > 0 && a != max + 1)
                .unwrap_or_else(|| nodes[0].advance(value, max)),
        }
    }

    /// Whether any value in `[min, max]` satisfies the rule.
    ///
    /// A syntactically valid rule can still be unsatisfiable: `*/13` in the
    /// month field has no multiple inside 1–12.
    pub fn is_satisfiable(&self, min: i32, max: i32) -> bool {
        (min..=max).any(|v| self.matches(v))
    }
}
