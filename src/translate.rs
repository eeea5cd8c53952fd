//! Natural-language to SQL pattern matching.
//!
//! [`PATTERNS`] is checked in order and the first match wins, so more
//! specific phrasings must stay ahead of looser ones. Queries matching
//! nothing fall back to a bounded listing of `employees`.

use std::sync::OnceLock;

use chrono::{Datelike, Local};
use regex::Regex;
use serde::Serialize;

/// Row count returned when no pattern matches.
pub const DEFAULT_LISTING_LIMIT: i64 = 10;

/// N for "top N highest paid" when the query gives no number.
pub const DEFAULT_TOP_N: i64 = 5;

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Int(i64),
    Text(String),
}

/// Which rule produced a [`StructuredQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    CountAll,
    AverageByCategory,
    TopN,
    HiredThisYear,
    DefaultListing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredQuery {
    pub kind: PatternKind,
    pub sql: &'static str,
    pub params: Vec<SqlParam>,
}

const COUNT_ALL_SQL: &str = "SELECT COUNT(*) AS total FROM employees";
const AVERAGE_BY_DEPARTMENT_SQL: &str = "SELECT d.dept_name, AVG(e.annual_salary) AS avg_salary \
     FROM employees e JOIN departments d ON e.dept_id = d.dept_id GROUP BY d.dept_name";
const TOP_N_SQL: &str = "SELECT * FROM employees ORDER BY annual_salary DESC LIMIT ?";
const HIRED_IN_YEAR_SQL: &str = "SELECT * FROM employees WHERE substr(join_date, 1, 4) = ?";
const DEFAULT_LISTING_SQL: &str = "SELECT * FROM employees LIMIT ?";

/// When a lowercased query matches a pattern.
#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// The phrase occurs as a substring.
    Phrase(&'static str),
    /// Every phrase occurs as a substring.
    AllPhrases(&'static [&'static str]),
}

impl Trigger {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Trigger::Phrase(p) => lowered.contains(p),
            Trigger::AllPhrases(ps) => ps.iter().all(|p| lowered.contains(p)),
        }
    }
}

pub struct Pattern {
    pub kind: PatternKind,
    pub trigger: Trigger,
}

pub const PATTERNS: &[Pattern] = &[
    Pattern {
        kind: PatternKind::CountAll,
        trigger: Trigger::Phrase("how many employees"),
    },
    Pattern {
        kind: PatternKind::AverageByCategory,
        trigger: Trigger::Phrase("average salary by department"),
    },
    Pattern {
        kind: PatternKind::TopN,
        trigger: Trigger::AllPhrases(&["top", "highest paid"]),
    },
    Pattern {
        kind: PatternKind::HiredThisYear,
        trigger: Trigger::Phrase("hired this year"),
    },
];

fn top_n_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"top (\d+)").expect("static regex"))
}

#[derive(Debug, Clone, Default)]
pub struct QueryTranslator;

impl QueryTranslator {
    pub fn new() -> Self {
        Self
    }

    /// The query for the first matching pattern, if any.
    pub fn match_pattern(&self, query: &str) -> Option<StructuredQuery> {
        self.match_pattern_in_year(query, Local::now().year())
    }

    /// Like [`match_pattern`](Self::match_pattern), with "this year" fixed.
    pub fn match_pattern_in_year(&self, query: &str, year: i32) -> Option<StructuredQuery> {
        let lowered = query.to_lowercase();
        let pattern = PATTERNS.iter().find(|p| p.trigger.matches(&lowered))?;
        Some(build(pattern.kind, &lowered, year))
    }

    /// The matched query, or the default listing.
    pub fn translate(&self, query: &str) -> StructuredQuery {
        self.match_pattern(query)
            .unwrap_or_else(StructuredQuery::default_listing)
    }
}

impl StructuredQuery {
    pub fn default_listing() -> Self {
        Self {
            kind: PatternKind::DefaultListing,
            sql: DEFAULT_LISTING_SQL,
            params: vec![SqlParam::Int(DEFAULT_LISTING_LIMIT)],
        }
    }
}

fn build(kind: PatternKind, lowered: &str, year: i32) -> StructuredQuery {
    let (sql, params) = match kind {
        PatternKind::CountAll => (COUNT_ALL_SQL, Vec::new()),
        PatternKind::AverageByCategory => (AVERAGE_BY_DEPARTMENT_SQL, Vec::new()),
        PatternKind::TopN => (TOP_N_SQL, vec![SqlParam::Int(extract_top_n(lowered))]),
        PatternKind::HiredThisYear => (HIRED_IN_YEAR_SQL, vec![SqlParam::Text(year.to_string())]),
        PatternKind::DefaultListing => return StructuredQuery::default_listing(),
    };
    StructuredQuery { kind, sql, params }
}

fn extract_top_n(lowered: &str) -> i64 {
    top_n_regex()
        .captures(lowered)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_TOP_N)
}
