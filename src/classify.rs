//! Keyword routing.
//!
//! Routing is a fixed, ordered rule table: the first rule with a keyword
//! occurring anywhere in the lowercased query decides the route. Text rules
//! come before structured rules, so "salary documents" goes to text search.

use crate::models::Route;

/// One routing rule: any of `keywords` as a substring selects `route`.
#[derive(Debug, Clone, Copy)]
pub struct RouteRule {
    pub route: Route,
    pub keywords: &'static [&'static str],
}

impl RouteRule {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

pub const DEFAULT_RULES: &[RouteRule] = &[
    RouteRule {
        route: Route::Text,
        keywords: &["document", "resume", "skill"],
    },
    RouteRule {
        route: Route::Structured,
        keywords: &["employee", "salary", "hired", "hiring"],
    },
];

#[derive(Debug, Clone)]
pub struct QueryClassifier {
    rules: &'static [RouteRule],
    fallback: Route,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES,
            fallback: Route::Hybrid,
        }
    }
}

impl QueryClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, query: &str) -> Route {
        let lowered = query.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.route)
            .unwrap_or(self.fallback)
    }
}
