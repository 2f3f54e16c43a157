//! Correlation string matchers.
//!
//! Over time, the storefront has generated payment correlation strings in several formats. Each known format has a
//! matcher that extracts the internal order id from the string, and [`MatcherChain`] tries them in order. The first
//! match wins.
//!
//! | Matcher            | Example                          |
//! |--------------------|----------------------------------|
//! | `prefix_timestamp` | `ORDER_42_1718000000000`         |
//! | `prefix_only`      | `ORDER_42`                       |
//! | `prefix_suffix`    | `TICKET_42_retry-2`              |
//! | `wrapped_invoice`  | `invoice_ORDER_42_1718000000000` |
//! | `bare_numeric`     | `42`                             |
use std::fmt::Debug;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::db_types::OrderId;

static PREFIX_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*_(\d+)_(\d{10,13})$").expect("valid regex"));
static PREFIX_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*_(\d+)$").expect("valid regex"));
static PREFIX_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*_(\d+)_.+$").expect("valid regex"));
static WRAPPED_INVOICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^invoice_(.+)$").expect("valid regex"));
static BARE_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)$").expect("valid regex"));

/// A pure function from a correlation string to an order id.
pub trait CorrelationMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, correlation: &str) -> Option<OrderId>;
}

impl Debug for dyn CorrelationMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn capture_id(re: &Regex, s: &str) -> Option<OrderId> {
    re.captures(s.trim()).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<i64>().ok()).map(OrderId::from)
}

/// `prefix_{orderId}_{timestamp}`, where the timestamp is a unix timestamp in seconds or milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixTimestampMatcher;

impl CorrelationMatcher for PrefixTimestampMatcher {
    fn name(&self) -> &'static str {
        "prefix_timestamp"
    }

    fn extract(&self, correlation: &str) -> Option<OrderId> {
        capture_id(&PREFIX_TIMESTAMP, correlation)
    }
}

/// `prefix_{orderId}`
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixOnlyMatcher;

impl CorrelationMatcher for PrefixOnlyMatcher {
    fn name(&self) -> &'static str {
        "prefix_only"
    }

    fn extract(&self, correlation: &str) -> Option<OrderId> {
        capture_id(&PREFIX_ONLY, correlation)
    }
}

/// `prefix_{orderId}_{anything}`
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixSuffixMatcher;

impl CorrelationMatcher for PrefixSuffixMatcher {
    fn name(&self) -> &'static str {
        "prefix_suffix"
    }

    fn extract(&self, correlation: &str) -> Option<OrderId> {
        capture_id(&PREFIX_SUFFIX, correlation)
    }
}

/// `{orderId}`
#[derive(Debug, Clone, Copy, Default)]
pub struct BareNumericMatcher;

impl CorrelationMatcher for BareNumericMatcher {
    fn name(&self) -> &'static str {
        "bare_numeric"
    }

    fn extract(&self, correlation: &str) -> Option<OrderId> {
        capture_id(&BARE_NUMERIC, correlation)
    }
}

/// `invoice_{innerId}`. The inner id is handed to the wrapped matchers, so `invoice_ORDER_42` and `invoice_42` both
/// resolve to order 42.
pub struct WrappedInvoiceMatcher {
    inner: Vec<Box<dyn CorrelationMatcher>>,
}

impl WrappedInvoiceMatcher {
    pub fn new(inner: Vec<Box<dyn CorrelationMatcher>>) -> Self {
        Self { inner }
    }
}

impl Default for WrappedInvoiceMatcher {
    fn default() -> Self {
        Self::new(vec![
            Box::new(PrefixTimestampMatcher),
            Box::new(PrefixOnlyMatcher),
            Box::new(PrefixSuffixMatcher),
            Box::new(BareNumericMatcher),
        ])
    }
}

impl CorrelationMatcher for WrappedInvoiceMatcher {
    fn name(&self) -> &'static str {
        "wrapped_invoice"
    }

    fn extract(&self, correlation: &str) -> Option<OrderId> {
        let inner = WRAPPED_INVOICE.captures(correlation.trim()).and_then(|c| c.get(1))?.as_str();
        self.inner.iter().find_map(|m| m.extract(inner))
    }
}

/// The outcome of trying a single matcher against a correlation string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchAttempt {
    pub matcher: &'static str,
    pub result: Option<OrderId>,
}

/// An ordered list of matchers. The first matcher to return an id wins.
pub struct MatcherChain {
    matchers: Vec<Box<dyn CorrelationMatcher>>,
}

impl Default for MatcherChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(PrefixTimestampMatcher),
            Box::new(PrefixOnlyMatcher),
            Box::new(PrefixSuffixMatcher),
            Box::new(WrappedInvoiceMatcher::default()),
            Box::new(BareNumericMatcher),
        ])
    }
}

impl MatcherChain {
    pub fn new(matchers: Vec<Box<dyn CorrelationMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// Runs the chain, stopping at the first match. Every matcher that was tried is recorded in the returned attempts.
    pub fn resolve(&self, correlation: &str) -> (Option<OrderId>, Vec<MatchAttempt>) {
        let mut attempts = Vec::with_capacity(self.matchers.len());
        for matcher in &self.matchers {
            let result = matcher.extract(correlation);
            attempts.push(MatchAttempt { matcher: matcher.name(), result });
            if result.is_some() {
                return (result, attempts);
            }
        }
        (None, attempts)
    }
}
