use std::fmt::Debug;

use log::*;

use crate::{
    db_types::Order,
    helpers::MatcherChain,
    settlement_api::{
        errors::SettlementError,
        settlement_objects::{AttemptOutcome, CandidateOrder, ResolutionAttempt, ResolutionDiagnostics},
    },
    traits::OrderManagement,
};

const PAYMENT_ID_STRATEGY: &str = "payment_id";

/// Maps an inbound notification onto an internal order.
///
/// 1. The gateway payment id is looked up directly.
/// 2. The correlation string is run through the [`MatcherChain`]. If a matcher extracts an id, that order must exist;
///    a missing order ends the search.
///
/// When nothing resolves, the error carries every attempted strategy and a snapshot of recent unsettled orders.
pub struct OrderResolver<B> {
    db: B,
    chain: MatcherChain,
    candidate_limit: usize,
}

impl<B> Debug for OrderResolver<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderResolver({:?})", self.chain.names())
    }
}

impl<B> OrderResolver<B> {
    pub fn new(db: B, candidate_limit: usize) -> Self {
        Self { db, chain: MatcherChain::default(), candidate_limit }
    }

    pub fn with_chain(mut self, chain: MatcherChain) -> Self {
        self.chain = chain;
        self
    }
}

impl<B> OrderResolver<B>
where B: OrderManagement
{
    pub async fn resolve(&self, payment_id: Option<&str>, correlation: Option<&str>) -> Result<Order, SettlementError> {
        let mut attempts = Vec::new();
        match payment_id {
            Some(pid) => match self.db.fetch_order_by_payment_id(pid).await? {
                Some(order) => {
                    debug!("🔎️ Payment id {pid} resolved to order {}", order.id);
                    return Ok(order);
                },
                None => attempts.push(ResolutionAttempt::new(PAYMENT_ID_STRATEGY, AttemptOutcome::NoMatch)),
            },
            None => attempts.push(ResolutionAttempt::new(PAYMENT_ID_STRATEGY, AttemptOutcome::Skipped)),
        }

        match correlation {
            Some(s) => {
                let (id, matches) = self.chain.resolve(s);
                let last = matches.len().saturating_sub(1);
                for (i, m) in matches.iter().enumerate() {
                    // Only the final attempt can have matched
                    let outcome = match m.result {
                        Some(id) if i == last => AttemptOutcome::Matched(id),
                        _ => AttemptOutcome::NoMatch,
                    };
                    attempts.push(ResolutionAttempt::new(m.matcher, outcome));
                }
                if let Some(id) = id {
                    match self.db.fetch_order_by_id(id).await? {
                        Some(order) => {
                            debug!("🔎️ External id {s} resolved to order {id}");
                            return Ok(order);
                        },
                        None => {
                            if let Some(a) = attempts.last_mut() {
                                a.outcome = AttemptOutcome::OrderMissing(id);
                            }
                            warn!("🔎️ External id {s} refers to order {id}, which does not exist");
                        },
                    }
                }
            },
            None => {
                for name in self.chain.names() {
                    attempts.push(ResolutionAttempt::new(name, AttemptOutcome::Skipped));
                }
            },
        }

        let candidates = self.db.fetch_unsettled_orders(self.candidate_limit).await?;
        let diagnostics = ResolutionDiagnostics {
            payment_id: payment_id.map(String::from),
            correlation: correlation.map(String::from),
            attempts,
            candidates: candidates.iter().map(CandidateOrder::from).collect(),
        };
        error!("🔎️ {diagnostics}");
        Err(SettlementError::OrderNotResolved(Box::new(diagnostics)))
    }
}
