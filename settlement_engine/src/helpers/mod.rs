mod correlation;

pub use correlation::{
    BareNumericMatcher,
    CorrelationMatcher,
    MatchAttempt,
    MatcherChain,
    PrefixOnlyMatcher,
    PrefixSuffixMatcher,
    PrefixTimestampMatcher,
    WrappedInvoiceMatcher,
};
