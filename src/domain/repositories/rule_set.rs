//! Signature rule set port

use crate::core::RuleSetError;
use crate::domain::entities::SignatureRule;

/// Source of signature rules
///
/// Implementations hand back parsed rules in declared order; validation
/// of ids and patterns happens when the rules are compiled.
pub trait RuleSetSource: Send + Sync {
    fn load(&self) -> Result<Vec<SignatureRule>, RuleSetError>;

    /// Human-readable origin, used in logs
    fn describe(&self) -> String;
}
