//! Rule set compiled into the binary

use super::json_rule_file::parse_rule_document;
use crate::core::RuleSetError;
use crate::domain::entities::SignatureRule;
use crate::domain::repositories::RuleSetSource;

pub const DEFAULT_RULES_JSON: &str = include_str!("../../../rules/default.json");

/// The default rules, used when no rule file is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRules;

impl RuleSetSource for BuiltinRules {
    fn load(&self) -> Result<Vec<SignatureRule>, RuleSetError> {
        parse_rule_document(DEFAULT_RULES_JSON)
    }

    fn describe(&self) -> String {
        "builtin".to_string()
    }
}
