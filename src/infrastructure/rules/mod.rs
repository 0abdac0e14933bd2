//! Rule set implementations

mod builtin;
mod json_rule_file;

pub use builtin::{BuiltinRules, DEFAULT_RULES_JSON};
pub use json_rule_file::{parse_rule_document, JsonRuleFile, RULE_SET_VERSION};
