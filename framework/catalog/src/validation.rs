use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Side effects a session must have left in the target system once all of its steps ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcomes {
    #[serde(default)]
    pub data_validation: Vec<ValidationRule>,
}

impl ExpectedOutcomes {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn data(rules: Vec<ValidationRule>) -> Self {
        Self {
            data_validation: rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data_validation.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    Exists,
    Equals,
    Contains,
    GreaterThan,
    LessThan,
}

impl RuleCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
        }
    }
}

impl Display for RuleCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition on one field of the rows a session wrote to a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub table: String,
    pub field: String,
    pub condition: RuleCondition,
    /// Operand of every condition except [RuleCondition::Exists].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ValidationRule {
    pub fn exists(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(table, field, RuleCondition::Exists, None)
    }

    pub fn equals(
        table: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(table, field, RuleCondition::Equals, Some(value.into()))
    }

    pub fn contains(
        table: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(table, field, RuleCondition::Contains, Some(value.into()))
    }

    pub fn greater_than(table: impl Into<String>, field: impl Into<String>, value: f64) -> Self {
        Self::new(table, field, RuleCondition::GreaterThan, Some(value.into()))
    }

    pub fn less_than(table: impl Into<String>, field: impl Into<String>, value: f64) -> Self {
        Self::new(table, field, RuleCondition::LessThan, Some(value.into()))
    }

    fn new(
        table: impl Into<String>,
        field: impl Into<String>,
        condition: RuleCondition,
        value: Option<Value>,
    ) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            condition,
            value,
        }
    }

    /// Check the rule against the values `field` holds in the session's rows.
    ///
    /// The rule holds when at least one non-null value satisfies it. The error is a message fit
    /// for a test error.
    pub fn check<'a>(&self, values: impl IntoIterator<Item = &'a Value>) -> Result<(), String> {
        let mut values = values.into_iter().filter(|v| !v.is_null()).peekable();

        if self.condition == RuleCondition::Exists {
            return if values.peek().is_some() {
                Ok(())
            } else {
                Err(format!("expected {}.{} to exist", self.table, self.field))
            };
        }

        let Some(expected) = &self.value else {
            return Err(format!(
                "rule {} on {}.{} has no value to compare with",
                self.condition, self.table, self.field
            ));
        };

        let holds = |actual: &Value| match self.condition {
            RuleCondition::Exists => true,
            RuleCondition::Equals => actual == expected,
            RuleCondition::Contains => match (actual, expected) {
                (Value::String(actual), Value::String(expected)) => {
                    actual.contains(expected.as_str())
                }
                (Value::Array(items), expected) => items.contains(expected),
                _ => false,
            },
            RuleCondition::GreaterThan => compare(actual, expected, |a, e| a > e),
            RuleCondition::LessThan => compare(actual, expected, |a, e| a < e),
        };

        if values.any(holds) {
            Ok(())
        } else {
            Err(format!(
                "expected {}.{} to satisfy {} {expected}",
                self.table, self.field, self.condition
            ))
        }
    }
}

fn compare(actual: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(actual), Some(expected)) => op(actual, expected),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn exists_ignores_nulls() {
        let rule = ValidationRule::exists("orders", "id");
        assert!(rule.check(&[json!(null), json!("test_e2e_order_1")]).is_ok());
        assert_eq!(
            Err("expected orders.id to exist".to_string()),
            rule.check(&[json!(null)])
        );
    }

    #[test]
    fn conditions_compare_with_the_value() {
        let rows = [json!("pending"), json!("completed")];
        assert!(ValidationRule::equals("orders", "status", "completed")
            .check(&rows)
            .is_ok());
        assert!(ValidationRule::equals("orders", "status", "refunded")
            .check(&rows)
            .is_err());
        assert!(ValidationRule::contains("orders", "status", "plet")
            .check(&rows)
            .is_ok());
        assert!(ValidationRule::contains("chat_sessions", "tags", "vip")
            .check(&[json!(["new", "vip"])])
            .is_ok());

        let scores = [json!(3), json!(7.5)];
        assert!(ValidationRule::greater_than("diagnostic_audits", "urgency_score", 7.0)
            .check(&scores)
            .is_ok());
        assert!(ValidationRule::less_than("diagnostic_audits", "urgency_score", 3.0)
            .check(&scores)
            .is_err());
    }

    #[test]
    fn rule_without_a_value_fails() {
        let mut rule = ValidationRule::equals("orders", "status", "completed");
        rule.value = None;
        assert!(rule.check(&[json!("completed")]).is_err());
    }

    #[test]
    fn deserializes_the_rule_shape() {
        let rule: ValidationRule = serde_json::from_str(
            r#"{"table":"chat_sessions","field":"is_escalated","condition":"equals","value":true}"#,
        )
        .unwrap();
        assert_eq!(ValidationRule::equals("chat_sessions", "is_escalated", true), rule);
    }
}
