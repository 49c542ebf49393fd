//! CEL (Common Expression Language) condition evaluation.
//!
//! Conditional tuples reference a named condition in the authorization model.
//! While listing users, each conditional tuple is kept only if its condition
//! evaluates to true against the request context merged with the values
//! stored on the tuple.
//!
//! ```text
//! condition in_region(region: string, allowed: list<string>) {
//!     region in allowed
//! }
//!
//! document:budget#viewer@user:alice [in_region, {allowed: ["eu"]}]
//! ListUsers(document:budget, viewer, context: {region: "eu"})  -> user:alice
//! ```

mod cache;
mod context;
mod error;
mod evaluator;
mod expression;

pub use cache::CelExpressionCache;
pub use context::{CelContext, CelValue};
pub use error::{CelError, ConditionError};
pub use evaluator::{CelConditionEvaluator, ConditionEvaluator};
pub use expression::CelExpression;

/// Result type for CEL operations
pub type CelResult<T> = Result<T, CelError>;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use cel_interpreter::Value;
    use serde_json::json;

    use super::*;
    use crate::model::{Condition, ConditionParameter, TupleKey};

    // =========================================================================
    // Section 1: Expression parsing
    // =========================================================================

    #[test]
    fn test_can_parse_common_condition_shapes() {
        let expressions = [
            "a == b",
            "a + b > c",
            "a && !b || c",
            "s.startsWith(\"prefix\")",
            "x in [1, 2, 3]",
            "now < expires_at",
        ];

        for source in expressions {
            let result = CelExpression::parse(source);
            assert!(result.is_ok(), "should parse '{}': {:?}", source, result.err());
            assert_eq!(result.unwrap().source(), source);
        }
    }

    #[test]
    fn test_parser_rejects_invalid_syntax() {
        for source in ["a ==", "(a && b", "&& a"] {
            assert!(
                matches!(CelExpression::parse(source), Err(CelError::ParseError { .. })),
                "should reject '{source}'"
            );
        }
    }

    // =========================================================================
    // Section 2: Expression evaluation
    // =========================================================================

    #[test]
    fn test_evaluate_with_bound_variables() {
        let expr = CelExpression::parse("x > 5 && s == \"hello\"").unwrap();
        let mut ctx = CelContext::new();
        ctx.set_int("x", 10);
        ctx.set_string("s", "hello");

        assert!(expr.evaluate_bool(&ctx).unwrap());
    }

    #[test]
    fn test_missing_variable_is_an_evaluation_error() {
        let expr = CelExpression::parse("missing_var == true").unwrap();
        let result = expr.evaluate(&CelContext::new());
        assert!(matches!(result, Err(CelError::EvaluationError { .. })));
    }

    #[test]
    fn test_non_boolean_result_is_a_type_error() {
        let expr = CelExpression::parse("1 + 2").unwrap();
        assert!(matches!(expr.evaluate(&CelContext::new()), Ok(Value::Int(3))));
        assert!(matches!(
            expr.evaluate_bool(&CelContext::new()),
            Err(CelError::TypeError { .. })
        ));
    }

    #[test]
    fn test_timestamp_variables_compare() {
        let expr = CelExpression::parse("now < expires_at").unwrap();
        let mut ctx = CelContext::new();
        ctx.set_timestamp("now", "2024-01-15T10:00:00Z");
        ctx.set_timestamp("expires_at", "2024-12-31T23:59:59Z");

        assert!(expr.evaluate_bool(&ctx).unwrap());
    }

    #[test]
    fn test_json_values_map_to_cel_values() {
        assert_eq!(CelValue::from_json(&json!(3), None), CelValue::Int(3));
        assert_eq!(CelValue::from_json(&json!(3), Some("double")), CelValue::Float(3.0));
        assert_eq!(
            CelValue::from_json(&json!("2024-01-01T00:00:00Z"), Some("timestamp")),
            CelValue::Timestamp("2024-01-01T00:00:00Z".to_string())
        );
        assert_eq!(
            CelValue::from_json(&json!(["a"]), None),
            CelValue::List(vec![CelValue::String("a".to_string())])
        );
    }

    // =========================================================================
    // Section 3: Condition evaluator
    // =========================================================================

    fn in_region() -> Condition {
        Condition::new(
            "in_region",
            "region in allowed",
            vec![
                ConditionParameter::new("region", "string"),
                ConditionParameter::new("allowed", "list<string>"),
            ],
        )
    }

    fn conditional_tuple(allowed: serde_json::Value) -> TupleKey {
        TupleKey::new("document:budget", "viewer", "user:alice").with_condition(
            "in_region",
            HashMap::from([("allowed".to_string(), allowed)]),
        )
    }

    fn request_context(region: &str) -> HashMap<String, serde_json::Value> {
        HashMap::from([("region".to_string(), json!(region))])
    }

    #[test]
    fn test_condition_merges_request_and_tuple_context() {
        let evaluator = CelConditionEvaluator::new();
        let tuple = conditional_tuple(json!(["eu", "us"]));

        assert!(evaluator
            .evaluate(&tuple, &in_region(), &request_context("eu"))
            .unwrap());
        assert!(!evaluator
            .evaluate(&tuple, &in_region(), &request_context("apac"))
            .unwrap());
    }

    #[test]
    fn test_tuple_context_overrides_request_context() {
        let evaluator = CelConditionEvaluator::new();
        let tuple = TupleKey::new("document:budget", "viewer", "user:alice").with_condition(
            "in_region",
            HashMap::from([
                ("allowed".to_string(), json!(["eu"])),
                ("region".to_string(), json!("eu")),
            ]),
        );

        assert!(evaluator
            .evaluate(&tuple, &in_region(), &request_context("apac"))
            .unwrap());
    }

    #[test]
    fn test_missing_parameters_fail_recoverably() {
        let evaluator = CelConditionEvaluator::new();
        let tuple = conditional_tuple(json!(["eu"]));

        let err = evaluator
            .evaluate(&tuple, &in_region(), &HashMap::new())
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("missing context parameters 'region'"));
    }

    #[test]
    fn test_bad_expression_fails_fatally() {
        let evaluator = CelConditionEvaluator::new();
        let broken = Condition::new("broken", "region ==", vec![]);
        let tuple = conditional_tuple(json!([]));

        let err = evaluator
            .evaluate(&tuple, &broken, &request_context("eu"))
            .unwrap_err();
        assert!(matches!(err, ConditionError::Compile { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_compiled_expressions_are_cached() {
        let evaluator = CelConditionEvaluator::new();
        let tuple = conditional_tuple(json!(["eu"]));
        for region in ["eu", "us", "apac"] {
            let _ = evaluator.evaluate(&tuple, &in_region(), &request_context(region));
        }
        assert_eq!(evaluator.cache().len(), 1);

        evaluator.cache().invalidate_all();
        assert!(evaluator.cache().is_empty());
    }
}
