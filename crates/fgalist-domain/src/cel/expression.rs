//! CEL expression parsing and evaluation

use std::panic;

use cel_interpreter::{Program, Value};

use super::context::CelContext;
use super::{CelError, CelResult};

/// A compiled CEL (Common Expression Language) expression.
pub struct CelExpression {
    source: String,
    program: Program,
}

impl std::fmt::Debug for CelExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CelExpression")
            .field("source", &self.source)
            .finish()
    }
}

impl CelExpression {
    /// Parses a CEL expression.
    ///
    /// The underlying parser may panic on some malformed input; the panic is
    /// caught and reported as a `ParseError`.
    pub fn parse(expression: &str) -> CelResult<Self> {
        let compiled =
            panic::catch_unwind(panic::AssertUnwindSafe(|| Program::compile(expression)));

        let program = match compiled {
            Ok(Ok(program)) => program,
            Ok(Err(e)) => {
                return Err(CelError::ParseError {
                    expression: expression.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(CelError::ParseError {
                    expression: expression.to_string(),
                    message: "parser failed internally on this expression".to_string(),
                })
            }
        };

        Ok(Self {
            source: expression.to_string(),
            program,
        })
    }

    /// Returns the original source expression
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression against a context.
    pub fn evaluate(&self, context: &CelContext) -> CelResult<Value> {
        self.program
            .execute(&context.to_cel_context())
            .map_err(|e| CelError::EvaluationError {
                expression: self.source.clone(),
                message: e.to_string(),
            })
    }

    /// Evaluates the expression, requiring a boolean result.
    pub fn evaluate_bool(&self, context: &CelContext) -> CelResult<bool> {
        match self.evaluate(context)? {
            Value::Bool(b) => Ok(b),
            other => Err(CelError::TypeError {
                expected: "bool".to_string(),
                actual: format!("{other:?}"),
            }),
        }
    }
}
