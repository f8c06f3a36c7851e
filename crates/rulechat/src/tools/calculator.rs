use std::f64::consts::{E, PI};
use std::future::ready;

use rulechat_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Input of [`CalculatorTool`].
#[derive(Deserialize, JsonSchema)]
pub struct CalculatorInput {
    #[schemars(
        description = "Arithmetic expression to evaluate, e.g. `(1200 - 350) * 0.2`."
    )]
    expression: String,
}

/// A tool for evaluating arithmetic expressions.
pub struct CalculatorTool {
    parameter_schema: Value,
}

impl CalculatorTool {
    /// Creates a new calculator tool.
    #[inline]
    pub fn new() -> Self {
        CalculatorTool {
            parameter_schema: schema_for!(CalculatorInput).to_value(),
        }
    }
}

impl Default for CalculatorTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalculatorTool {
    type Input = CalculatorInput;

    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        r#"
Evaluates an arithmetic expression and returns the result.
Supports + - * / % and ^ (power), parentheses, the constants pi and e, and the
functions sqrt, abs, ln, log (base 10), exp, sin, cos, tan, floor, ceil, round."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        debug!("evaluating {:?}", input.expression);
        let result = evaluate(&input.expression)
            .map(format_number)
            .map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            });
        ready(result)
    }
}

/// Why an expression could not be evaluated.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvalError {
    /// A character that does not fit the grammar.
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    /// The expression stops in the middle.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A missing parenthesis.
    #[error("expected `{0}`")]
    Expected(char),
    /// A malformed number literal, such as `1.2.3`.
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    /// Neither a constant nor a known function.
    #[error("unknown name `{0}`")]
    UnknownName(String),
    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Overflow, or a function outside of its domain.
    #[error("the result is not a finite number")]
    NotFinite,
}

/// Evaluates `expression` to a finite number.
pub fn evaluate(expression: &str) -> Result<f64, EvalError> {
    let mut evaluator = Evaluator {
        src: expression,
        pos: 0,
    };
    let value = evaluator.expr()?;
    if evaluator.peek().is_some() {
        return Err(evaluator.unexpected());
    }
    if !value.is_finite() {
        return Err(EvalError::NotFinite);
    }
    Ok(value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn function(name: &str) -> Option<fn(f64) -> f64> {
    let f: fn(f64) -> f64 = match name {
        "sqrt" => f64::sqrt,
        "abs" => f64::abs,
        "ln" => f64::ln,
        "log" => f64::log10,
        "exp" => f64::exp,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "floor" => f64::floor,
        "ceil" => f64::ceil,
        "round" => f64::round,
        _ => return None,
    };
    Some(f)
}

/// Recursive descent over the expression, lowest precedence first:
/// `+ -`, then `* / %`, then unary signs, then `^` (right associative).
struct Evaluator<'a> {
    src: &'a str,
    pos: usize,
}

impl Evaluator<'_> {
    fn peek(&mut self) -> Option<u8> {
        let bytes = self.src.as_bytes();
        while bytes.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
        bytes.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), EvalError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(EvalError::Expected(char::from(byte)))
        }
    }

    fn unexpected(&self) -> EvalError {
        match self.src[self.pos..].chars().next() {
            Some(ch) => EvalError::UnexpectedChar(ch),
            None => EvalError::UnexpectedEnd,
        }
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        loop {
            if self.eat(b'+') {
                value += self.term()?;
            } else if self.eat(b'-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(b'*') {
                value *= self.unary()?;
            } else if self.eat(b'/') {
                value /= self.divisor()?;
            } else if self.eat(b'%') {
                value %= self.divisor()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn divisor(&mut self) -> Result<f64, EvalError> {
        let value = self.unary()?;
        if value == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, EvalError> {
        if self.eat(b'-') {
            Ok(-self.unary()?)
        } else if self.eat(b'+') {
            self.unary()
        } else {
            self.power()
        }
    }

    fn power(&mut self) -> Result<f64, EvalError> {
        let base = self.atom()?;
        if self.eat(b'^') {
            Ok(base.powf(self.unary()?))
        } else {
            Ok(base)
        }
    }

    fn atom(&mut self) -> Result<f64, EvalError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.expect(b')')?;
                Ok(value)
            }
            Some(byte) if byte.is_ascii_digit() || byte == b'.' => {
                self.number()
            }
            Some(byte) if byte.is_ascii_alphabetic() => self.name(),
            _ => Err(self.unexpected()),
        }
    }

    fn number(&mut self) -> Result<f64, EvalError> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        while bytes
            .get(self.pos)
            .is_some_and(|byte| byte.is_ascii_digit() || *byte == b'.')
        {
            self.pos += 1;
        }
        let literal = &self.src[start..self.pos];
        literal
            .parse()
            .map_err(|_| EvalError::InvalidNumber(literal.to_owned()))
    }

    fn name(&mut self) -> Result<f64, EvalError> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        while bytes
            .get(self.pos)
            .is_some_and(|byte| byte.is_ascii_alphanumeric() || *byte == b'_')
        {
            self.pos += 1;
        }
        let name = &self.src[start..self.pos];
        match name {
            "pi" => Ok(PI),
            "e" => Ok(E),
            _ => {
                let f = function(name)
                    .ok_or_else(|| EvalError::UnknownName(name.to_owned()))?;
                self.expect(b'(')?;
                let arg = self.expr()?;
                self.expect(b')')?;
                Ok(f(arg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rulechat_core::tool::ErrorKind;

    use super::*;

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), -4.0);
        assert_eq!(evaluate("2 ^ -1").unwrap(), 0.5);
        assert_eq!(evaluate("17 % 5").unwrap(), 2.0);
        assert_eq!(evaluate("--3").unwrap(), 3.0);
    }

    #[test]
    fn test_names() {
        assert_eq!(evaluate("sqrt(16) + abs(-2)").unwrap(), 6.0);
        assert!((evaluate("log(1000)").unwrap() - 3.0).abs() < 1e-12);
        assert_eq!(
            evaluate("round(2.5) + floor(1.9) + ceil(1.1)").unwrap(),
            6.0
        );
        assert!((evaluate("cos(pi)").unwrap() + 1.0).abs() < 1e-12);
        assert!((evaluate("ln(e)").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("5 % (2 - 2)"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("sqrt(-1)"), Err(EvalError::NotFinite));
        assert_eq!(evaluate("10 ^ 400"), Err(EvalError::NotFinite));
        assert_eq!(evaluate("1 +"), Err(EvalError::UnexpectedEnd));
        assert_eq!(evaluate("(1 + 2"), Err(EvalError::Expected(')')));
        assert_eq!(evaluate("2 $ 3"), Err(EvalError::UnexpectedChar('$')));
        assert_eq!(
            evaluate("1.2.3"),
            Err(EvalError::InvalidNumber("1.2.3".into()))
        );
        assert_eq!(
            evaluate("foo(1)"),
            Err(EvalError::UnknownName("foo".into()))
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(84.0), "84");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.25), "0.25");
    }

    #[tokio::test]
    async fn test_tool() {
        let tool = CalculatorTool::new();
        let properties = &tool.parameter_schema()["properties"];
        assert!(properties["expression"].is_object());

        let output = tool
            .execute(CalculatorInput {
                expression: "12 * 7".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(output, "84");

        let err = tool
            .execute(CalculatorInput {
                expression: "1 / 0".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert_eq!(err.reason(), "division by zero");
    }
}
