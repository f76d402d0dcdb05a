//! Direct calculation: plain arithmetic and a table of standard formulas.

use async_trait::async_trait;

use super::{AdapterError, SourceAdapter};
use crate::resolve::types::{Answer, Query, Source};

const ARITHMETIC_CONFIDENCE: f64 = 0.99;
const FORMULA_CONFIDENCE: f64 = 0.9;

const PREFIXES: &[&str] = &["what is", "what's", "calculate", "compute", "evaluate"];

/// (trigger phrases, formula text)
const FORMULAS: &[(&[&str], &str)] = &[
    (
        &["area of circle", "area of a circle"],
        "**Formula:** A = πr²\n\n**Where:** A = area, r = radius, π ≈ 3.14159",
    ),
    (
        &["area of rectangle", "area of a rectangle"],
        "**Formula:** A = length × width\n\n**Where:** A = area",
    ),
    (
        &["area of triangle", "area of a triangle"],
        "**Formula:** A = (1/2) × base × height\n\n**Where:** A = area",
    ),
    (
        &["volume of sphere", "volume of a sphere"],
        "**Formula:** V = (4/3)πr³\n\n**Where:** V = volume, r = radius",
    ),
    (
        &["volume of cube", "volume of a cube"],
        "**Formula:** V = side³\n\n**Where:** V = volume",
    ),
    (
        &["volume of cylinder", "volume of a cylinder"],
        "**Formula:** V = πr²h\n\n**Where:** V = volume, r = radius, h = height",
    ),
    (
        &["circumference of circle", "circumference of a circle"],
        "**Formula:** C = 2πr\n\n**Where:** C = circumference, r = radius",
    ),
    (
        &["quadratic formula"],
        "**Formula:** x = (-b ± √(b²-4ac)) / 2a\n\n**For equation:** ax² + bx + c = 0",
    ),
    (
        &["distance formula"],
        "**Formula:** d = √[(x₂-x₁)² + (y₂-y₁)²]\n\n**Between points:** (x₁,y₁) and (x₂,y₂)",
    ),
    (
        &["slope formula"],
        "**Formula:** m = (y₂-y₁)/(x₂-x₁)\n\n**Between points:** (x₁,y₁) and (x₂,y₂)",
    ),
    (
        &["pythagorean theorem", "pythagoras theorem"],
        "**Formula:** a² + b² = c²\n\n**Where:** c = hypotenuse, a & b = other sides",
    ),
];

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("not an arithmetic expression: {0}")]
    Syntax(String),
    #[error("division by zero")]
    DivisionByZero,
}

pub struct FormulaAdapter;

#[async_trait]
impl SourceAdapter for FormulaAdapter {
    fn source(&self) -> Source {
        Source::Formula
    }

    async fn attempt(&self, query: &Query) -> Result<Answer, AdapterError> {
        let normalized = query.normalized();

        if let Some(expr) = arithmetic_expression(&normalized) {
            return Ok(match evaluate(&expr) {
                Ok(value) => {
                    let shown = format_number(value);
                    Answer::hit(
                        Source::Formula,
                        format!("**Answer:** {}\n\n**Calculation:** {} = {}", shown, expr.trim(), shown),
                        ARITHMETIC_CONFIDENCE,
                    )
                }
                Err(_) => Answer::miss(Source::Formula),
            });
        }

        Ok(lookup_formula(&normalized)
            .map(|formula| Answer::hit(Source::Formula, formula, FORMULA_CONFIDENCE))
            .unwrap_or_else(|| Answer::miss(Source::Formula)))
    }
}

/// The arithmetic part of a question, if the question is nothing but arithmetic.
pub fn arithmetic_expression(normalized: &str) -> Option<String> {
    let mut rest = normalized.trim();
    for prefix in PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped.trim_start();
            break;
        }
    }
    let rest = rest.trim_end_matches(|c: char| c == '=' || c.is_whitespace());

    let expr = rest
        .replace("squared", "^2")
        .replace("cubed", "^3")
        .replace('×', "*")
        .replace('÷', "/");

    let allowed = |c: char| c.is_ascii_digit() || c.is_whitespace() || "+-*/^().²³".contains(c);
    let has_digit = expr.chars().any(|c| c.is_ascii_digit());
    let has_operator = expr.chars().any(|c| "+-*/^²³".contains(c));
    (has_digit && has_operator && expr.chars().all(allowed)).then_some(expr)
}

/// A standard formula, for questions that ask about one without numbers.
fn lookup_formula(normalized: &str) -> Option<&'static str> {
    if normalized.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    FORMULAS
        .iter()
        .find(|(triggers, _)| triggers.iter().any(|t| normalized.contains(t)))
        .map(|(_, formula)| *formula)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.6}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Evaluate `+ - * / ^` with parentheses, unary minus and ²/³ suffixes.
pub fn evaluate(expr: &str) -> Result<f64, EvalError> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::Syntax(format!(
            "unexpected '{}'",
            parser.tokens[parser.pos]
        )));
    }
    if !value.is_finite() {
        return Err(EvalError::Syntax("result is not finite".to_string()));
    }
    Ok(value)
}

struct Parser {
    tokens: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value *= self.unary()?;
            } else if self.eat('/') {
                let divisor = self.unary()?;
                if divisor == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    // -2^2 is -(2^2)
    fn unary(&mut self) -> Result<f64, EvalError> {
        if self.eat('-') {
            return Ok(-self.unary()?);
        }
        if self.eat('+') {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<f64, EvalError> {
        let base = self.postfix()?;
        if self.eat('^') {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<f64, EvalError> {
        let mut value = self.atom()?;
        loop {
            if self.eat('²') {
                value = value.powi(2);
            } else if self.eat('³') {
                value = value.powi(3);
            } else {
                return Ok(value);
            }
        }
    }

    fn atom(&mut self) -> Result<f64, EvalError> {
        if self.eat('(') {
            let value = self.expr()?;
            if !self.eat(')') {
                return Err(EvalError::Syntax("missing ')'".to_string()));
            }
            return Ok(value);
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(EvalError::Syntax(match self.peek() {
                Some(c) => format!("unexpected '{}'", c),
                None => "unexpected end of expression".to_string(),
            }));
        }
        let literal: String = self.tokens[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| EvalError::Syntax(format!("bad number '{}'", literal)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2^2").unwrap(), -4.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("5² + 2³").unwrap(), 33.0);
    }

    #[test]
    fn test_bad_expressions() {
        assert_eq!(evaluate("1 / (3 - 3)"), Err(EvalError::DivisionByZero));
        assert!(matches!(evaluate("(1 + 2"), Err(EvalError::Syntax(_))));
        assert!(matches!(evaluate("1 + "), Err(EvalError::Syntax(_))));
        assert!(matches!(evaluate("1.2.3 + 1"), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn test_extracts_only_pure_arithmetic() {
        assert_eq!(arithmetic_expression("what is 12 × 12").as_deref(), Some("12 * 12"));
        assert_eq!(arithmetic_expression("calculate 7 squared").as_deref(), Some("7 ^2"));
        assert!(arithmetic_expression("solve the quadratic equation x² + 5x + 6 = 0").is_none());
        assert!(arithmetic_expression("what is 42").is_none());
    }

    #[tokio::test]
    async fn test_adapter_answers_arithmetic() {
        let answer = FormulaAdapter
            .attempt(&Query::new("What is 7 / 2?", None))
            .await
            .unwrap();
        assert!(answer.is_hit());
        assert_eq!(answer.confidence, ARITHMETIC_CONFIDENCE);
        assert!(answer.content.starts_with("**Answer:** 3.5"));
    }

    #[tokio::test]
    async fn test_adapter_formula_table() {
        let answer = FormulaAdapter
            .attempt(&Query::new("What is the formula for the area of a circle?", None))
            .await
            .unwrap();
        assert!(answer.content.contains("A = πr²"));
        assert_eq!(answer.confidence, FORMULA_CONFIDENCE);

        // Concrete problems go to the sources that can work them.
        let answer = FormulaAdapter
            .attempt(&Query::new("Find the area of a circle with radius 5 cm", None))
            .await
            .unwrap();
        assert!(!answer.found);
    }

    #[tokio::test]
    async fn test_division_by_zero_is_a_miss() {
        let answer = FormulaAdapter
            .attempt(&Query::new("calculate 5 / 0", None))
            .await
            .unwrap();
        assert!(!answer.found);
    }
}
