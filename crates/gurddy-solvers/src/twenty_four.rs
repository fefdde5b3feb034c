use async_trait::async_trait;
use gurddy_core::{Arguments, HandlerError, HandlerParam, ParamType, ToolHandler};
use serde_json::{json, Value};

use crate::library::blocking;

const TARGET: f64 = 24.0;
const EPSILON: f64 = 1e-6;

const PARAMS: &[HandlerParam] = &[HandlerParam::required(
    "numbers",
    ParamType::Array(&ParamType::Number),
)];

/// The 24-point game: combine four numbers with `+ - * /`.
#[derive(Debug, Clone, Copy)]
pub struct TwentyFour;

#[async_trait]
impl ToolHandler for TwentyFour {
    fn parameters(&self) -> &'static [HandlerParam] {
        PARAMS
    }

    async fn invoke(&self, args: Arguments) -> Result<Value, HandlerError> {
        let numbers: Vec<f64> = args.get("numbers")?;
        if numbers.len() != 4 {
            return Err(HandlerError::invalid("numbers", "exactly four numbers are required"));
        }

        blocking(move || {
            let terms: Vec<Term> = numbers
                .iter()
                .map(|&n| Term {
                    value: n,
                    expr: format_number(n),
                })
                .collect();
            match search(terms) {
                Some(expr) => Ok(json!({
                    "success": true,
                    "solution": format!("{expr} = 24"),
                    "expression": expr,
                })),
                None => Ok(json!({
                    "success": false,
                    "error": format!("No way to make 24 from {numbers:?}"),
                })),
            }
        })
        .await
    }
}

#[derive(Debug, Clone)]
struct Term {
    value: f64,
    expr: String,
}

/// Repeatedly replace two terms by one of their combinations until a single
/// term equal to the target remains.
fn search(terms: Vec<Term>) -> Option<String> {
    if let [only] = terms.as_slice() {
        return ((only.value - TARGET).abs() < EPSILON).then(|| strip_parens(&only.expr));
    }

    for i in 0..terms.len() {
        for j in 0..terms.len() {
            if i == j {
                continue;
            }
            let (a, b) = (&terms[i], &terms[j]);
            let rest = terms
                .iter()
                .enumerate()
                .filter(|(k, _)| *k != i && *k != j)
                .map(|(_, t)| t.clone());

            for combined in combine(a, b, i < j) {
                let next: Vec<Term> = rest.clone().chain(std::iter::once(combined)).collect();
                if let Some(found) = search(next) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Combinations of `a` with `b`. Commutative operators only for the first
/// ordering of a pair.
fn combine(a: &Term, b: &Term, first: bool) -> Vec<Term> {
    let make = |value: f64, op: char| Term {
        value,
        expr: format!("({} {op} {})", a.expr, b.expr),
    };

    let mut out = Vec::with_capacity(4);
    if first {
        out.push(make(a.value + b.value, '+'));
        out.push(make(a.value * b.value, '*'));
    }
    out.push(make(a.value - b.value, '-'));
    if b.value.abs() > EPSILON {
        out.push(make(a.value / b.value, '/'));
    }
    out
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

fn strip_parens(expr: &str) -> String {
    expr.strip_prefix('(')
        .and_then(|e| e.strip_suffix(')'))
        .map_or_else(|| expr.to_string(), str::to_string)
}
