use async_trait::async_trait;
use gurddy_core::{Arguments, HandlerError, HandlerParam, ParamType, ToolHandler};
use serde_json::{json, Value};

use crate::library::blocking;

const DEFAULT_N: i64 = 8;
const MAX_N: i64 = 20;

const PARAMS: &[HandlerParam] = &[HandlerParam::optional("n", ParamType::Integer)];

/// N-Queens by bitmask backtracking.
#[derive(Debug, Clone, Copy)]
pub struct NQueens;

#[async_trait]
impl ToolHandler for NQueens {
    fn parameters(&self) -> &'static [HandlerParam] {
        PARAMS
    }

    async fn invoke(&self, args: Arguments) -> Result<Value, HandlerError> {
        let n: i64 = args.get_or("n", DEFAULT_N)?;
        if !(1..=MAX_N).contains(&n) {
            return Err(HandlerError::invalid("n", format!("must be between 1 and {MAX_N}")));
        }
        let n = usize::try_from(n).map_err(|e| HandlerError::invalid("n", e.to_string()))?;

        blocking(move || {
            let Some(columns) = place_queens(n) else {
                return Ok(json!({
                    "success": false,
                    "error": format!("No solution exists for N={n}"),
                }));
            };
            let board: Vec<String> = columns
                .iter()
                .map(|&col| (0..n).map(|c| if c == col { 'Q' } else { '.' }).collect())
                .collect();
            Ok(json!({
                "success": true,
                "n": n,
                "solution": columns,
                "board": board,
            }))
        })
        .await
    }
}

/// Column of the queen on each row, or `None` if the board has no solution.
fn place_queens(n: usize) -> Option<Vec<usize>> {
    fn go(n: usize, row: usize, cols: u64, d1: u64, d2: u64, out: &mut Vec<usize>) -> bool {
        if row == n {
            return true;
        }
        for col in 0..n {
            let (c, a, b) = (1 << col, 1 << (row + col), 1 << (row + n - col));
            if cols & c != 0 || d1 & a != 0 || d2 & b != 0 {
                continue;
            }
            out.push(col);
            if go(n, row + 1, cols | c, d1 | a, d2 | b, out) {
                return true;
            }
            out.pop();
        }
        false
    }

    let mut out = Vec::with_capacity(n);
    go(n, 0, 0, 0, 0, &mut out).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => Arguments::new(map),
            _ => Arguments::default(),
        }
    }

    fn assert_valid(columns: &[usize]) {
        for (r1, &c1) in columns.iter().enumerate() {
            for (r2, &c2) in columns.iter().enumerate().skip(r1 + 1) {
                assert_ne!(c1, c2);
                assert_ne!(r2 - r1, c1.abs_diff(c2));
            }
        }
    }

    #[test]
    fn known_board_sizes() {
        assert_eq!(place_queens(1), Some(vec![0]));
        assert_eq!(place_queens(2), None);
        assert_eq!(place_queens(3), None);
        for n in [4, 5, 8, 12] {
            let cols = place_queens(n).unwrap();
            assert_eq!(cols.len(), n);
            assert_valid(&cols);
        }
    }

    #[tokio::test]
    async fn four_queens() {
        let out = NQueens.invoke(args(json!({"n": 4}))).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["solution"], json!([1, 3, 0, 2]));
        assert_eq!(out["board"][0], ".Q..");
    }

    #[tokio::test]
    async fn defaults_to_eight() {
        let out = NQueens.invoke(Arguments::default()).await.unwrap();
        assert_eq!(out["n"], 8);
    }

    #[tokio::test]
    async fn unsolvable_size_is_reported_not_raised() {
        let out = NQueens.invoke(args(json!({"n": 3}))).await.unwrap();
        assert_eq!(out["success"], false);
        assert!(out["error"].as_str().unwrap().contains("N=3"));
    }

    #[tokio::test]
    async fn out_of_range_size_is_an_error() {
        assert!(NQueens.invoke(args(json!({"n": 0}))).await.is_err());
        assert!(NQueens.invoke(args(json!({"n": 64}))).await.is_err());
    }
}
