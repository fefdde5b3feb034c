use async_trait::async_trait;
use gurddy_core::{Arguments, HandlerError, HandlerParam, ParamType, ToolHandler};
use serde_json::{json, Value};

use crate::library::blocking;

const PARAMS: &[HandlerParam] = &[HandlerParam::required(
    "puzzle",
    ParamType::Array(&ParamType::Array(&ParamType::Integer)),
)];

type Grid = [[u8; 9]; 9];

/// 9x9 Sudoku by constraint-ordered backtracking.
#[derive(Debug, Clone, Copy)]
pub struct Sudoku;

#[async_trait]
impl ToolHandler for Sudoku {
    fn parameters(&self) -> &'static [HandlerParam] {
        PARAMS
    }

    async fn invoke(&self, args: Arguments) -> Result<Value, HandlerError> {
        let rows: Vec<Vec<i64>> = args.get("puzzle")?;
        let grid = parse_grid(&rows)?;

        blocking(move || {
            let Some(mut board) = Board::new(&grid) else {
                return Ok(json!({
                    "success": false,
                    "error": "Puzzle breaks the row, column or box rule",
                }));
            };
            if board.solve() {
                Ok(json!({ "success": true, "solution": board.cells }))
            } else {
                Ok(json!({ "success": false, "error": "No solution exists" }))
            }
        })
        .await
    }
}

fn parse_grid(rows: &[Vec<i64>]) -> Result<Grid, HandlerError> {
    if rows.len() != 9 || rows.iter().any(|r| r.len() != 9) {
        return Err(HandlerError::invalid("puzzle", "must be a 9x9 grid"));
    }
    let mut grid = [[0u8; 9]; 9];
    for (r, row) in rows.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            grid[r][c] = u8::try_from(v)
                .ok()
                .filter(|v| *v <= 9)
                .ok_or_else(|| {
                    HandlerError::invalid("puzzle", format!("cell ({r}, {c}) must be 0-9"))
                })?;
        }
    }
    Ok(grid)
}

struct Board {
    cells: Grid,
    rows: [u16; 9],
    cols: [u16; 9],
    boxes: [u16; 9],
}

impl Board {
    /// `None` when the givens already conflict.
    fn new(grid: &Grid) -> Option<Self> {
        let mut board = Self {
            cells: [[0; 9]; 9],
            rows: [0; 9],
            cols: [0; 9],
            boxes: [0; 9],
        };
        for (r, row) in grid.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                if v == 0 {
                    continue;
                }
                if board.candidates(r, c) & (1 << v) == 0 {
                    return None;
                }
                board.set(r, c, v);
            }
        }
        Some(board)
    }

    fn candidates(&self, r: usize, c: usize) -> u16 {
        !(self.rows[r] | self.cols[c] | self.boxes[box_of(r, c)]) & 0b11_1111_1110
    }

    fn set(&mut self, r: usize, c: usize, v: u8) {
        let bit = 1 << v;
        self.cells[r][c] = v;
        self.rows[r] |= bit;
        self.cols[c] |= bit;
        self.boxes[box_of(r, c)] |= bit;
    }

    fn clear(&mut self, r: usize, c: usize, v: u8) {
        let bit = !(1 << v);
        self.cells[r][c] = 0;
        self.rows[r] &= bit;
        self.cols[c] &= bit;
        self.boxes[box_of(r, c)] &= bit;
    }

    /// Empty cell with the fewest candidates.
    fn most_constrained(&self) -> Option<(usize, usize, u16)> {
        let mut best: Option<(usize, usize, u16)> = None;
        for r in 0..9 {
            for c in 0..9 {
                if self.cells[r][c] != 0 {
                    continue;
                }
                let cand = self.candidates(r, c);
                if best.map_or(true, |(_, _, b)| cand.count_ones() < b.count_ones()) {
                    best = Some((r, c, cand));
                }
            }
        }
        best
    }

    fn solve(&mut self) -> bool {
        let Some((r, c, cand)) = self.most_constrained() else {
            return true;
        };
        for v in 1..=9u8 {
            if cand & (1 << v) == 0 {
                continue;
            }
            self.set(r, c, v);
            if self.solve() {
                return true;
            }
            self.clear(r, c, v);
        }
        false
    }
}

fn box_of(r: usize, c: usize) -> usize {
    (r / 3) * 3 + c / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle() -> Value {
        json!([
            [5, 3, 0, 0, 7, 0, 0, 0, 0],
            [6, 0, 0, 1, 9, 5, 0, 0, 0],
            [0, 9, 8, 0, 0, 0, 0, 6, 0],
            [8, 0, 0, 0, 6, 0, 0, 0, 3],
            [4, 0, 0, 8, 0, 3, 0, 0, 1],
            [7, 0, 0, 0, 2, 0, 0, 0, 6],
            [0, 6, 0, 0, 0, 0, 2, 8, 0],
            [0, 0, 0, 4, 1, 9, 0, 0, 5],
            [0, 0, 0, 0, 8, 0, 0, 7, 9]
        ])
    }

    fn args(puzzle: Value) -> Arguments {
        let mut map = serde_json::Map::new();
        map.insert("puzzle".into(), puzzle);
        Arguments::new(map)
    }

    #[tokio::test]
    async fn solves_classic_puzzle() {
        let out = Sudoku.invoke(args(puzzle())).await.unwrap();
        assert_eq!(out["success"], true);

        let solution: Vec<Vec<u8>> = serde_json::from_value(out["solution"].clone()).unwrap();
        assert_eq!(solution[0], vec![5, 3, 4, 6, 7, 8, 9, 1, 2]);
        for i in 0..9 {
            let mut row: Vec<u8> = solution[i].clone();
            let mut col: Vec<u8> = (0..9).map(|r| solution[r][i]).collect();
            row.sort_unstable();
            col.sort_unstable();
            assert_eq!(row, (1..=9).collect::<Vec<u8>>());
            assert_eq!(col, (1..=9).collect::<Vec<u8>>());
        }
    }

    #[tokio::test]
    async fn conflicting_givens_are_reported() {
        let mut grid = puzzle();
        grid[0][2] = json!(5);
        let out = Sudoku.invoke(args(grid)).await.unwrap();
        assert_eq!(out["success"], false);
    }

    #[tokio::test]
    async fn wrong_shape_is_an_error() {
        let err = Sudoku.invoke(args(json!([[1, 2, 3]]))).await.unwrap_err();
        assert!(err.to_string().contains("9x9"));

        let mut grid = puzzle();
        grid[4][4] = json!(12);
        assert!(Sudoku.invoke(args(grid)).await.is_err());
    }
}
