use async_trait::async_trait;
use gurddy_core::{Arguments, HandlerError, HandlerParam, ParamType, ToolHandler};
use serde_json::{json, Value};

use crate::library::blocking;

const DEFAULT_MAX_COLORS: i64 = 4;
const MAX_VERTICES: i64 = 256;

const PARAMS: &[HandlerParam] = &[
    HandlerParam::required("edges", ParamType::Array(&ParamType::Array(&ParamType::Integer))),
    HandlerParam::required("num_vertices", ParamType::Integer),
    HandlerParam::optional("max_colors", ParamType::Integer),
];

/// Vertex coloring by backtracking over vertices in descending degree.
#[derive(Debug, Clone, Copy)]
pub struct GraphColoring;

#[async_trait]
impl ToolHandler for GraphColoring {
    fn parameters(&self) -> &'static [HandlerParam] {
        PARAMS
    }

    async fn invoke(&self, args: Arguments) -> Result<Value, HandlerError> {
        let num_vertices: i64 = args.get("num_vertices")?;
        if !(1..=MAX_VERTICES).contains(&num_vertices) {
            return Err(HandlerError::invalid(
                "num_vertices",
                format!("must be between 1 and {MAX_VERTICES}"),
            ));
        }
        let max_colors: i64 = args.get_or("max_colors", DEFAULT_MAX_COLORS)?;
        if max_colors < 1 {
            return Err(HandlerError::invalid("max_colors", "must be at least 1"));
        }

        let n = usize::try_from(num_vertices)
            .map_err(|e| HandlerError::invalid("num_vertices", e.to_string()))?;
        let k = usize::try_from(max_colors)
            .map_err(|e| HandlerError::invalid("max_colors", e.to_string()))?;
        let edges: Vec<Vec<i64>> = args.get("edges")?;
        let adjacency = adjacency(n, &edges)?;

        blocking(move || match color(&adjacency, k) {
            Some(colors) => {
                let used = colors.iter().max().map_or(0, |m| m + 1);
                Ok(json!({
                    "success": true,
                    "solution": colors,
                    "colors_used": used,
                }))
            }
            None => Ok(json!({
                "success": false,
                "error": format!("Graph cannot be colored with {k} colors"),
            })),
        })
        .await
    }
}

fn adjacency(n: usize, edges: &[Vec<i64>]) -> Result<Vec<Vec<usize>>, HandlerError> {
    let vertex = |v: i64| {
        usize::try_from(v)
            .ok()
            .filter(|v| *v < n)
            .ok_or_else(|| HandlerError::invalid("edges", format!("vertex {v} is out of range")))
    };

    let mut adj = vec![Vec::new(); n];
    for edge in edges {
        let [u, v] = edge.as_slice() else {
            return Err(HandlerError::invalid("edges", "each edge must have two endpoints"));
        };
        let (u, v) = (vertex(*u)?, vertex(*v)?);
        if u == v {
            return Err(HandlerError::invalid("edges", format!("self-loop on vertex {u}")));
        }
        if !adj[u].contains(&v) {
            adj[u].push(v);
            adj[v].push(u);
        }
    }
    Ok(adj)
}

/// Color per vertex, or `None` if `k` colors are not enough.
fn color(adj: &[Vec<usize>], k: usize) -> Option<Vec<usize>> {
    fn go(adj: &[Vec<usize>], order: &[usize], k: usize, colors: &mut [Option<usize>]) -> bool {
        let Some((&v, rest)) = order.split_first() else {
            return true;
        };
        // Colors up to one past the highest used so far; larger ones are symmetric.
        let limit = colors.iter().flatten().max().map_or(1, |m| m + 2).min(k);
        for c in 0..limit {
            if adj[v].iter().any(|&u| colors[u] == Some(c)) {
                continue;
            }
            colors[v] = Some(c);
            if go(adj, rest, k, colors) {
                return true;
            }
            colors[v] = None;
        }
        false
    }

    let mut order: Vec<usize> = (0..adj.len()).collect();
    order.sort_by_key(|&v| std::cmp::Reverse(adj[v].len()));

    let mut colors = vec![None; adj.len()];
    if go(adj, &order, k, &mut colors) {
        colors.into_iter().collect()
    } else {
        None
    }
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

    fn assert_proper(edges: &[[usize; 2]], colors: &[usize]) {
        for [u, v] in edges {
            assert_ne!(colors[*u], colors[*v], "edge {u}-{v}");
        }
    }

    #[tokio::test]
    async fn triangle_needs_three_colors() {
        let triangle = |max_colors: i64| {
            args(json!({
                "edges": [[0, 1], [1, 2], [2, 0]],
                "num_vertices": 3,
                "max_colors": max_colors
            }))
        };

        let out = GraphColoring.invoke(triangle(3)).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["colors_used"], 3);
        let colors: Vec<usize> = serde_json::from_value(out["solution"].clone()).unwrap();
        assert_proper(&[[0, 1], [1, 2], [2, 0]], &colors);

        let out = GraphColoring.invoke(triangle(2)).await.unwrap();
        assert_eq!(out["success"], false);
    }

    #[test]
    fn petersen_graph_is_three_colorable() {
        let edges = [
            [0, 1], [1, 2], [2, 3], [3, 4], [4, 0],
            [0, 5], [1, 6], [2, 7], [3, 8], [4, 9],
            [5, 7], [7, 9], [9, 6], [6, 8], [8, 5],
        ];
        let raw: Vec<Vec<i64>> = edges.iter().map(|[u, v]| vec![*u as i64, *v as i64]).collect();
        let adj = adjacency(10, &raw).unwrap();
        let colors = color(&adj, 3).unwrap();
        assert_proper(&edges, &colors);
        assert!(color(&adj, 2).is_none());
    }

    #[tokio::test]
    async fn isolated_vertices_share_one_color() {
        let out = GraphColoring
            .invoke(args(json!({"edges": [], "num_vertices": 4})))
            .await
            .unwrap();
        assert_eq!(out["solution"], json!([0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn bad_edges_are_errors() {
        for edges in [json!([[0, 7]]), json!([[1, 1]]), json!([[0, 1, 2]])] {
            let result = GraphColoring
                .invoke(args(json!({"edges": edges, "num_vertices": 3})))
                .await;
            assert!(result.is_err(), "{edges}");
        }
    }
}
