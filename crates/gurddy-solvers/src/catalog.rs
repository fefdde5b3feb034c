use gurddy_core::{ParamDecl, ParamType, ToolDecl};

const GRID: ParamType = ParamType::Array(&ParamType::Array(&ParamType::Integer));

/// Every tool the server exposes, in listing order.
pub const TOOLS: &[ToolDecl] = &[
    ToolDecl {
        name: "info",
        description: "Get information about the gurddy solver package and its tools.",
        category: "meta",
        handler_ref: "info",
        params: &[],
    },
    ToolDecl {
        name: "solve_n_queens",
        description: "Place N queens on an NxN chessboard so that no two attack each other.",
        category: "classic",
        handler_ref: "n_queens",
        params: &[ParamDecl {
            name: "n",
            ty: ParamType::Integer,
            required: false,
            description: "Board size (default 8)",
        }],
    },
    ToolDecl {
        name: "solve_graph_coloring",
        description: "Color the vertices of a graph so that adjacent vertices differ.",
        category: "graph",
        handler_ref: "graph_coloring",
        params: &[
            ParamDecl {
                name: "edges",
                ty: GRID,
                required: true,
                description: "Edges as [u, v] vertex pairs",
            },
            ParamDecl {
                name: "num_vertices",
                ty: ParamType::Integer,
                required: true,
                description: "Number of vertices, numbered from 0",
            },
            ParamDecl {
                name: "max_colors",
                ty: ParamType::Integer,
                required: false,
                description: "Maximum number of colors (default 4)",
            },
        ],
    },
    ToolDecl {
        name: "solve_sudoku",
        description: "Solve a 9x9 Sudoku puzzle.",
        category: "classic",
        handler_ref: "sudoku",
        params: &[ParamDecl {
            name: "puzzle",
            ty: GRID,
            required: true,
            description: "9x9 grid with 0 for empty cells",
        }],
    },
    ToolDecl {
        name: "solve_24_point_game",
        description: "Combine four numbers with + - * / to reach 24.",
        category: "arithmetic",
        handler_ref: "twenty_four",
        params: &[ParamDecl {
            name: "numbers",
            ty: ParamType::Array(&ParamType::Number),
            required: true,
            description: "The four numbers to combine",
        }],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = TOOLS.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), TOOLS.len());
    }

    #[test]
    fn required_params_come_from_decls() {
        let coloring = TOOLS
            .iter()
            .find(|t| t.name == "solve_graph_coloring")
            .unwrap();
        let required: Vec<&str> = coloring
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        assert_eq!(required, vec!["edges", "num_vertices"]);
    }
}
