//! Reference solvers behind the gurddy tool catalog.
//!
//! Each solver is a [`ToolHandler`](gurddy_core::ToolHandler) that receives
//! already-validated arguments and answers with a plain JSON object carrying
//! a `success` flag plus either a `solution` or an `error` message.

pub mod catalog;
pub mod coloring;
pub mod info;
pub mod library;
pub mod queens;
pub mod sudoku;
pub mod twenty_four;

pub use catalog::TOOLS;
pub use library::SolverLibrary;
