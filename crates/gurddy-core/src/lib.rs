pub mod args;
pub mod error;
pub mod traits;
pub mod types;

pub use args::Arguments;
pub use error::HandlerError;
pub use traits::{HandlerResolver, ToolHandler};
pub use types::{HandlerParam, ParamDecl, ParamType, SessionId, ToolDecl};
