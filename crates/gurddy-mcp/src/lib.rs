//! Protocol engine for the gurddy MCP server: JSON-RPC envelopes, the tool
//! registry and its consistency checks, the per-session handshake state
//! machine, dispatch, frame delivery and client-side correlation.

pub mod connection;
pub mod consistency;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod jsonrpc;
pub mod schema;
pub mod session;
pub mod tools;
pub mod transport;

pub use connection::SessionHandle;
pub use consistency::{ConsistencyReport, ListedTool, SurfaceListing};
pub use correlator::{ClientError, Correlator, PendingCall};
pub use dispatch::{Dispatcher, Route};
pub use error::McpError;
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use schema::InputSchema;
pub use session::{ServerIdentity, Session, SessionState};
pub use tools::{RegisteredTool, RegistryError, ToolDefinition, ToolRegistry};
pub use transport::{DeliveryMode, Frame, FrameStream, Outcome, TransportError};
