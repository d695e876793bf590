pub mod code;
pub mod error;
pub mod jsonrpc;
pub mod path;


pub use code::{ErrorCode, ProcedureError};
pub use error::{ResolutionError, Result, StoreRpcError};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use path::{Mode, ProcedurePath};
