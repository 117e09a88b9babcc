//! Function side of the adapter: the user handler contract and the
//! transports that deliver events to it.

pub mod handler;
pub mod invoker;
pub mod local;

pub use handler::{ExecutionContext, FunctionError, FunctionHandler};
pub use invoker::{full_body, BoxError, ForwardedHeaders, InvokeBody, Invoker, SubRuntimeInvoker};
pub use local::LocalInvoker;
