//! Node module: process wiring, inbound dispatch, config loading and the CLI.

pub mod bootstrap;
pub mod cli;
pub mod dispatcher;
pub mod node;
pub mod service_handle;

pub use cli::{run_cli, submit_transaction};
pub use dispatcher::Dispatcher;
pub use node::{Node, NodeConfig, RunningNode};
pub use service_handle::ServiceHandle;
