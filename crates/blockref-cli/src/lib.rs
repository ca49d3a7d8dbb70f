//! Library side of the `blockref` binary: argument parsing, the index
//! session and one module per subcommand.

pub mod cli;
pub mod commands;
pub mod context;
pub mod output;
