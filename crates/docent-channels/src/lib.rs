//! Channel implementations for the docent chat loop.

pub mod cli;

pub use cli::CliChannel;
