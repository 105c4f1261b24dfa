//! ocectl library - exposes the CLI surface for tests

pub mod cli;
pub mod client;
pub mod output;
