//! OCE daemon library - exposes the pipeline and HTTP surface for testing.

pub mod auth;
pub mod config;
pub mod engine;
pub mod meta;
pub mod modules;
pub mod report;
pub mod router;
pub mod routes;
pub mod server;
pub mod validator;
