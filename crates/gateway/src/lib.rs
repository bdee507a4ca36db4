//! Library surface for the gateway binary, split out so
//! `crates/gateway/tests/` can drive the turn runner and HTTP router
//! the same way the binary does.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod flows;
pub mod runtime;
pub mod state;
