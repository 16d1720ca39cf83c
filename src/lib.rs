//! Sable Compiler
//!
//! Semantic core of the Sable language: scoped symbol tables, a module
//! registry with per-module phases, import cycle detection and the
//! collection, resolution and type checking passes.

pub mod config;
pub mod driver;
pub mod frontend;
pub mod semantic;
pub mod types;
pub mod utils;

pub use config::CompilerOptions;
pub use driver::Compiler;
pub use utils::{Error, Result, Span};
