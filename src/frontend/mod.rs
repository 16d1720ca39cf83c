//! Frontend module - Lexer, Parser, Module loading

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod module;
