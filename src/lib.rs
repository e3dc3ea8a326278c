//! `goterp` library crate.
//!
//! High-level layout:
//! - frontend: `lexer` + `parser` produce the surface CST (`parser::cst`)
//! - `lower` translates the CST into the tagged node graph (`ast`)
//! - `gopath` resolves imports against a rooted workspace
//! - `exec` walks the graph against the session symbol table (`sym`)
//! - `interp` is the host-facing API
pub mod ast;
pub mod exec;
pub mod gopath;
pub mod interp;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod sym;
pub mod token;
pub mod value;

pub use interp::{Interp, Options};
pub use sym::{stdlib, Symbols};
pub use value::Value;
