//! Query tree, filter compiler and listing assembler.

pub mod assembler;
mod ast;
pub mod date;
pub mod filter;

pub use assembler::{ListQuery, QueryAssembler};
pub use ast::*;
pub use date::format_date;
pub use filter::FilterCompiler;
