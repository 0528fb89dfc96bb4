pub mod ast;
pub mod error;
mod grammar;
pub mod locations;
pub mod tokenizer;

pub use ast::*;
pub use error::{Error, ErrorList};
pub use grammar::{parse_expr, parse_file};
pub use tokenizer::{input_state, tokenize_string, Mode, ParserState};
