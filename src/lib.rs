//! Scanner, parser and tree-walking evaluator for goscript, a small
//! Go-flavoured scripting language.

pub mod parser;
pub mod scope;
pub use parser::{input_state, parse_expr, parse_file, ErrorList, File, ParserState};

mod interpreter;
pub use interpreter::{exec, exec_expr, Error, Interpreter, RuntimeError};
pub use scope::Value;
