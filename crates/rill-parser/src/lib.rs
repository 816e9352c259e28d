//! Parser for the rill language.

mod parser;

pub use parser::{parse_expr_from_file, parse_expr_from_str, ParseError, Parser};
