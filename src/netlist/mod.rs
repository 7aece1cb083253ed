//! Netlist reader.
//!
//! A small SPICE-flavoured, line-oriented format describing the element
//! lists, solver options and DC sweep commands.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist   = { line }
//! line      = comment | directive | element | empty
//! comment   = ('#' | ';') { any_char } | '*' { any_char }   (star in column 1 only)
//! element   = name node node ["DC"] value ["G2"]
//! directive = ".OPTIONS" { "SPD" | "ITER" | "SPARSE" | "ITOL=" value }
//!           | ".DC" source start end step
//!           | (".PLOT" | ".PRINT") "V(" node ")" { "V(" node ")" }
//!           | ".END"
//!
//! name      = ('R' | 'I' | 'C' | 'V' | 'L') identifier
//! value     = number [unit_suffix]
//! unit_suffix = 'f' | 'p' | 'n' | 'u' | 'm' | 'k' | "meg" | 'g' | 't'   (any case)
//! ```
//!
//! `m` and `M` both mean milli; mega is `MEG`. `G2` moves an R, I or C
//! element into group 2. `.DC` and `.PLOT` lines are kept verbatim and
//! interpreted later by [`crate::analysis`], so a malformed sweep only skips
//! that command.
//!
//! # Example
//!
//! ```text
//! * voltage divider
//! V1  in   0    5
//! R1  in   out  1k
//! R2  out  0    2k
//! .OPTIONS SPARSE
//! .DC V1 0 5 0.5
//! .PLOT V(out)
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::{Result, SpicyError};

/// Parse a netlist string.
pub fn parse(input: &str) -> Result<NetlistAst> {
    let mut parser = Parser::new(input)?;
    parser.parse()
}

/// Parse a netlist file.
pub fn parse_file(path: &std::path::Path) -> Result<NetlistAst> {
    let content = std::fs::read_to_string(path).map_err(|e| SpicyError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}
