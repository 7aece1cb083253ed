//! Line-oriented tokenizer.
//!
//! A netlist line is a run of whitespace-separated words. `=` splits words
//! (`ITOL=1e-3` is three tokens), `#` and `;` start a comment anywhere, and
//! `*` starts one in the first column only. Words that read as a value with
//! an optional scale suffix are reported as [`TokenKind::Number`].

use crate::error::{Result, SpicyError};

/// Lexical category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Name, node or keyword (`R1`, `out`, `V(out)`, `G2`)
    Word,
    /// Value with optional scale suffix (`10k`, `-1.5e-3`, `2meg`)
    Number,
    /// Word starting with `.` that is not a number (`.DC`, `.end`)
    Directive,
    Equals,
    LineEnd,
    End,
}

/// A token and where it starts (1-based line and column).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer<'a> {
    src: &'a str,
    /// Byte offset of the next unread character
    pos: usize,
    line: usize,
    /// Byte offset where the current line starts
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    /// Next token; [`TokenKind::End`] repeats once the input is exhausted.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_blanks();

        let line = self.line;
        let column = self.column();
        let make = |kind, text: &str| Token {
            kind,
            text: text.to_string(),
            line,
            column,
        };

        let Some(ch) = self.peek() else {
            return Ok(make(TokenKind::End, ""));
        };

        match ch {
            '\n' => {
                self.pos += 1;
                self.line += 1;
                self.line_start = self.pos;
                Ok(make(TokenKind::LineEnd, "\n"))
            }
            '=' => {
                self.pos += 1;
                Ok(make(TokenKind::Equals, "="))
            }
            c if c.is_control() => Err(SpicyError::lexer(
                line,
                column,
                format!("unexpected control character {:?}", c),
            )),
            _ => {
                let word = self.take_word();
                let kind = if parse_value(word).is_some() {
                    TokenKind::Number
                } else if word == "." {
                    let message = "expected directive name after '.'";
                    return Err(SpicyError::lexer(line, column, message));
                } else if word.starts_with('.') {
                    TokenKind::Directive
                } else {
                    TokenKind::Word
                };
                Ok(make(kind, word))
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn column(&self) -> usize {
        self.src[self.line_start..self.pos].chars().count() + 1
    }

    /// Skip spaces, tabs, carriage returns and comments, stopping at a newline.
    fn skip_blanks(&mut self) {
        while let Some(ch) = self.peek() {
            let comment = ch == '#' || ch == ';' || (ch == '*' && self.pos == self.line_start);
            if comment {
                let rest = &self.src[self.pos..];
                self.pos += rest.find('\n').unwrap_or(rest.len());
            } else if ch == ' ' || ch == '\t' || ch == '\r' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn take_word(&mut self) -> &'a str {
        let src = self.src;
        let rest = &src[self.pos..];
        let len = rest
            .find(|c: char| c.is_whitespace() || c.is_control() || matches!(c, '=' | '#' | ';'))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }
}

/// Scale suffixes, matched without regard to case. As in SPICE, `m` and
/// `M` are both milli; mega is spelled `meg`.
const SCALES: &[(&str, f64)] = &[
    ("f", 1e-15),
    ("p", 1e-12),
    ("n", 1e-9),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("meg", 1e6),
    ("g", 1e9),
    ("t", 1e12),
];

/// Read a value such as `10k`, `4.7u`, `2MEG` or `-1e-9`.
///
/// Returns `None` for anything else, including `inf` and `nan`.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    let digits_end = text
        .char_indices()
        .rev()
        .find(|&(_, c)| !c.is_alphabetic())
        .map(|(i, c)| i + c.len_utf8())?;
    let (mantissa, suffix) = text.split_at(digits_end);

    if !mantissa.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    let scale = if suffix.is_empty() {
        1.0
    } else {
        SCALES
            .iter()
            .find(|(s, _)| s.eq_ignore_ascii_case(suffix))
            .map(|&(_, scale)| scale)?
    };

    let value = mantissa.parse::<f64>().ok()? * scale;
    value.is_finite().then_some(value)
}
