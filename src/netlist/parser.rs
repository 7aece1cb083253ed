//! Parser for the netlist format.

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::circuit::{ElementKind, Group};
use crate::error::{Result, SpicyError};

/// Parser for netlists.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser over the given netlist text.
    pub fn new(source: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            source,
            current,
        })
    }

    /// Parse the entire netlist.
    pub fn parse(&mut self) -> Result<NetlistAst> {
        let mut ast = NetlistAst::new();

        while self.current.kind != TokenKind::End {
            match self.current.kind {
                TokenKind::LineEnd => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => {
                    if !self.parse_directive(&mut ast)? {
                        break;
                    }
                }
                TokenKind::Word => {
                    let element = self.parse_element()?;
                    ast.elements.push(element);
                }
                _ => {
                    return Err(SpicyError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            // Consume newline or EOF
            if self.current.kind == TokenKind::LineEnd {
                self.advance()?;
            }
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::LineEnd | TokenKind::End)
    }

    fn skip_line(&mut self) -> Result<()> {
        while !self.at_line_end() {
            self.advance()?;
        }
        Ok(())
    }

    /// Verbatim text of a source line, without trailing comments.
    fn raw_line(&self, line: usize) -> String {
        let text = self.source.lines().nth(line - 1).unwrap_or_default();
        let end = text.find(['#', ';']).unwrap_or(text.len());
        text[..end].trim().to_string()
    }

    /// Returns `false` once `.END` is reached.
    fn parse_directive(&mut self, ast: &mut NetlistAst) -> Result<bool> {
        let directive = self.current.text.to_uppercase();
        let line = self.current.line;
        self.advance()?;

        match directive.as_str() {
            ".OPTIONS" | ".OPTION" => self.parse_options(&mut ast.options, line)?,
            ".DC" | ".PLOT" | ".PRINT" => {
                ast.commands.push(self.raw_line(line));
                self.skip_line()?;
            }
            ".END" => return Ok(false),
            _ => {
                return Err(SpicyError::parse(line, format!("unknown directive: {}", directive)));
            }
        }

        Ok(true)
    }

    fn parse_options(&mut self, options: &mut OptionsDef, line: usize) -> Result<()> {
        while !self.at_line_end() {
            let name = self.current.text.to_uppercase();
            self.advance()?;
            match name.as_str() {
                "SPD" => options.spd = true,
                "ITER" => options.iter = true,
                "SPARSE" => options.sparse = true,
                "ITOL" => {
                    if self.current.kind != TokenKind::Equals {
                        return Err(SpicyError::parse(line, "expected '=' after ITOL"));
                    }
                    self.advance()?;
                    let text = self.current.text.clone();
                    let value = parse_value(&text)
                        .filter(|v| *v > 0.0)
                        .ok_or_else(|| {
                            SpicyError::parse(line, format!("invalid ITOL value: {}", text))
                        })?;
                    options.itol = Some(value);
                    self.advance()?;
                }
                _ => tracing::warn!(line, option = %name, "ignoring unknown option"),
            }
        }
        Ok(())
    }

    fn parse_element(&mut self) -> Result<ElementDef> {
        let name = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        let tag = name.chars().next().unwrap_or('?');
        let kind = ElementKind::from_tag(tag).ok_or_else(|| SpicyError::UnknownElementType {
            tag,
            name: name.clone(),
            group: 1,
        })?;

        let mut nodes = Vec::with_capacity(2);
        while nodes.len() < 2 {
            match self.current.kind {
                TokenKind::Word | TokenKind::Number => {
                    nodes.push(self.current.text.clone());
                    self.advance()?;
                }
                _ => {
                    return Err(SpicyError::invalid_element(
                        &name,
                        line,
                        format!("expected 2 nodes, got {}", nodes.len()),
                    ));
                }
            }
        }

        // Optional "DC" keyword before the value
        if self.current.kind == TokenKind::Word && self.current.text.eq_ignore_ascii_case("DC") {
            self.advance()?;
        }

        let value = match self.current.kind {
            TokenKind::Number => parse_value(&self.current.text)
                .ok_or_else(|| SpicyError::invalid_element(&name, line, "invalid value"))?,
            _ => return Err(SpicyError::invalid_element(&name, line, "missing value")),
        };
        self.advance()?;

        let mut group = None;
        if self.current.kind == TokenKind::Word && self.current.text.eq_ignore_ascii_case("G2") {
            group = Some(Group::Two);
            self.advance()?;
        }

        if !self.at_line_end() {
            return Err(SpicyError::invalid_element(
                &name,
                line,
                format!("unexpected token: {:?}", self.current.text),
            ));
        }

        let [pos, neg]: [String; 2] = nodes
            .try_into()
            .map_err(|_| SpicyError::invalid_element(&name, line, "expected 2 nodes"))?;

        Ok(ElementDef {
            kind,
            name,
            nodes: [pos, neg],
            value,
            group,
            line,
        })
    }
}
