//! Selector matching
//!
//! A small selector engine covering what reconciliation needs: comma
//! separated compound selectors made of a type (or `*`), `#id`, `.class`
//! and attribute tests. Combinators and pseudo-classes are rejected at
//! parse time rather than silently mismatching.

use std::fmt;

use crate::{DomTree, NodeId};

/// Selector parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unsupported selector syntax: {0}")]
    Unsupported(String),

    #[error("malformed selector: {0}")]
    Malformed(String),
}

/// Attribute operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    /// [attr]
    Exists,
    /// [attr=value]
    Equals,
    /// [attr~=value]
    Includes,
    /// [attr|=value]
    DashMatch,
    /// [attr^=value]
    StartsWith,
    /// [attr$=value]
    EndsWith,
    /// [attr*=value]
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

impl AttrTest {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else { return false };
        let expected = self.value.as_str();
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => {
                !expected.is_empty() && actual.split_ascii_whitespace().any(|w| w == expected)
            }
            AttrOp::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            AttrOp::StartsWith => !expected.is_empty() && actual.starts_with(expected),
            AttrOp::EndsWith => !expected.is_empty() && actual.ends_with(expected),
            AttrOp::Contains => !expected.is_empty() && actual.contains(expected),
        }
    }
}

/// One compound selector, e.g. `meta.x[name="csp-nonce"]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        let Some(tag) = tree.tag_name(id) else { return false };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if !self.ids.iter().all(|i| tree.get_attribute(id, "id") == Some(i.as_str())) {
            return false;
        }
        if !self.classes.is_empty() {
            let class = tree.get_attribute(id, "class").unwrap_or_default();
            if !self
                .classes
                .iter()
                .all(|c| class.split_ascii_whitespace().any(|w| w == c))
            {
                return false;
            }
        }
        self.attrs
            .iter()
            .all(|a| a.matches(tree.get_attribute(id, &a.name)))
    }
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Compound>,
}

impl Selector {
    /// Parse a selector list such as `"[data-permanent], #nav"`
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let groups = trimmed
            .split(',')
            .map(|group| Parser::new(group.trim()).compound())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: trimmed.to_string(),
            groups,
        })
    }

    /// Whether the element matches any group of the list
    pub fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        self.groups.iter().any(|g| g.matches(tree, id))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn malformed(&self) -> SelectorError {
        SelectorError::Malformed(self.input.to_string())
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.bump();
        }
        if self.pos == start {
            return Err(self.malformed());
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn compound(mut self) -> Result<Compound, SelectorError> {
        if self.input.is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut compound = Compound::default();

        if !self.eat('*') && self.peek().is_some_and(|c| c.is_alphabetic()) {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
        }

        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    self.bump();
                    compound.ids.push(self.ident()?);
                }
                '.' => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                '[' => {
                    self.bump();
                    compound.attrs.push(self.attribute()?);
                }
                c if c.is_whitespace() || matches!(c, '>' | '+' | '~' | ':') => {
                    return Err(SelectorError::Unsupported(self.input.to_string()));
                }
                _ => return Err(self.malformed()),
            }
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrTest, SelectorError> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();

        if self.eat(']') {
            return Ok(AttrTest {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }

        let op = match self.bump() {
            Some('=') => AttrOp::Equals,
            Some(c @ ('~' | '|' | '^' | '$' | '*')) if self.eat('=') => match c {
                '~' => AttrOp::Includes,
                '|' => AttrOp::DashMatch,
                '^' => AttrOp::StartsWith,
                '$' => AttrOp::EndsWith,
                _ => AttrOp::Contains,
            },
            _ => return Err(self.malformed()),
        };
        self.skip_ws();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                let len = self.input[start..].find(quote).ok_or_else(|| self.malformed())?;
                self.pos = start + len + 1;
                self.input[start..start + len].to_string()
            }
            _ => self.ident()?,
        };

        self.skip_ws();
        if !self.eat(']') {
            return Err(self.malformed());
        }
        Ok(AttrTest { name, op, value })
    }
}
