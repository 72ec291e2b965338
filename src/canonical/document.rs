//! Line-based reader for the block notation produced by the encoder.
//!
//! This is a deliberately small subset of YAML: block mappings, block
//! sequences (indented or level with their key), `? member` sets, single-line
//! flow collections, quoted and plain scalars, and the `!!binary` tag.
//! Anything outside that subset is a syntax error carrying its line number.

use crate::error::StructuralError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub text: String,
    pub style: ScalarStyle,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Node,
}

/// Untyped document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    Mapping(Vec<Entry>),
    Set(Vec<Scalar>),
}

impl Scalar {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: ScalarStyle::Plain,
            tag: None,
        }
    }

    fn blank() -> Self {
        Self::plain("")
    }

    /// A blank value, `~` or `null`
    pub fn is_null(&self) -> bool {
        self.style == ScalarStyle::Plain
            && self.tag.is_none()
            && matches!(self.text.as_str(), "" | "~" | "null" | "Null" | "NULL")
    }
}

impl Node {
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(s) if s.is_null())
    }
}

const BINARY_TAG: &str = "!!binary";

struct Line {
    number: usize,
    indent: usize,
    text: String,
}

/// Read canonical text into a document tree. `max_levels` bounds the
/// nesting of collections; `limit` is the configured tree depth it was
/// derived from, reported on failure.
pub fn read_document(text: &str, max_levels: usize, limit: usize) -> Result<Node, StructuralError> {
    let mut lines = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let number = i + 1;
        let trimmed = raw.trim_end();
        let content = trimmed.trim_start_matches(' ');
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        if content.starts_with('\t') {
            return Err(StructuralError::syntax(
                number,
                "tabs are not allowed in indentation",
            ));
        }
        lines.push(Line {
            number,
            indent: trimmed.len() - content.len(),
            text: content.to_string(),
        });
    }

    if lines.is_empty() {
        return Err(StructuralError::syntax(1, "document is empty"));
    }

    let mut reader = Reader {
        lines,
        pos: 0,
        max_levels,
        limit,
    };
    let root = reader.block(1)?;

    match reader.lines.get(reader.pos) {
        None => Ok(root),
        Some(line) => Err(StructuralError::syntax(
            line.number,
            "unexpected content after the document",
        )),
    }
}

struct Reader {
    lines: Vec<Line>,
    pos: usize,
    max_levels: usize,
    limit: usize,
}

impl Reader {
    fn check_depth(&self, depth: usize) -> Result<(), StructuralError> {
        if depth > self.max_levels {
            return Err(StructuralError::NestingTooDeep { limit: self.limit });
        }
        Ok(())
    }

    /// The block starting at the current line, whatever its kind
    fn block(&mut self, depth: usize) -> Result<Node, StructuralError> {
        self.check_depth(depth)?;
        let Some(line) = self.lines.get(self.pos) else {
            return Ok(Node::Scalar(Scalar::blank()));
        };
        let (number, indent, text) = (line.number, line.indent, line.text.clone());

        if is_sequence_entry(&text) {
            self.sequence(indent, depth)
        } else if is_set_entry(&text) {
            self.set(indent, depth)
        } else if split_key(&text).is_some() {
            self.mapping(indent, depth)
        } else {
            self.pos += 1;
            inline(&text, number, depth, self)
        }
    }

    fn mapping(&mut self, indent: usize, depth: usize) -> Result<Node, StructuralError> {
        let mut entries = Vec::new();

        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(StructuralError::syntax(line.number, "unexpected indentation"));
            }
            let number = line.number;
            let Some((key, rest)) = split_key(&line.text) else {
                if is_sequence_entry(&line.text) {
                    return Err(StructuralError::syntax(
                        number,
                        "sequence entry where a mapping key was expected",
                    ));
                }
                return Err(StructuralError::syntax(number, "expected 'key: value'"));
            };
            let (key, rest) = (key.to_string(), rest.to_string());
            self.pos += 1;

            let (nested, level_sequence) = match self.lines.get(self.pos) {
                Some(next) => (
                    next.indent > indent,
                    next.indent == indent && is_sequence_entry(&next.text),
                ),
                None => (false, false),
            };

            let value = if !rest.is_empty() {
                inline(&rest, number, depth + 1, self)?
            } else if nested {
                self.block(depth + 1)?
            } else if level_sequence {
                self.sequence(indent, depth + 1)?
            } else {
                Node::Scalar(Scalar::blank())
            };

            entries.push(Entry { key, value });
        }

        Ok(Node::Mapping(entries))
    }

    fn sequence(&mut self, indent: usize, depth: usize) -> Result<Node, StructuralError> {
        self.check_depth(depth)?;
        let mut items = Vec::new();

        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent || (line.indent == indent && !is_sequence_entry(&line.text)) {
                break;
            }
            if line.indent > indent {
                return Err(StructuralError::syntax(line.number, "unexpected indentation"));
            }
            let number = line.number;
            let after = line.text[1..].to_string();
            let content = after.trim_start_matches(' ');

            if content.is_empty() {
                self.pos += 1;
                let nested = matches!(self.lines.get(self.pos), Some(next) if next.indent > indent);
                let item = if nested {
                    self.block(depth + 1)?
                } else {
                    Node::Scalar(Scalar::blank())
                };
                items.push(item);
                continue;
            }

            if is_sequence_entry(content) || is_set_entry(content) || split_key(content).is_some()
            {
                // the item's block starts on the dash line: reread that line
                // as if the dash were indentation
                let offset = 1 + after.len() - content.len();
                let content = content.to_string();
                let line = &mut self.lines[self.pos];
                line.indent = indent + offset;
                line.text = content;
                items.push(self.block(depth + 1)?);
            } else {
                let content = content.to_string();
                self.pos += 1;
                items.push(inline(&content, number, depth + 1, self)?);
            }
        }

        Ok(Node::Sequence(items))
    }

    fn set(&mut self, indent: usize, depth: usize) -> Result<Node, StructuralError> {
        self.check_depth(depth)?;
        let mut members = Vec::new();

        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent || (line.indent == indent && !is_set_entry(&line.text)) {
                break;
            }
            if line.indent > indent {
                return Err(StructuralError::syntax(line.number, "unexpected indentation"));
            }
            let number = line.number;
            let content = line.text[1..].trim_start_matches(' ').to_string();
            if content.is_empty() {
                return Err(StructuralError::syntax(number, "set entry has no member"));
            }
            self.pos += 1;
            match inline(&content, number, depth + 1, self)? {
                Node::Scalar(s) => members.push(s),
                _ => {
                    return Err(StructuralError::syntax(
                        number,
                        "set members must be scalars",
                    ))
                }
            }
        }

        Ok(Node::Set(members))
    }
}

fn is_sequence_entry(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

fn is_set_entry(text: &str) -> bool {
    text == "?" || text.starts_with("? ")
}

/// `key:` or `key: rest`, where key is an identifier
fn split_key(text: &str) -> Option<(&str, &str)> {
    let colon = text.find(':')?;
    let (key, rest) = (&text[..colon], &text[colon + 1..]);
    let is_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !is_key || !(rest.is_empty() || rest.starts_with(' ')) {
        return None;
    }
    Some((key, rest.trim_start_matches(' ')))
}

/// A value written on the same line as its key or dash
fn inline(text: &str, line: usize, depth: usize, reader: &Reader) -> Result<Node, StructuralError> {
    reader.check_depth(depth)?;
    let text = text.trim();
    let Some(first) = text.chars().next() else {
        return Ok(Node::Scalar(Scalar::blank()));
    };

    match first {
        '#' => Ok(Node::Scalar(Scalar::blank())),
        '[' | '{' | '\'' | '"' => {
            let mut flow = Flow {
                text,
                pos: 0,
                line,
                reader,
            };
            let node = flow.item(depth)?;
            flow.end()?;
            Ok(node)
        }
        '!' => {
            let Some(rest) = text.strip_prefix(BINARY_TAG) else {
                return Err(StructuralError::syntax(line, "unsupported tag"));
            };
            if !rest.is_empty() && !rest.starts_with(' ') {
                return Err(StructuralError::syntax(line, "unsupported tag"));
            }
            let rest = rest.trim_start_matches(' ');
            let mut scalar = match rest.chars().next() {
                None => {
                    return Err(StructuralError::syntax(line, "binary tag needs a value"));
                }
                Some('\'' | '"') => {
                    let mut flow = Flow {
                        text: rest,
                        pos: 0,
                        line,
                        reader,
                    };
                    let scalar = flow.quoted()?;
                    flow.end()?;
                    scalar
                }
                Some(_) => plain(rest, line)?,
            };
            scalar.tag = Some(BINARY_TAG.to_string());
            Ok(Node::Scalar(scalar))
        }
        '&' | '*' => Err(StructuralError::syntax(
            line,
            "anchors and aliases are not supported",
        )),
        '|' | '>' => Err(StructuralError::syntax(
            line,
            "block scalars are not supported",
        )),
        '@' | '`' => Err(StructuralError::syntax(
            line,
            "reserved indicator at start of scalar",
        )),
        _ if is_sequence_entry(text) || is_set_entry(text) => Err(StructuralError::syntax(
            line,
            "block collection cannot start here",
        )),
        _ => plain(text, line).map(Node::Scalar),
    }
}

/// Plain scalar in block context; a ` #` starts a comment
fn plain(text: &str, line: usize) -> Result<Scalar, StructuralError> {
    let text = match text.find(" #") {
        Some(i) => &text[..i],
        None => text,
    }
    .trim_end();

    if text.contains(": ") || text.ends_with(':') {
        return Err(StructuralError::syntax(
            line,
            "mapping values are not allowed here",
        ));
    }

    Ok(Scalar::plain(text))
}

/// Cursor over a single-line flow collection or quoted scalar
struct Flow<'t, 'r> {
    text: &'t str,
    pos: usize,
    line: usize,
    reader: &'r Reader,
}

impl Flow<'_, '_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> StructuralError {
        StructuralError::syntax(self.line, message)
    }

    /// Only a comment may follow the value
    fn end(&mut self) -> Result<(), StructuralError> {
        let rest = &self.text[self.pos..];
        let trimmed = rest.trim_start_matches(' ');
        if trimmed.is_empty() || (trimmed.starts_with('#') && trimmed.len() < rest.len()) {
            Ok(())
        } else {
            Err(self.error("unexpected text after value"))
        }
    }

    fn item(&mut self, depth: usize) -> Result<Node, StructuralError> {
        self.reader.check_depth(depth)?;
        self.skip_spaces();
        match self.peek() {
            Some('[') => {
                self.bump();
                let items = self.entries(']', depth)?;
                Ok(Node::Sequence(items))
            }
            Some('{') => {
                self.bump();
                let members = self
                    .entries('}', depth)?
                    .into_iter()
                    .map(|n| match n {
                        Node::Scalar(s) => Ok(s),
                        _ => Err(self.error("set members must be scalars")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::Set(members))
            }
            Some('\'' | '"') => self.quoted().map(Node::Scalar),
            Some(_) => self.flow_plain().map(Node::Scalar),
            None => Err(self.error("missing value")),
        }
    }

    fn entries(&mut self, close: char, depth: usize) -> Result<Vec<Node>, StructuralError> {
        let mut items = Vec::new();
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(c) if c == close => {
                    self.bump();
                    return Ok(items);
                }
                None => return Err(self.error("unterminated flow collection")),
                _ => {}
            }
            items.push(self.item(depth + 1)?);
            self.skip_spaces();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {}
                Some(':') => {
                    return Err(self.error("flow mappings with values are not supported"))
                }
                _ => return Err(self.error("expected ',' or the end of the collection")),
            }
        }
    }

    fn flow_plain(&mut self) -> Result<Scalar, StructuralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '[' | ']' | '{' | '}') {
                break;
            }
            if c == ':' {
                let next = self.text[self.pos + 1..].chars().next();
                if matches!(next, None | Some(' ' | ',')) {
                    break;
                }
            }
            self.bump();
        }
        let text = self.text[start..self.pos].trim_end();
        if text.is_empty() {
            return Err(self.error("empty flow entry"));
        }
        Ok(Scalar::plain(text))
    }

    fn quoted(&mut self) -> Result<Scalar, StructuralError> {
        match self.bump() {
            Some('\'') => {
                let mut text = String::new();
                loop {
                    match self.bump() {
                        None => return Err(self.error("unterminated single-quoted scalar")),
                        Some('\'') if self.peek() == Some('\'') => {
                            self.bump();
                            text.push('\'');
                        }
                        Some('\'') => break,
                        Some(c) => text.push(c),
                    }
                }
                Ok(Scalar {
                    text,
                    style: ScalarStyle::SingleQuoted,
                    tag: None,
                })
            }
            Some('"') => {
                let mut text = String::new();
                loop {
                    match self.bump() {
                        None => return Err(self.error("unterminated double-quoted scalar")),
                        Some('"') => break,
                        Some('\\') => text.push(self.escape()?),
                        Some(c) => text.push(c),
                    }
                }
                Ok(Scalar {
                    text,
                    style: ScalarStyle::DoubleQuoted,
                    tag: None,
                })
            }
            _ => Err(self.error("expected a quoted scalar")),
        }
    }

    fn escape(&mut self) -> Result<char, StructuralError> {
        let c = match self.bump() {
            Some('\\') => '\\',
            Some('"') => '"',
            Some('/') => '/',
            Some(' ') => ' ',
            Some('0') => '\0',
            Some('a') => '\x07',
            Some('b') => '\x08',
            Some('t') => '\t',
            Some('n') => '\n',
            Some('v') => '\x0b',
            Some('f') => '\x0c',
            Some('r') => '\r',
            Some('e') => '\x1b',
            Some('x') => self.code_point(2)?,
            Some('u') => self.code_point(4)?,
            Some('U') => self.code_point(8)?,
            _ => return Err(self.error("invalid escape in double-quoted scalar")),
        };
        Ok(c)
    }

    fn code_point(&mut self, digits: usize) -> Result<char, StructuralError> {
        let end = self.pos + digits;
        let hex = self
            .text
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated escape in double-quoted scalar"))?;
        let c = u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("invalid code point in double-quoted scalar"))?;
        self.pos = end;
        Ok(c)
    }
}
