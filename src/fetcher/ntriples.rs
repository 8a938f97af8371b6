//! Minimal N-Triples reader
//!
//! Handles IRIs, blank nodes, plain/typed/language-tagged literals with the
//! standard string escapes, comments and blank lines. Anything else is
//! reported with its line number.

use crate::model::{Literal, Term, Triple};

/// Parses an N-Triples document
///
/// # Arguments
///
/// * `input` - Document body
///
/// # Returns
///
/// * `Ok(Vec<Triple>)` - Every triple, in document order
/// * `Err(String)` - Description of the first malformed line
pub fn parse_ntriples(input: &str) -> Result<Vec<Triple>, String> {
    let mut triples = Vec::new();

    for (number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let triple = parse_line(line).map_err(|e| format!("line {}: {}", number + 1, e))?;
        triples.push(triple);
    }

    Ok(triples)
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, c: char) -> bool {
        if let Some(rest) = self.rest.strip_prefix(c) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn take_until(&mut self, end: char) -> Result<&'a str, String> {
        let at = self
            .rest
            .find(end)
            .ok_or_else(|| format!("missing '{}'", end))?;
        let (token, rest) = self.rest.split_at(at);
        self.rest = &rest[end.len_utf8()..];
        Ok(token)
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let at = self
            .rest
            .find(|c: char| !keep(c))
            .unwrap_or(self.rest.len());
        let (token, rest) = self.rest.split_at(at);
        self.rest = rest;
        token
    }

    fn node(&mut self) -> Result<Term, String> {
        self.skip_ws();
        if self.eat('<') {
            Ok(Term::Iri(self.take_until('>')?.to_string()))
        } else if self.eat('_') {
            if !self.eat(':') {
                return Err("malformed blank node".to_string());
            }
            let label = self.take_while(|c| !c.is_whitespace() && c != '.');
            if label.is_empty() {
                return Err("empty blank node label".to_string());
            }
            Ok(Term::Blank(label.to_string()))
        } else {
            Err(format!("unexpected token near '{}'", preview(self.rest)))
        }
    }

    fn object(&mut self) -> Result<Term, String> {
        self.skip_ws();
        if !self.eat('"') {
            return self.node();
        }

        let lexical = self.string_body()?;
        let mut literal = Literal::plain(lexical);

        if self.eat('@') {
            let tag = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-');
            if tag.is_empty() {
                return Err("empty language tag".to_string());
            }
            literal.language = Some(tag.to_string());
        } else if self.rest.starts_with("^^") {
            self.rest = &self.rest[2..];
            match self.node()? {
                Term::Iri(datatype) => literal.datatype = Some(datatype),
                _ => return Err("datatype must be an IRI".to_string()),
            }
        }

        Ok(Term::Literal(literal))
    }

    fn string_body(&mut self) -> Result<String, String> {
        let text = self.rest;
        let mut out = String::new();
        let mut chars = text.char_indices();

        while let Some((at, c)) = chars.next() {
            match c {
                '"' => {
                    self.rest = &text[at + 1..];
                    return Ok(out);
                }
                '\\' => {
                    let (_, escape) = chars.next().ok_or("dangling escape")?;
                    match escape {
                        't' => out.push('\t'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        '\\' => out.push('\\'),
                        'u' | 'U' => {
                            let width = if escape == 'u' { 4 } else { 8 };
                            let hex: String = chars.by_ref().take(width).map(|(_, h)| h).collect();
                            let code = u32::from_str_radix(&hex, 16)
                                .ok()
                                .filter(|_| hex.len() == width)
                                .and_then(char::from_u32)
                                .ok_or_else(|| format!("invalid escape \\{}{}", escape, hex))?;
                            out.push(code);
                        }
                        other => return Err(format!("unknown escape \\{}", other)),
                    }
                }
                c => out.push(c),
            }
        }

        Err("unterminated literal".to_string())
    }
}

fn preview(s: &str) -> String {
    s.chars().take(16).collect()
}

fn parse_line(line: &str) -> Result<Triple, String> {
    let mut cursor = Cursor { rest: line };

    let subject = cursor.node()?;
    cursor.skip_ws();
    let predicate = match cursor.node()? {
        Term::Iri(iri) => iri,
        _ => return Err("predicate must be an IRI".to_string()),
    };
    let object = cursor.object()?;

    cursor.skip_ws();
    if !cursor.eat('.') {
        return Err("missing terminating '.'".to_string());
    }
    cursor.skip_ws();
    if !cursor.rest.is_empty() && !cursor.rest.starts_with('#') {
        return Err(format!("trailing content '{}'", preview(cursor.rest)));
    }

    Ok(Triple::new(subject, predicate, object))
}
