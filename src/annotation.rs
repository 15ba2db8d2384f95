//! Textual type annotations.
//!
//! Annotations are parsed into an [`Annotation`] tree first and only turned
//! into descriptors by the resolver, once every declared name is known.
//! Quoted annotations (`"Input"`) are kept as raw text and re-parsed during
//! resolution, which is what makes forward references work.
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{Result, SchemaError};

#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// `int`, `Input`, `typing.Any`
    Name(String),
    /// `list[int]`, `dict[str, Any]`, `Optional[Input]`
    Generic { head: String, args: Vec<Annotation> },
    /// `int | None`
    Union(Vec<Annotation>),
    /// `"Input"`: resolved after declarations are complete.
    Forward(String),
    /// A value inside `Literal[...]`.
    Literal(Value),
}

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"^\s*(?:"#,
        r#"(?P<ident>[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)"#,
        r#"|(?P<dq>"(?:[^"\\]|\\.)*")"#,
        r#"|(?P<sq>'(?:[^'\\]|\\.)*')"#,
        r#"|(?P<num>-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)"#,
        r#"|(?P<punct>[\[\],|])"#,
        r#")"#,
    ))
    .expect("annotation token regex is valid")
});

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(Value),
    Punct(char),
}

/// Deepest `[...]` nesting accepted, same as serde_json's recursion limit.
const MAX_DEPTH: usize = 128;

pub fn parse(src: &str) -> Result<Annotation> {
    let toks = tokenize(src)?;
    let mut p = Parser { src, toks, pos: 0, depth: 0 };
    let out = p.union()?;
    if p.pos != p.toks.len() {
        return Err(p.error(format!("unexpected trailing input at token {}", p.pos + 1)));
    }
    Ok(out)
}

fn tokenize(src: &str) -> Result<Vec<Tok>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while !src[pos..].trim().is_empty() {
        let caps = TOKEN
            .captures(&src[pos..])
            .ok_or_else(|| SchemaError::unsupported_annotation(src, format!("unexpected character at offset {pos}")))?;
        let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let tok = if let Some(m) = caps.name("ident") {
            Tok::Ident(m.as_str().to_string())
        } else if let Some(m) = caps.name("dq") {
            let s: String = serde_json::from_str(m.as_str())
                .map_err(|e| SchemaError::unsupported_annotation(src, format!("bad string literal: {e}")))?;
            Tok::Str(s)
        } else if let Some(m) = caps.name("sq") {
            let inner = &m.as_str()[1..m.as_str().len() - 1];
            Tok::Str(inner.replace("\\'", "'"))
        } else if let Some(m) = caps.name("num") {
            let v: Value = serde_json::from_str(m.as_str())
                .map_err(|e| SchemaError::unsupported_annotation(src, format!("bad number literal: {e}")))?;
            Tok::Num(v)
        } else if let Some(m) = caps.name("punct") {
            Tok::Punct(m.as_str().chars().next().unwrap_or(','))
        } else {
            return Err(SchemaError::unsupported_annotation(src, "unrecognised token"));
        };
        out.push(tok);
        pos += whole;
    }
    Ok(out)
}

struct Parser<'a> {
    src: &'a str,
    toks: Vec<Tok>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::unsupported_annotation(self.src, reason)
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(&Tok::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) { Ok(()) } else { Err(self.error(format!("expected `{c}`"))) }
    }

    fn union(&mut self) -> Result<Annotation> {
        let mut arms = vec![self.term()?];
        while self.eat('|') {
            arms.push(self.term()?);
        }
        Ok(if arms.len() == 1 { arms.remove(0) } else { Annotation::Union(arms) })
    }

    fn term(&mut self) -> Result<Annotation> {
        let tok = self.peek().cloned().ok_or_else(|| self.error("unexpected end of annotation"))?;
        self.pos += 1;
        match tok {
            Tok::Str(s) => Ok(Annotation::Forward(s)),
            Tok::Ident(head) => {
                if !self.eat('[') {
                    return Ok(Annotation::Name(head));
                }
                self.depth += 1;
                if self.depth > MAX_DEPTH {
                    return Err(self.error(format!("nested deeper than {MAX_DEPTH} levels")));
                }
                let args = if is_literal_head(&head) { self.literal_args()? } else { self.args()? };
                self.expect(']')?;
                self.depth -= 1;
                Ok(Annotation::Generic { head, args })
            }
            Tok::Num(_) => Err(self.error("numbers are only allowed inside Literal[...]")),
            Tok::Punct(c) => Err(self.error(format!("unexpected `{c}`"))),
        }
    }

    fn args(&mut self) -> Result<Vec<Annotation>> {
        let mut args = vec![self.union()?];
        while self.eat(',') {
            args.push(self.union()?);
        }
        Ok(args)
    }

    fn literal_args(&mut self) -> Result<Vec<Annotation>> {
        let mut args = Vec::new();
        loop {
            let tok = self.peek().cloned().ok_or_else(|| self.error("unterminated Literal[...]"))?;
            self.pos += 1;
            let value = match tok {
                Tok::Str(s) => Value::String(s),
                Tok::Num(n) => n,
                Tok::Ident(id) if id == "True" => Value::Bool(true),
                Tok::Ident(id) if id == "False" => Value::Bool(false),
                Tok::Ident(id) if id == "None" => Value::Null,
                other => return Err(self.error(format!("unsupported literal value {other:?}"))),
            };
            args.push(Annotation::Literal(value));
            if !self.eat(',') {
                return Ok(args);
            }
        }
    }
}

pub(crate) fn is_literal_head(head: &str) -> bool {
    matches!(head, "Literal" | "typing.Literal" | "typing_extensions.Literal")
}
