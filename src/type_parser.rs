//! Parser for JSDoc-style type annotations.
//!
//! Turns the text found between the braces of `@property {...}` or
//! `@typedef {...}` into a [`TypeNode`] tree. The grammar covers the common
//! JSDoc/TypeScript-like forms:
//!
//! ```text
//! union        := intersection ('|' union)?
//! intersection := prefix ('&' intersection)?
//! prefix       := '?' prefix | '!' prefix | '...' prefix | postfix
//! postfix      := primary ('[]' | '=')*
//! primary      := name generic? | number | string | '*' | '?'
//!               | '(' union ')' | '{' (key ':' union),* '}'
//! generic      := '.'? '<' union (',' union)* '>'
//! ```
//!
//! `T[]` is parsed as `Array<T>`, so both spellings reach the converter as the
//! same generic node.

use crate::error::{Error, Result};
use log::debug;

/// A parsed type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// A builtin type name, boolean literal or reference to another type
    Name(String),
    /// Numeric literal such as `1` or `2.5`
    Number(f64),
    /// String literal such as `'a'`
    Str(String),
    /// `left|right`
    Union(Box<TypeNode>, Box<TypeNode>),
    /// `left&right`
    Intersection(Box<TypeNode>, Box<TypeNode>),
    /// `(inner)`
    Parenthesis(Box<TypeNode>),
    /// `*`
    Any,
    /// `?`
    Unknown,
    /// `{key: T, ...}` with entries in source order
    Record(Vec<(String, TypeNode)>),
    /// `Subject<T, ...>`, also produced by `T[]`
    Generic {
        subject: String,
        objects: Vec<TypeNode>,
    },
    /// `?T`
    Nullable(Box<TypeNode>),
    /// `!T`
    NotNullable(Box<TypeNode>),
    /// `T=`
    Optional(Box<TypeNode>),
    /// `...T`
    Variadic(Box<TypeNode>),
}

impl TypeNode {
    /// Short name of the node kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            TypeNode::Name(_) => "NAME",
            TypeNode::Number(_) => "NUMBER_VALUE",
            TypeNode::Str(_) => "STRING_VALUE",
            TypeNode::Union(..) => "UNION",
            TypeNode::Intersection(..) => "INTERSECTION",
            TypeNode::Parenthesis(_) => "PARENTHESIS",
            TypeNode::Any => "ANY",
            TypeNode::Unknown => "UNKNOWN",
            TypeNode::Record(_) => "RECORD",
            TypeNode::Generic { .. } => "GENERIC",
            TypeNode::Nullable(_) => "NULLABLE",
            TypeNode::NotNullable(_) => "NOT_NULLABLE",
            TypeNode::Optional(_) => "OPTIONAL",
            TypeNode::Variadic(_) => "VARIADIC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Pipe,
    Amp,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Lt,
    Gt,
    Colon,
    Comma,
    Dot,
    Ellipsis,
    Star,
    Question,
    Bang,
    Eq,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Lexer<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.text.len())
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> Error {
        Error::TypeSyntax {
            expression: self.text.to_string(),
            offset,
            message: message.into(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek(0) {
            let start = self.offset();
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let token = match c {
                '|' => self.single(Token::Pipe),
                '&' => self.single(Token::Amp),
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '{' => self.single(Token::LBrace),
                '}' => self.single(Token::RBrace),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                '<' => self.single(Token::Lt),
                '>' => self.single(Token::Gt),
                ':' => self.single(Token::Colon),
                ',' => self.single(Token::Comma),
                '*' => self.single(Token::Star),
                '?' => self.single(Token::Question),
                '!' => self.single(Token::Bang),
                '=' => self.single(Token::Eq),
                '.' if self.peek(1) == Some('.') && self.peek(2) == Some('.') => {
                    self.pos += 3;
                    Token::Ellipsis
                }
                '.' => self.single(Token::Dot),
                '\'' | '"' => self.string(c)?,
                '-' | '+' if self.peek(1).is_some_and(|n| n.is_ascii_digit()) => self.number()?,
                c if c.is_ascii_digit() => self.number()?,
                c if is_ident_start(c) => self.ident(),
                other => return Err(self.error(start, format!("unexpected character `{}`", other))),
            };
            tokens.push((start, token));
        }
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn ident(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self.peek(0) {
            if is_ident_char(c) {
                name.push(c);
                self.pos += 1;
            } else if c == '.' && self.peek(1).is_some_and(is_ident_start) {
                // namespaced names like `ns.Type`
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Token::Ident(name)
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.offset();
        let mut literal = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek(0) {
            literal.push(sign);
            self.pos += 1;
        }
        while let Some(c) = self.peek(0) {
            let exponent_sign = (c == '-' || c == '+') && matches!(literal.chars().last(), Some('e' | 'E'));
            let fraction = c == '.' && self.peek(1).is_some_and(|n| n.is_ascii_digit());
            if c.is_ascii_digit() || c == 'e' || c == 'E' || exponent_sign || fraction {
                literal.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        literal
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(start, format!("invalid number `{}`", literal)))
    }

    fn string(&mut self, quote: char) -> Result<Token> {
        let start = self.offset();
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "unterminated string literal")),
                Some('\\') => {
                    if let Some(escaped) = self.peek(1) {
                        value.push(escaped);
                    }
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Token::Str(value));
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.text.len())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::TypeSyntax {
            expression: self.text.to_string(),
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn union(&mut self) -> Result<TypeNode> {
        let left = self.intersection()?;
        if self.eat(&Token::Pipe) {
            let right = self.union()?;
            return Ok(TypeNode::Union(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn intersection(&mut self) -> Result<TypeNode> {
        let left = self.prefix()?;
        if self.eat(&Token::Amp) {
            let right = self.intersection()?;
            return Ok(TypeNode::Intersection(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn prefix(&mut self) -> Result<TypeNode> {
        match self.peek() {
            Some(Token::Question) if self.starts_operand(1) => {
                self.pos += 1;
                Ok(TypeNode::Nullable(Box::new(self.prefix()?)))
            }
            Some(Token::Bang) => {
                self.pos += 1;
                Ok(TypeNode::NotNullable(Box::new(self.prefix()?)))
            }
            Some(Token::Ellipsis) => {
                self.pos += 1;
                Ok(TypeNode::Variadic(Box::new(self.prefix()?)))
            }
            _ => self.postfix(),
        }
    }

    /// Whether the token `ahead` positions away can begin an operand
    fn starts_operand(&self, ahead: usize) -> bool {
        matches!(
            self.peek_at(ahead),
            Some(
                Token::Ident(_)
                    | Token::Number(_)
                    | Token::Str(_)
                    | Token::LParen
                    | Token::LBrace
                    | Token::Star
                    | Token::Question
                    | Token::Bang
                    | Token::Ellipsis
            )
        )
    }

    fn postfix(&mut self) -> Result<TypeNode> {
        let mut node = self.primary()?;
        loop {
            if self.peek() == Some(&Token::LBracket) && self.peek_at(1) == Some(&Token::RBracket) {
                self.pos += 2;
                node = TypeNode::Generic {
                    subject: "Array".to_string(),
                    objects: vec![node],
                };
            } else if self.eat(&Token::Eq) {
                node = TypeNode::Optional(Box::new(node));
            } else {
                return Ok(node);
            }
        }
    }

    fn primary(&mut self) -> Result<TypeNode> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.error("unexpected end of type expression")),
        };
        match token {
            Token::Ident(name) => {
                self.pos += 1;
                let dotted = self.peek() == Some(&Token::Dot) && self.peek_at(1) == Some(&Token::Lt);
                if dotted {
                    self.pos += 1;
                }
                if self.eat(&Token::Lt) {
                    let mut objects = vec![self.union()?];
                    while self.eat(&Token::Comma) {
                        objects.push(self.union()?);
                    }
                    self.expect(&Token::Gt, "`>`")?;
                    return Ok(TypeNode::Generic {
                        subject: name,
                        objects,
                    });
                }
                Ok(TypeNode::Name(name))
            }
            Token::Number(value) => {
                self.pos += 1;
                Ok(TypeNode::Number(value))
            }
            Token::Str(value) => {
                self.pos += 1;
                Ok(TypeNode::Str(value))
            }
            Token::Star => {
                self.pos += 1;
                Ok(TypeNode::Any)
            }
            Token::Question => {
                self.pos += 1;
                Ok(TypeNode::Unknown)
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.union()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(TypeNode::Parenthesis(Box::new(inner)))
            }
            Token::LBrace => {
                self.pos += 1;
                self.record()
            }
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }

    fn record(&mut self) -> Result<TypeNode> {
        let mut entries = Vec::new();
        while !self.eat(&Token::RBrace) {
            let key = match self.peek() {
                Some(Token::Ident(key)) | Some(Token::Str(key)) => key.clone(),
                _ => return Err(self.error("expected record key")),
            };
            self.pos += 1;
            self.expect(&Token::Colon, "`:` after record key")?;
            let value = self.union()?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace, "`,` or `}` in record")?;
                break;
            }
        }
        Ok(TypeNode::Record(entries))
    }
}

/// Parses a type expression.
///
/// # Errors
///
/// Returns [`Error::TypeSyntax`] for empty input, unknown characters,
/// unbalanced brackets or trailing tokens.
pub fn parse_type(text: &str) -> Result<TypeNode> {
    debug!("Parsing type expression: {}", text);
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
    };
    if parser.peek().is_none() {
        return Err(parser.error("empty type expression"));
    }
    let node = parser.union()?;
    if parser.peek().is_some() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> TypeNode {
        TypeNode::Name(n.to_string())
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(parse_type("string").unwrap(), name("string"));
        assert_eq!(parse_type("  ns.Type ").unwrap(), name("ns.Type"));
    }

    #[test]
    fn test_union_is_right_nested() {
        let node = parse_type("a|b|c").unwrap();
        assert_eq!(
            node,
            TypeNode::Union(
                Box::new(name("a")),
                Box::new(TypeNode::Union(Box::new(name("b")), Box::new(name("c"))))
            )
        );
    }

    #[test]
    fn test_intersection_binds_tighter_than_union() {
        let node = parse_type("A&B|C").unwrap();
        assert_eq!(
            node,
            TypeNode::Union(
                Box::new(TypeNode::Intersection(Box::new(name("A")), Box::new(name("B")))),
                Box::new(name("C"))
            )
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse_type("'a'|\"b\"").unwrap(),
            TypeNode::Union(
                Box::new(TypeNode::Str("a".to_string())),
                Box::new(TypeNode::Str("b".to_string()))
            )
        );
        assert_eq!(parse_type("-2.5").unwrap(), TypeNode::Number(-2.5));
        assert_eq!(parse_type("1e3").unwrap(), TypeNode::Number(1000.0));
    }

    #[test]
    fn test_array_forms() {
        let expected = TypeNode::Generic {
            subject: "Array".to_string(),
            objects: vec![name("string")],
        };
        assert_eq!(parse_type("string[]").unwrap(), expected);
        assert_eq!(parse_type("Array<string>").unwrap(), expected);
        assert_eq!(parse_type("Array.<string>").unwrap(), expected);
    }

    #[test]
    fn test_nested_array_suffix() {
        assert_eq!(
            parse_type("Foo[][]").unwrap(),
            TypeNode::Generic {
                subject: "Array".to_string(),
                objects: vec![TypeNode::Generic {
                    subject: "Array".to_string(),
                    objects: vec![name("Foo")],
                }],
            }
        );
    }

    #[test]
    fn test_record() {
        assert_eq!(
            parse_type("{foo: number, 'bar baz': string,}").unwrap(),
            TypeNode::Record(vec![
                ("foo".to_string(), name("number")),
                ("bar baz".to_string(), name("string")),
            ])
        );
        assert_eq!(parse_type("{}").unwrap(), TypeNode::Record(vec![]));
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(parse_type("?").unwrap(), TypeNode::Unknown);
        assert_eq!(parse_type("*").unwrap(), TypeNode::Any);
        assert_eq!(
            parse_type("?string").unwrap(),
            TypeNode::Nullable(Box::new(name("string")))
        );
        assert_eq!(
            parse_type("!Foo").unwrap(),
            TypeNode::NotNullable(Box::new(name("Foo")))
        );
        assert_eq!(
            parse_type("number=").unwrap(),
            TypeNode::Optional(Box::new(name("number")))
        );
        assert_eq!(
            parse_type("...string").unwrap(),
            TypeNode::Variadic(Box::new(name("string")))
        );
    }

    #[test]
    fn test_parenthesis() {
        assert_eq!(
            parse_type("(string|boolean)").unwrap(),
            TypeNode::Parenthesis(Box::new(TypeNode::Union(
                Box::new(name("string")),
                Box::new(name("boolean"))
            )))
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse_type(""), Err(Error::TypeSyntax { .. })));
        assert!(matches!(parse_type("Array<string"), Err(Error::TypeSyntax { .. })));
        assert!(matches!(parse_type("{a number}"), Err(Error::TypeSyntax { .. })));
        assert!(matches!(parse_type("a b"), Err(Error::TypeSyntax { .. })));
        assert!(matches!(parse_type("'open"), Err(Error::TypeSyntax { .. })));
        assert!(matches!(parse_type("a|"), Err(Error::TypeSyntax { .. })));
    }
}
