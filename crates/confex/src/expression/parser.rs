//! Recursive descent parser
//!
//! ```text
//! expression          := '${' body '}'
//! body                := inline_variable | standalone_variable | path | call
//! inline_variable     := '$' IDENT
//! standalone_variable := IDENT                              (followed by '}')
//! path                := IDENT (':' (IDENT | inline_variable))+
//! call                := IDENT '(' arg_list ')' ('||' alternative)?
//! alternative         := expression | body
//! arg_list            := [] | arg (',' arg)*
//! arg                 := STRING | NUMBER | inline_variable | path | call
//! ```
//!
//! After a leading identifier the next token picks the production: `(` is a call, `:` a path and
//! `}` a standalone variable. Unsigned integer literals are accepted as path tail segments so
//! array elements can be addressed (`servers:0:host`).
use super::ast::{
    CallNode, ExpressionNode, IdentifierNode, Node, NumberNode, PathNode, StringNode,
    VariableNode,
};
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{excerpt_at, Error, Result};

/// Longest accepted path, in segments
pub const MAX_PATH_SEGMENTS: usize = 256;

/// Parse every `${...}` in `input`, in order of appearance
///
/// Text without expressions yields an empty list. Any error aborts the whole parse.
pub fn parse(input: &str) -> Result<Vec<ExpressionNode>> {
    Parser::new(input).parse()
}

/// Parse `input` which may contain at most one expression
pub fn parse_single(input: &str) -> Result<Option<ExpressionNode>> {
    let mut expressions = parse(input)?;
    match expressions.len() {
        0 | 1 => Ok(expressions.pop()),
        count => Err(Error::MultipleTopLevelExpressions { count }),
    }
}

pub struct Parser<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    /// tokens handed back by `backup`, most recent last
    pushback: Vec<Token>,
    /// end offset of the last consumed token
    last_end: usize,
    /// `last_end` before the most recent `next`, restored by `backup`
    prev_end: usize,
}

impl<'a> Parser<'a> {
    const PUSHBACK: usize = 2;

    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            lexer: Lexer::new(input),
            pushback: Vec::with_capacity(Self::PUSHBACK),
            last_end: 0,
            prev_end: 0,
        }
    }

    pub fn parse(mut self) -> Result<Vec<ExpressionNode>> {
        let mut expressions = vec![];

        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::LeftDelim => expressions.push(self.expression(token)?),
                _ => return Err(self.unexpected(&token, "expected '${'")),
            }
        }

        tracing::trace!(count = expressions.len(), "parsed expressions");
        Ok(expressions)
    }

    /// Next token, lexer errors become [Error::Lex]
    fn next(&mut self) -> Result<Token> {
        let token = match self.pushback.pop() {
            Some(token) => token,
            None => self.lexer.next().unwrap_or_else(|| Token {
                kind: TokenKind::Eof,
                offset: self.input.len(),
                literal: String::new(),
            }),
        };

        if let TokenKind::Error(kind) = token.kind {
            return Err(Error::Lex {
                kind,
                offset: token.offset,
                excerpt: excerpt_at(self.input, token.offset),
            });
        }

        self.prev_end = self.last_end;
        self.last_end = token.end();
        Ok(token)
    }

    fn backup(&mut self, token: Token) {
        debug_assert!(self.pushback.len() < Self::PUSHBACK, "pushback buffer full");
        self.last_end = self.prev_end;
        self.pushback.push(token);
    }

    fn peek(&mut self) -> Result<TokenKind> {
        let token = self.next()?;
        let kind = token.kind;
        self.backup(token);
        Ok(kind)
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token> {
        let token = self.next()?;
        if token.kind != kind {
            return Err(self.unexpected(&token, message));
        }
        Ok(token)
    }

    fn unexpected(&self, token: &Token, message: &str) -> Error {
        Error::Parse {
            message: message.to_string(),
            token: token.to_string(),
            offset: token.offset,
            excerpt: excerpt_at(self.input, token.offset),
        }
    }

    /// `'${' body '}'`, the opening delimiter was already consumed
    fn expression(&mut self, open: Token) -> Result<ExpressionNode> {
        let node = self.body()?;
        let close = self.expect(TokenKind::RightDelim, "expected '}'")?;

        let source = &self.input[open.offset..close.end()];
        Ok(ExpressionNode::new(node, source))
    }

    fn body(&mut self) -> Result<Node> {
        let token = self.next()?;
        match token.kind {
            TokenKind::VariableSigil => self.inline_variable(),
            TokenKind::Identifier => match self.peek()? {
                TokenKind::LeftParen => self.call(token),
                TokenKind::PathSeparator => self.path(token),
                TokenKind::RightDelim => Ok(Node::Variable(VariableNode {
                    name: token.literal,
                })),
                _ => {
                    let next = self.next()?;
                    Err(self.unexpected(&next, "expected '(', ':' or '}' after identifier"))
                }
            },
            _ => Err(self.unexpected(&token, "expected variable, path or function call")),
        }
    }

    /// `IDENT` after a consumed `$`
    fn inline_variable(&mut self) -> Result<Node> {
        let name = self.expect(TokenKind::Identifier, "expected variable name after '$'")?;
        Ok(Node::Variable(VariableNode { name: name.literal }))
    }

    /// `(':' segment)+` after the consumed head identifier
    fn path(&mut self, head: Token) -> Result<Node> {
        let mut segments = vec![Node::Identifier(IdentifierNode { name: head.literal })];

        loop {
            let separator = self.next()?;
            if separator.kind != TokenKind::PathSeparator {
                self.backup(separator);
                break;
            }

            let segment = self.next()?;
            let node = match segment.kind {
                TokenKind::Identifier => Node::Identifier(IdentifierNode {
                    name: segment.literal,
                }),
                TokenKind::Number if is_index(&segment.literal) => {
                    Node::Identifier(IdentifierNode {
                        name: segment.literal,
                    })
                }
                TokenKind::VariableSigil => self.inline_variable()?,
                _ => return Err(self.unexpected(&segment, "expected path segment")),
            };

            segments.push(node);
            if segments.len() > MAX_PATH_SEGMENTS {
                return Err(Error::PathTooLong {
                    max: MAX_PATH_SEGMENTS,
                    offset: segment.offset,
                    excerpt: excerpt_at(self.input, segment.offset),
                });
            }
        }

        Ok(Node::Path(PathNode { segments }))
    }

    /// `'(' arg_list ')' ('||' alternative)?` after the consumed function name
    fn call(&mut self, function: Token) -> Result<Node> {
        self.expect(TokenKind::LeftParen, "expected '('")?;

        let mut args = vec![];
        if self.peek()? == TokenKind::RightParen {
            self.next()?;
        } else {
            loop {
                args.push(self.arg()?);

                let token = self.next()?;
                match token.kind {
                    TokenKind::Comma => continue,
                    TokenKind::RightParen => break,
                    _ => return Err(self.unexpected(&token, "expected ',' or ')'")),
                }
            }
        }

        let alternative = if self.peek()? == TokenKind::DoublePipe {
            self.next()?;
            Some(Box::new(self.alternative()?))
        } else {
            None
        };

        Ok(Node::Call(CallNode {
            function: IdentifierNode {
                name: function.literal,
            },
            args,
            alternative,
        }))
    }

    /// Either a delimited expression or a bare body
    fn alternative(&mut self) -> Result<ExpressionNode> {
        let token = self.next()?;
        if token.kind == TokenKind::LeftDelim {
            return self.expression(token);
        }

        let start = token.offset;
        self.backup(token);
        let node = self.body()?;

        let source = &self.input[start..self.last_end];
        Ok(ExpressionNode::new(node, source))
    }

    fn arg(&mut self) -> Result<Node> {
        let token = self.next()?;
        match token.kind {
            TokenKind::String => Ok(Node::String(StringNode {
                value: token.literal,
            })),
            TokenKind::Number => Ok(Node::Number(NumberNode::new(token.literal))),
            TokenKind::VariableSigil => self.inline_variable(),
            TokenKind::Identifier => match self.peek()? {
                TokenKind::LeftParen => self.call(token),
                TokenKind::PathSeparator => self.path(token),
                _ => {
                    let next = self.next()?;
                    Err(self.unexpected(&next, "expected '(' or ':' after identifier"))
                }
            },
            _ => Err(self.unexpected(&token, "expected argument")),
        }
    }
}

fn is_index(literal: &str) -> bool {
    !literal.is_empty() && literal.bytes().all(|b| b.is_ascii_digit())
}
