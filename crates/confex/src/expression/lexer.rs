//! Tokenizer for `${...}` expressions embedded in arbitrary text
//!
//! Text outside of an expression is skipped: substitution later works on the original string, so
//! literal text never needs to reach the parser. Inside an expression the lexer tracks two kinds
//! of nesting: `${ ... }` delimiters and `( ... )` call groups. Every open delimiter level has its
//! own paren depth, an expression must not close while one of its call groups is still open.
//!
//! [Lexer] is a single-pass iterator. Once it yielded [TokenKind::Eof] or [TokenKind::Error] it
//! is exhausted; lex the input again to start over.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `${`
    LeftDelim,
    /// `}`
    RightDelim,
    LeftParen,
    RightParen,
    /// `:`
    PathSeparator,
    /// `$`
    VariableSigil,
    /// `||`
    DoublePipe,
    Comma,
    /// quoted string, the literal holds the text between the quotes
    String,
    Number,
    Identifier,
    Eof,
    Error(LexErrorKind),
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::LeftDelim => f.write_str("'${'"),
            TokenKind::RightDelim => f.write_str("'}'"),
            TokenKind::LeftParen => f.write_str("'('"),
            TokenKind::RightParen => f.write_str("')'"),
            TokenKind::PathSeparator => f.write_str("':'"),
            TokenKind::VariableSigil => f.write_str("'$'"),
            TokenKind::DoublePipe => f.write_str("'||'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::String => f.write_str("string"),
            TokenKind::Number => f.write_str("number"),
            TokenKind::Identifier => f.write_str("identifier"),
            TokenKind::Eof => f.write_str("end of input"),
            TokenKind::Error(kind) => write!(f, "error ({kind})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnterminatedString,
    UnclosedExpression,
    UnclosedParenthesis,
    UnbalancedParenthesis,
    IllegalCharacter(char),
}

impl std::fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErrorKind::UnterminatedString => f.write_str("unterminated string"),
            LexErrorKind::UnclosedExpression => f.write_str("unclosed expression"),
            LexErrorKind::UnclosedParenthesis => {
                f.write_str("expression closed with an open parenthesis")
            }
            LexErrorKind::UnbalancedParenthesis => f.write_str("unbalanced parenthesis"),
            LexErrorKind::IllegalCharacter(c) => write!(f, "illegal character {c:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// byte offset into the lexed input
    pub offset: usize,
    pub literal: String,
}

impl Token {
    fn new(kind: TokenKind, offset: usize, literal: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            literal: literal.into(),
        }
    }

    /// Byte offset right after the token's source text
    pub fn end(&self) -> usize {
        match self.kind {
            TokenKind::String => self.offset + self.literal.len() + 2,
            TokenKind::Eof | TokenKind::Error(_) => self.offset,
            _ => self.offset + self.literal.len(),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::String | TokenKind::Number | TokenKind::Identifier => {
                write!(f, "{} {:?}", self.kind, self.literal)
            }
            kind => kind.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Expression,
    Done,
}

#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    state: State,
    /// open paren count for each open `${`
    paren_depth: Vec<usize>,
}

pub fn lex(input: &str) -> Lexer<'_> {
    Lexer::new(input)
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            state: State::Text,
            paren_depth: Vec::new(),
        }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn emit(&mut self, kind: TokenKind, len: usize) -> Token {
        let token = Token::new(kind, self.pos, &self.input[self.pos..self.pos + len]);
        self.pos += len;
        token
    }

    fn fail(&mut self, kind: LexErrorKind, offset: usize) -> Token {
        self.state = State::Done;
        Token::new(TokenKind::Error(kind), offset, kind.to_string())
    }

    fn lex_text(&mut self) -> Token {
        match self.rest().find("${") {
            Some(start) => {
                self.pos += start;
                self.state = State::Expression;
                self.paren_depth.push(0);
                self.emit(TokenKind::LeftDelim, 2)
            }
            None => {
                self.pos = self.input.len();
                self.state = State::Done;
                Token::new(TokenKind::Eof, self.pos, "")
            }
        }
    }

    fn lex_expression(&mut self) -> Token {
        let skipped = self.rest().len() - self.rest().trim_start().len();
        self.pos += skipped;

        let Some(c) = self.peek_char() else {
            let offset = self.pos;
            return self.fail(LexErrorKind::UnclosedExpression, offset);
        };

        match c {
            '$' if self.rest().starts_with("${") => {
                self.paren_depth.push(0);
                self.emit(TokenKind::LeftDelim, 2)
            }
            '$' => self.emit(TokenKind::VariableSigil, 1),
            '}' => self.close_delimiter(),
            '(' => {
                if let Some(depth) = self.paren_depth.last_mut() {
                    *depth += 1;
                }
                self.emit(TokenKind::LeftParen, 1)
            }
            ')' => match self.paren_depth.last_mut() {
                Some(depth) if *depth > 0 => {
                    *depth -= 1;
                    self.emit(TokenKind::RightParen, 1)
                }
                _ => {
                    let offset = self.pos;
                    self.fail(LexErrorKind::UnbalancedParenthesis, offset)
                }
            },
            ':' => self.emit(TokenKind::PathSeparator, 1),
            ',' => self.emit(TokenKind::Comma, 1),
            '|' if self.rest().starts_with("||") => self.emit(TokenKind::DoublePipe, 2),
            '"' | '\'' => self.lex_string(c),
            '+' | '-' | '.' | '0'..='9' => self.lex_number(),
            c if is_word_char(c) => {
                let len = word_len(self.rest());
                self.emit(TokenKind::Identifier, len)
            }
            c => {
                let offset = self.pos;
                self.fail(LexErrorKind::IllegalCharacter(c), offset)
            }
        }
    }

    fn close_delimiter(&mut self) -> Token {
        if self.paren_depth.last().copied().unwrap_or_default() > 0 {
            let offset = self.pos;
            return self.fail(LexErrorKind::UnclosedParenthesis, offset);
        }

        self.paren_depth.pop();
        if self.paren_depth.is_empty() {
            self.state = State::Text;
        }
        self.emit(TokenKind::RightDelim, 1)
    }

    /// No escape processing, the next quote of the same kind ends the string
    fn lex_string(&mut self, quote: char) -> Token {
        let start = self.pos;
        let Some(len) = self.rest()[1..].find(quote) else {
            return self.fail(LexErrorKind::UnterminatedString, start);
        };

        self.pos += len + 2;
        Token::new(TokenKind::String, start, &self.input[start + 1..start + 1 + len])
    }

    /// `[+-]?(digits[.digits*] | .digits)`; an unsigned digit run that continues with word
    /// characters (`1st`) is an identifier instead
    fn lex_number(&mut self) -> Token {
        let rest = self.rest();
        let bytes = rest.as_bytes();

        let mut len = 0;
        if matches!(bytes.first(), Some(b'+' | b'-')) {
            len += 1;
        }
        let sign_len = len;

        let int_digits = count_digits(&bytes[len..]);
        len += int_digits;

        let mut frac_digits = 0;
        if bytes.get(len) == Some(&b'.') {
            frac_digits = count_digits(&bytes[len + 1..]);
            if int_digits > 0 || frac_digits > 0 {
                len += 1 + frac_digits;
            }
        }

        if int_digits == 0 && frac_digits == 0 {
            let offset = self.pos;
            let c = rest.chars().next().unwrap_or_default();
            return self.fail(LexErrorKind::IllegalCharacter(c), offset);
        }

        if sign_len == 0 && frac_digits == 0 && rest[len..].starts_with(is_word_char) {
            let len = word_len(rest);
            return self.emit(TokenKind::Identifier, len);
        }

        self.emit(TokenKind::Number, len)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = match self.state {
            State::Done => return None,
            State::Text => self.lex_text(),
            State::Expression => self.lex_expression(),
        };

        tracing::trace!(?token, "lexed");
        Some(token)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn word_len(s: &str) -> usize {
    s.find(|c: char| !is_word_char(c)).unwrap_or(s.len())
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
