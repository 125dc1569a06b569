//! Script tokenizer.
//!
//! Works on raw bytes and tracks the 1-based line of every token for error
//! reporting. String literals stay byte strings; scripts are not required
//! to be valid UTF-8 inside quotes.

use crate::error::{VmError, VmResult};

/// Piece of a double-quoted string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplatePart {
    /// Literal bytes after escape processing.
    Text(Vec<u8>),
    /// `$name` reference.
    Var(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Variable(String),
    Ident(String),
    Int(i64),
    Real(f64),
    Str(Vec<u8>),
    Template(Vec<TemplatePart>),

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Question,
    FatArrow,
    Dot,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    DotDot,
    PlusPlus,
    MinusMinus,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    DotDotAssign,

    Eq,
    Ne,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,

    Eof,
}

impl TokenKind {
    /// Human readable form for error messages.
    pub(crate) fn describe(&self) -> String {
        let text = match self {
            Self::Variable(name) => return format!("variable ${name}"),
            Self::Ident(name) => return format!("'{name}'"),
            Self::Int(i) => return format!("number {i}"),
            Self::Real(r) => return format!("number {r}"),
            Self::Str(_) | Self::Template(_) => "string literal",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Comma => "','",
            Self::Semi => "';'",
            Self::Colon => "':'",
            Self::Question => "'?'",
            Self::FatArrow => "'=>'",
            Self::Dot => "'.'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::DotDot => "'..'",
            Self::PlusPlus => "'++'",
            Self::MinusMinus => "'--'",
            Self::Assign => "'='",
            Self::PlusAssign => "'+='",
            Self::MinusAssign => "'-='",
            Self::StarAssign => "'*='",
            Self::SlashAssign => "'/='",
            Self::PercentAssign => "'%='",
            Self::DotDotAssign => "'..='",
            Self::Eq => "'=='",
            Self::Ne => "'!='",
            Self::Identical => "'==='",
            Self::NotIdentical => "'!=='",
            Self::Lt => "'<'",
            Self::Le => "'<='",
            Self::Gt => "'>'",
            Self::Ge => "'>='",
            Self::AndAnd => "'&&'",
            Self::OrOr => "'||'",
            Self::Bang => "'!'",
            Self::Eof => "end of script",
        };
        text.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

pub(crate) struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    /// Tokenizes the whole source. The last token is always `Eof`.
    pub(crate) fn tokenize(source: &str) -> VmResult<Vec<Token>> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> VmError {
        VmError::compile(self.line, message)
    }

    fn skip_trivia(&mut self) -> VmResult<()> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'#') => self.skip_line(),
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.skip_line(),
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.line;
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            Some(b'*') if self.eat(b'/') => break,
                            Some(_) => {}
                            None => {
                                return Err(VmError::compile(start, "unterminated comment"));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> VmResult<Token> {
        self.skip_trivia()?;
        let line = self.line;
        let Some(ch) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
            });
        };

        let kind = match ch {
            b'$' => {
                let name = self.name();
                if name.is_empty() {
                    return Err(self.error("expected a variable name after '$'"));
                }
                TokenKind::Variable(name)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.pos -= 1;
                TokenKind::Ident(self.name())
            }
            b'0'..=b'9' => {
                self.pos -= 1;
                self.number()?
            }
            b'\'' => self.single_quoted()?,
            b'"' => self.double_quoted()?,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semi,
            b':' => TokenKind::Colon,
            b'?' => TokenKind::Question,
            b'.' => {
                if self.eat(b'.') {
                    if self.eat(b'=') {
                        TokenKind::DotDotAssign
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    TokenKind::Dot
                }
            }
            b'+' => {
                if self.eat(b'+') {
                    TokenKind::PlusPlus
                } else if self.eat(b'=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.eat(b'-') {
                    TokenKind::MinusMinus
                } else if self.eat(b'=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => self.with_assign(TokenKind::Star, TokenKind::StarAssign),
            b'/' => self.with_assign(TokenKind::Slash, TokenKind::SlashAssign),
            b'%' => self.with_assign(TokenKind::Percent, TokenKind::PercentAssign),
            b'=' => {
                if self.eat(b'>') {
                    TokenKind::FatArrow
                } else if self.eat(b'=') {
                    if self.eat(b'=') {
                        TokenKind::Identical
                    } else {
                        TokenKind::Eq
                    }
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    if self.eat(b'=') {
                        TokenKind::NotIdentical
                    } else {
                        TokenKind::Ne
                    }
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => self.with_assign(TokenKind::Lt, TokenKind::Le),
            b'>' => self.with_assign(TokenKind::Gt, TokenKind::Ge),
            b'&' if self.eat(b'&') => TokenKind::AndAnd,
            b'|' if self.eat(b'|') => TokenKind::OrOr,
            other => {
                return Err(self.error(format!(
                    "unexpected character '{}'",
                    char::from(other).escape_default()
                )))
            }
        };
        Ok(Token { kind, line })
    }

    fn with_assign(&mut self, plain: TokenKind, assign: TokenKind) -> TokenKind {
        if self.eat(b'=') {
            assign
        } else {
            plain
        }
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        if matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'_')) {
            while matches!(
                self.peek(),
                Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')
            ) {
                self.pos += 1;
            }
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn number(&mut self) -> VmResult<TokenKind> {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.pos += 2;
            let digits = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let text = String::from_utf8_lossy(&self.src[digits..self.pos]).into_owned();
            return i64::from_str_radix(&text, 16)
                .map(TokenKind::Int)
                .map_err(|_| self.error(format!("invalid hex literal 0x{text}")));
        }

        let mut real = false;
        self.digits();
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            real = true;
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                real = true;
                self.pos += 1 + sign;
                self.digits();
            }
        }

        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        if !real {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(TokenKind::Int(i));
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Real)
            .map_err(|_| self.error(format!("invalid number {text}")))
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn single_quoted(&mut self) -> VmResult<TokenKind> {
        let start = self.line;
        let mut out = Vec::new();
        loop {
            match self.bump() {
                Some(b'\'') => return Ok(TokenKind::Str(out)),
                Some(b'\\') if matches!(self.peek(), Some(b'\'' | b'\\')) => {
                    out.extend(self.bump());
                }
                Some(ch) => out.push(ch),
                None => return Err(VmError::compile(start, "unterminated string")),
            }
        }
    }

    fn double_quoted(&mut self) -> VmResult<TokenKind> {
        let start = self.line;
        let mut parts = Vec::new();
        let mut text = Vec::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => self.escape(&mut text),
                Some(b'$')
                    if matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'_')) =>
                {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(TemplatePart::Var(self.name()));
                }
                Some(ch) => text.push(ch),
                None => return Err(VmError::compile(start, "unterminated string")),
            }
        }
        if parts.is_empty() {
            return Ok(TokenKind::Str(text));
        }
        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(TokenKind::Template(parts))
    }

    fn escape(&mut self, out: &mut Vec<u8>) {
        let Some(ch) = self.bump() else {
            out.push(b'\\');
            return;
        };
        match ch {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'0' => out.push(0),
            b'\\' | b'"' | b'$' => out.push(ch),
            b'x' => {
                let hex: Vec<u8> = (0..2)
                    .map_while(|i| self.peek_at(i).filter(u8::is_ascii_hexdigit))
                    .collect();
                match std::str::from_utf8(&hex)
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                {
                    Some(byte) => {
                        self.pos += hex.len();
                        out.push(byte);
                    }
                    None => out.extend_from_slice(b"\\x"),
                }
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
}
