use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at {line}:{column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at {line}:{column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Unterminated block comment at {line}:{column}")]
    UnterminatedComment { line: usize, column: usize },
}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
    // Kind of the last emitted token, for automatic semicolon insertion.
    prev: Option<TokenKind<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            line_start: 0,
            prev: None,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        let token = self.scan()?;
        self.prev = Some(token.kind);
        Ok(token)
    }

    fn scan(&mut self) -> LexResult<Token<'a>> {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.consume_char();
                }
                Some('\n') => {
                    let start = self.pos;
                    let span = self.span_at(start, start + 1);
                    self.consume_char();
                    self.line += 1;
                    self.line_start = self.pos;
                    if self.wants_semicolon() {
                        return Ok(Token::new(TokenKind::Semi, span));
                    }
                }
                Some('/') if self.char_at(self.pos + 1) == Some('/') => {
                    self.consume_while(|c| c != '\n');
                }
                Some('/') if self.char_at(self.pos + 1) == Some('*') => {
                    self.skip_block_comment()?;
                }
                Some(_) => return self.read_token(),
                None => {
                    let index = self.pos;
                    let span = self.span_at(index, index);
                    if self.wants_semicolon() {
                        return Ok(Token::new(TokenKind::Semi, span));
                    }
                    return Ok(Token::new(TokenKind::EOF, span));
                }
            }
        }
    }

    // Go's rule: a line end terminates a statement when the last token could
    // end one.
    fn wants_semicolon(&self) -> bool {
        matches!(
            self.prev,
            Some(
                TokenKind::Ident(_)
                    | TokenKind::Int(_)
                    | TokenKind::Str(_)
                    | TokenKind::Return
                    | TokenKind::Break
                    | TokenKind::Continue
                    | TokenKind::Fallthrough
                    | TokenKind::Inc
                    | TokenKind::Dec
                    | TokenKind::RParen
                    | TokenKind::RBrace
                    | TokenKind::RBrack
            )
        )
    }

    fn skip_block_comment(&mut self) -> LexResult<()> {
        let start = self.pos;
        let span = self.span_at(start, start);
        self.consume_char();
        self.consume_char();
        loop {
            match self.peek_char() {
                Some('*') if self.char_at(self.pos + 1) == Some('/') => {
                    self.consume_char();
                    self.consume_char();
                    return Ok(());
                }
                Some('\n') => {
                    self.consume_char();
                    self.line += 1;
                    self.line_start = self.pos;
                }
                Some(_) => {
                    self.consume_char();
                }
                None => {
                    return Err(LexError::UnterminatedComment {
                        line: span.line,
                        column: span.column,
                    });
                }
            }
        }
    }

    fn read_token(&mut self) -> LexResult<Token<'a>> {
        let start = self.pos;
        let ch = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::EOF, self.span_at(start, start))),
        };

        if let Some(token) = self.try_operator(ch, start) {
            return Ok(token);
        }

        match ch {
            '"' => self.read_string(start),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier(start)),
            c if c.is_ascii_digit() => Ok(self.read_number(start)),
            _ => {
                let span = self.span_at(start, start);
                Err(LexError::UnexpectedCharacter {
                    character: ch,
                    line: span.line,
                    column: span.column,
                })
            }
        }
    }

    fn try_operator(&mut self, ch: char, start: usize) -> Option<Token<'a>> {
        let next = self.char_at(start + 1);
        let (kind, len) = match ch {
            '=' if next == Some('=') => (TokenKind::Eql, 2),
            '=' => (TokenKind::Assign, 1),
            ':' if next == Some('=') => (TokenKind::Define, 2),
            '+' if next == Some('+') => (TokenKind::Inc, 2),
            '+' => (TokenKind::Plus, 1),
            '-' if next == Some('-') => (TokenKind::Dec, 2),
            '-' => (TokenKind::Minus, 1),
            '&' => (TokenKind::Amp, 1),
            '>' => (TokenKind::Gtr, 1),
            '<' => (TokenKind::Lss, 1),
            ',' => (TokenKind::Comma, 1),
            '.' => (TokenKind::Dot, 1),
            ';' => (TokenKind::Semi, 1),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '{' => (TokenKind::LBrace, 1),
            '}' => (TokenKind::RBrace, 1),
            '[' => (TokenKind::LBrack, 1),
            ']' => (TokenKind::RBrack, 1),
            _ => return None,
        };

        for _ in 0..len {
            self.consume_char();
        }
        Some(Token::new(kind, self.span_at(start, start + len)))
    }

    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        self.consume_while(|c| c.is_alphanumeric() || c == '_');
        let end = self.pos;

        let ident = &self.input[start..end];
        let kind = match ident {
            "package" => TokenKind::Package,
            "import" => TokenKind::Import,
            "func" => TokenKind::Func,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "range" => TokenKind::Range,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "goto" => TokenKind::Goto,
            "fallthrough" => TokenKind::Fallthrough,
            "var" => TokenKind::Var,
            _ => TokenKind::Ident(ident),
        };
        Token::new(kind, self.span_at(start, end))
    }

    // Grabs the whole alphanumeric run so base prefixes like 0x1f stay in one
    // lexeme; lowering decides whether it parses as an integer.
    fn read_number(&mut self, start: usize) -> Token<'a> {
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let end = self.pos;
        Token::new(TokenKind::Int(&self.input[start..end]), self.span_at(start, end))
    }

    fn read_string(&mut self, start: usize) -> LexResult<Token<'a>> {
        let span = self.span_at(start, start);
        self.consume_char(); // opening quote
        loop {
            match self.peek_char() {
                Some('"') => {
                    self.consume_char();
                    let end = self.pos;
                    return Ok(Token::new(
                        TokenKind::Str(&self.input[start..end]),
                        self.span_at(start, end),
                    ));
                }
                Some('\\') => {
                    self.consume_char();
                    self.consume_char();
                }
                Some('\n') | None => {
                    return Err(LexError::UnterminatedString {
                        line: span.line,
                        column: span.column,
                    });
                }
                Some(_) => {
                    self.consume_char();
                }
            }
        }
    }

    fn span_at(&self, start: usize, end: usize) -> Span {
        Span {
            start,
            end,
            line: self.line,
            column: start - self.line_start + 1,
        }
    }

    fn consume_while<P>(&mut self, keep: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !keep(c) {
                break;
            }
            self.consume_char();
        }
        self.pos - start
    }

    fn char_at(&self, index: usize) -> Option<char> {
        if index >= self.input.len() {
            None
        } else {
            self.input[index..].chars().next()
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.char_at(self.pos)
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) => Some(Ok(token)),
            Err(e) => Some(Err(e)),
        }
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
