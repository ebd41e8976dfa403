// A lexeme is the raw sequence of characters in the source code that
// represents a meaningful unit. A token is a categorized representation of
// a lexeme, pairing it with its type.

use crate::error::scan_error;
use crate::token::{Token, TokenType, KEYWORDS};

pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    pub had_error: bool,
}

impl Scanner {
    pub fn new(source: String) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            had_error: false,
        }
    }

    pub fn scan_tokens(&mut self) -> &Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.tokens.push(Token::new(TokenType::Eof, "", self.line));
        &self.tokens
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),

            '!' => {
                let tpe = if self.r#match('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(tpe);
            }
            '=' => {
                let tpe = if self.r#match('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(tpe);
            }
            '<' => {
                let tpe = if self.r#match('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(tpe);
            }
            '>' => {
                let tpe = if self.r#match('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(tpe);
            }

            '/' => {
                if self.r#match('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }

            ' ' | '\t' | '\r' => (),

            '\n' => self.line += 1,

            '"' => self.string(),

            c => {
                if c.is_ascii_digit() {
                    self.number();
                } else if c.is_ascii_alphabetic() || c == '_' {
                    self.identifier();
                } else {
                    self.error("Unexpected character.");
                }
            }
        }
    }

    // Consume characters until we reach the closing `"`. Lox strings may
    // span multiple lines; no escape processing is done.
    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.error("Unterminated string.");
            return;
        }

        // the closing "
        self.advance();

        let literal: String = self.source[(self.start + 1)..(self.current - 1)].iter().collect();
        self.add_token(TokenType::String { literal });
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let literal: f64 = self.source[self.start..self.current]
            .iter()
            .collect::<String>()
            .parse()
            .expect("a digit-only slice always parses as f64");

        self.add_token(TokenType::Number { literal });
    }

    fn identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let tpe = KEYWORDS.get(text.as_str()).cloned().unwrap_or(TokenType::Identifier);

        self.add_token(tpe);
    }

    fn advance(&mut self) -> char {
        self.current += 1;
        self.source[self.current - 1]
    }

    // Like advance but doesn't consume the next character.
    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(token_type, &text, self.line));
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    // Only consumes the current character if it is what we're looking for.
    fn r#match(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn error(&mut self, message: &str) {
        self.had_error = true;
        scan_error(self.line, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<TokenType> {
        let mut scanner = Scanner::new(source.to_string());
        scanner
            .scan_tokens()
            .iter()
            .map(|t| t.token_type.clone())
            .collect()
    }

    #[test]
    fn scans_single_and_double_char_tokens() {
        let types = scan("!= == <= >=");
        assert_eq!(
            types,
            vec![
                TokenType::BangEqual,
                TokenType::EqualEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn line_comments_are_discarded() {
        let types = scan("1 // a trailing comment\n2");
        assert_eq!(
            types,
            vec![
                TokenType::Number { literal: 1.0 },
                TokenType::Number { literal: 2.0 },
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_recognized_case_sensitively() {
        let types = scan("class Class");
        assert_eq!(
            types,
            vec![TokenType::Class, TokenType::Identifier, TokenType::Eof]
        );
    }

    #[test]
    fn unterminated_string_reports_an_error() {
        let mut scanner = Scanner::new("\"never closed".to_string());
        scanner.scan_tokens();
        assert!(scanner.had_error);
    }
}
