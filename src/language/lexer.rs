use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    indents: Vec<usize>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
            indents: vec![0],
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while self.current.is_some() {
            self.lex_line_start();
            if self.current.is_none() {
                break;
            }
            let line_tokens = self.tokens.len();
            while let Some(ch) = self.current {
                match ch {
                    '\n' => break,
                    '#' => self.eat_comment(),
                    ' ' | '\t' | '\r' => {
                        self.bump();
                    }
                    ch if ch.is_ascii_alphabetic() || ch == '_' => self.lex_identifier(),
                    ch if ch.is_ascii_digit() => self.lex_number(),
                    '\'' | '"' => self.lex_string(),
                    _ => self.lex_symbol(),
                }
            }
            if self.tokens.len() > line_tokens {
                self.push_token(TokenKind::Newline, self.offset, self.offset);
            }
            if self.current == Some('\n') {
                self.bump();
            }
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_token(TokenKind::Dedent, self.offset, self.offset);
        }
        self.push_token(TokenKind::Eof, self.offset, self.offset);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    // Measures the indentation of the next non-blank line and emits
    // Indent/Dedent tokens against the stack of open widths.
    fn lex_line_start(&mut self) {
        loop {
            let start = self.offset;
            let mut width = 0usize;
            while self.current == Some(' ') {
                width += 1;
                self.bump();
            }
            if self.current == Some('\t') {
                self.error(
                    self.offset,
                    self.offset + 1,
                    "Tabs are not allowed in indentation",
                );
                while matches!(self.current, Some('\t') | Some(' ')) {
                    self.bump();
                }
            }
            match self.current {
                Some('\n') | Some('\r') => {
                    self.bump();
                }
                Some('#') => {
                    self.eat_comment();
                }
                None => return,
                _ => {
                    self.apply_indent(width, start);
                    return;
                }
            }
        }
    }

    fn apply_indent(&mut self, width: usize, start: usize) {
        let mut current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push_token(TokenKind::Indent, start, self.offset);
            return;
        }
        while width < current {
            self.indents.pop();
            self.push_token(TokenKind::Dedent, start, self.offset);
            current = self.indents.last().copied().unwrap_or(0);
        }
        if width != current {
            self.error(start, self.offset, "Inconsistent indentation");
        }
    }

    fn eat_comment(&mut self) {
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }

        let end = self.offset;
        let slice = &self.src[start..end];
        let kind = match slice {
            "class" => TokenKind::Class,
            "def" => TokenKind::Def,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "print" => TokenKind::Print,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "None" => TokenKind::None,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            _ => TokenKind::Identifier(slice.to_string()),
        };
        self.push_token(kind, start, end);
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }

        let end = self.offset;
        let text = &self.src[start..end];
        match text.parse::<i64>() {
            Ok(value) => self.push_token(TokenKind::Number(value), start, end),
            Err(_) => self.error(start, end, "Invalid integer literal"),
        }
    }

    fn lex_string(&mut self) {
        let start = self.offset;
        let Some(quote) = self.current else {
            return;
        };
        self.bump();
        let mut value = String::new();
        while let Some(ch) = self.current {
            match ch {
                ch if ch == quote => {
                    self.bump();
                    self.push_token(TokenKind::String(value), start, self.offset);
                    return;
                }
                '\n' => break,
                '\\' => {
                    self.bump();
                    match self.current {
                        Some(escaped) => {
                            value.push(match escaped {
                                'n' => '\n',
                                'r' => '\r',
                                't' => '\t',
                                '\\' => '\\',
                                '\'' => '\'',
                                '"' => '"',
                                other => other,
                            });
                            self.bump();
                        }
                        None => break,
                    }
                }
                _ => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated string literal");
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        match self.current {
            Some('(') => self.single(TokenKind::LParen),
            Some(')') => self.single(TokenKind::RParen),
            Some(',') => self.single(TokenKind::Comma),
            Some('.') => self.single(TokenKind::Dot),
            Some(':') => self.single(TokenKind::Colon),
            Some('+') => self.single(TokenKind::Plus),
            Some('-') => self.single(TokenKind::Minus),
            Some('*') => self.single(TokenKind::Star),
            Some('/') => self.single(TokenKind::Slash),
            Some('=') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::EqEq, start, self.offset);
                } else {
                    self.push_token(TokenKind::Eq, start, self.offset);
                }
            }
            Some('!') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::BangEq, start, self.offset);
                } else {
                    self.error(start, self.offset, "Unexpected character '!'");
                }
            }
            Some('<') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::LtEq, start, self.offset);
                } else {
                    self.push_token(TokenKind::Lt, start, self.offset);
                }
            }
            Some('>') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::GtEq, start, self.offset);
                } else {
                    self.push_token(TokenKind::Gt, start, self.offset);
                }
            }
            Some(ch) => {
                self.bump();
                self.error(start, self.offset, format!("Unexpected character '{}'", ch));
            }
            None => {}
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.offset;
        self.bump();
        self.push_token(kind, start, self.offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_a_simple_print_line() {
        assert_eq!(
            kinds("print 1 + 2\n"),
            vec![
                TokenKind::Print,
                TokenKind::Number(1),
                TokenKind::Plus,
                TokenKind::Number(2),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            kinds("x = None and True or not False\n"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Eq,
                TokenKind::None,
                TokenKind::And,
                TokenKind::True,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::False,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn emits_indent_and_dedent_for_blocks() {
        let source = "class A:\n  def f(self):\n    return 1\nx = 1\n";
        let kinds = kinds(source);
        let indents = kinds
            .iter()
            .filter(|kind| **kind == TokenKind::Indent)
            .count();
        let dedents = kinds
            .iter()
            .filter(|kind| **kind == TokenKind::Dedent)
            .count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
        // both blocks close before the trailing assignment
        let x_pos = kinds
            .iter()
            .position(|kind| *kind == TokenKind::Identifier("x".into()))
            .expect("x token");
        let last_dedent = kinds
            .iter()
            .rposition(|kind| *kind == TokenKind::Dedent)
            .expect("dedent token");
        assert!(last_dedent < x_pos);
    }

    #[test]
    fn closes_open_indents_at_end_of_input() {
        let source = "if x:\n  if y:\n    print 1\n";
        let kinds = kinds(source);
        assert_eq!(
            &kinds[kinds.len() - 3..],
            &[TokenKind::Dedent, TokenKind::Dedent, TokenKind::Eof]
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let source = "x = 1\n\n# a comment\n   \ny = 2\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Eq,
                TokenKind::Number(1),
                TokenKind::Newline,
                TokenKind::Identifier("y".into()),
                TokenKind::Eq,
                TokenKind::Number(2),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn trailing_comment_does_not_eat_the_newline() {
        assert_eq!(
            kinds("x = 1  # trailing\ny = 2\n"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Eq,
                TokenKind::Number(1),
                TokenKind::Newline,
                TokenKind::Identifier("y".into()),
                TokenKind::Eq,
                TokenKind::Number(2),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_strings_with_both_quotes_and_escapes() {
        assert_eq!(
            kinds("s = 'it\\'s' + \"a\\nb\"\n"),
            vec![
                TokenKind::Identifier("s".into()),
                TokenKind::Eq,
                TokenKind::String("it's".into()),
                TokenKind::Plus,
                TokenKind::String("a\nb".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_comparison_operators() {
        assert_eq!(
            kinds("a == b != c <= d >= e < f > g\n"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::EqEq,
                TokenKind::Identifier("b".into()),
                TokenKind::BangEq,
                TokenKind::Identifier("c".into()),
                TokenKind::LtEq,
                TokenKind::Identifier("d".into()),
                TokenKind::GtEq,
                TokenKind::Identifier("e".into()),
                TokenKind::Lt,
                TokenKind::Identifier("f".into()),
                TokenKind::Gt,
                TokenKind::Identifier("g".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rejects_inconsistent_indentation() {
        let errors = lex("if x:\n    print 1\n  print 2\n").expect_err("should fail");
        assert!(
            errors
                .iter()
                .any(|err| err.message.contains("Inconsistent indentation"))
        );
    }

    #[test]
    fn rejects_unterminated_strings() {
        let errors = lex("s = 'oops\n").expect_err("should fail");
        assert!(
            errors
                .iter()
                .any(|err| err.message.contains("Unterminated string"))
        );
    }

    #[test]
    fn final_line_without_newline_still_terminates() {
        assert_eq!(
            kinds("print 1"),
            vec![
                TokenKind::Print,
                TokenKind::Number(1),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }
}
