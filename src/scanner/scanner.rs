use std::io::BufRead;

use crate::util::{Location, Source};

use super::keywords::KEYWORDS;
use super::result::{ScanErr, ScanErrKind, ScanTokensResult};
use super::token::{StringPart, Token, TokenWithLocation};

/// Turns source text into a flat stream of located tokens.
///
/// Grounded on the teacher's `Source<T>` line-buffered character queue
/// (kept as-is in `util/source.rs`); the word/identifier classification
/// and escape-sequence handling are this language's own.
pub struct Scanner<T>
where
    T: BufRead,
{
    source: Source<T>,
}

impl<T> Scanner<T>
where
    T: BufRead,
{
    pub fn new(source: Source<T>) -> Self {
        Self { source }
    }

    pub fn scan(mut self) -> ScanTokensResult {
        let mut tokens = Vec::new();
        loop {
            match self.next_token()? {
                Some(t) => {
                    let is_eof = matches!(t.token, Token::EndOfInput);
                    tokens.push(t);
                    if is_eof {
                        break;
                    }
                }
                None => continue,
            }
        }
        Ok(tokens)
    }

    fn loc(&self) -> Location {
        self.source.location()
    }

    fn next_token(&mut self) -> Result<Option<TokenWithLocation>, ScanErr> {
        let start = self.loc();

        let c = match self.source.next() {
            Some(c) => c,
            None => return Ok(Some(TokenWithLocation::new(Token::EndOfInput, start, start))),
        };

        let token = match c {
            ' ' | '\t' | '\r' => return Ok(None),
            '\n' => Token::Newline,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '[' => Token::LeftSquareBracket,
            ']' => Token::RightSquareBracket,

            '#' => {
                let mut text = String::new();
                while let Some(&next) = self.source.peek() {
                    if next == '\n' {
                        break;
                    }
                    text.push(self.source.next().unwrap());
                }
                Token::Comment(text)
            }

            '"' => self.scan_string(start)?,

            '+' => self.scan_maybe_equal(Token::Plus, Token::PlusEqual),
            '-' => self.scan_maybe_equal(Token::Minus, Token::MinusEqual),
            '*' => self.scan_maybe_equal(Token::Star, Token::StarEqual),
            '/' => self.scan_maybe_equal(Token::Slash, Token::SlashEqual),
            '\\' => self.scan_maybe_equal(Token::Backslash, Token::BackslashEqual),
            '%' => self.scan_maybe_equal(Token::Percent, Token::PercentEqual),

            '=' => self.scan_maybe_equal(Token::Equal, Token::EqualEqual),
            '!' => {
                if self.source.next_if(|&c| c == '=').is_some() {
                    Token::NotEqual
                } else {
                    return Err(ScanErr::new(ScanErrKind::UnexpectedCharacter('!'), start));
                }
            }

            c if c.is_ascii_digit() => self.scan_number(c, start)?,

            c if is_ident_start(c) => self.scan_word(c),

            c => return Err(ScanErr::new(ScanErrKind::UnexpectedCharacter(c), start)),
        };

        let end = self.loc();
        Ok(Some(TokenWithLocation::new(token, start, end)))
    }

    fn scan_maybe_equal(&mut self, plain: Token, with_equal: Token) -> Token {
        if self.source.next_if(|&c| c == '=').is_some() {
            with_equal
        } else {
            plain
        }
    }

    fn scan_word(&mut self, first: char) -> Token {
        let mut word = String::new();
        word.push(first);
        while let Some(&c) = self.source.peek() {
            if is_ident_continue(c) {
                word.push(self.source.next().unwrap());
            } else {
                break;
            }
        }

        // `або якщо` (else-if) is the one two-word keyword; the parser
        // recognizes it as a plain `Else` immediately followed by `If`,
        // so no special-casing is needed here.
        match KEYWORDS.get(word.as_str()) {
            Some(tok) => tok.clone(),
            None => Token::Identifier(word),
        }
    }

    fn scan_number(&mut self, first: char, start: Location) -> Result<Token, ScanErr> {
        let mut text = String::new();
        text.push(first);
        let mut is_float = false;
        while let Some(&c) = self.source.peek() {
            if c.is_ascii_digit() {
                text.push(self.source.next().unwrap());
            } else if c == '.' && !is_float {
                is_float = true;
                text.push(self.source.next().unwrap());
            } else {
                break;
            }
        }
        if is_float {
            if text.parse::<f64>().is_err() {
                return Err(ScanErr::new(ScanErrKind::InvalidNumber(text), start));
            }
            Ok(Token::Float(text))
        } else {
            if text.parse::<i64>().is_err() {
                return Err(ScanErr::new(ScanErrKind::InvalidNumber(text), start));
            }
            Ok(Token::Int(text))
        }
    }

    /// Scans a double-quoted string literal, splitting it into literal
    /// and `${...}` interpolation-group parts using the same two-pointer
    /// technique the teacher's post-hoc format-string scanner used,
    /// promoted here to a first-class part of literal scanning.
    fn scan_string(&mut self, start: Location) -> Result<Token, ScanErr> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            let c = match self.source.next() {
                Some(c) => c,
                None => return Err(ScanErr::new(ScanErrKind::UnterminatedString, start)),
            };
            match c {
                '"' => break,
                '\\' => {
                    let esc = self
                        .source
                        .next()
                        .ok_or_else(|| ScanErr::new(ScanErrKind::UnterminatedString, start))?;
                    literal.push(translate_escape(esc).ok_or_else(|| {
                        ScanErr::new(ScanErrKind::InvalidEscapeSequence(esc), self.loc())
                    })?);
                }
                '$' if self.source.peek() == Some(&'{') => {
                    self.source.next(); // consume '{'
                    if !literal.is_empty() {
                        parts.push(StringPart::Literal(std::mem::take(&mut literal)));
                    }
                    let mut group = String::new();
                    loop {
                        match self.source.next() {
                            Some('}') => break,
                            Some(c) => group.push(c),
                            None => {
                                return Err(ScanErr::new(ScanErrKind::UnterminatedGroup, start))
                            }
                        }
                    }
                    if group.trim().is_empty() {
                        return Err(ScanErr::new(ScanErrKind::EmptyGroup, start));
                    }
                    parts.push(StringPart::Group(group.trim().to_string()));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() || parts.is_empty() {
            parts.push(StringPart::Literal(literal));
        }
        Ok(Token::Str(parts))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Translates both Latin and Cyrillic escape-letter spellings to the
/// same byte, per §6.
fn translate_escape(c: char) -> Option<char> {
    Some(match c {
        '"' => '"',
        '\\' => '\\',
        'a' | 'а' => '\x07',
        'b' | 'б' => '\x08',
        'f' | 'ф' => '\x0c',
        'n' | 'н' => '\n',
        'r' | 'р' => '\r',
        't' | 'т' => '\t',
        'v' | 'в' => '\x0b',
        '0' => '\0',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan(text: &str) -> Vec<Token> {
        let source = Source::new(Cursor::new(text));
        let scanner = Scanner::new(source);
        scanner
            .scan()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .filter(|t| !matches!(t, Token::Newline))
            .collect()
    }

    #[test]
    fn scans_arithmetic() {
        let tokens = scan("1 + 2 * 3");
        assert_eq!(
            tokens,
            vec![
                Token::Int("1".into()),
                Token::Plus,
                Token::Int("2".into()),
                Token::Star,
                Token::Int("3".into()),
                Token::EndOfInput,
            ]
        );
    }

    #[test]
    fn scans_keywords() {
        let tokens = scan("якщо істина інакше хиба кінець");
        assert_eq!(
            tokens,
            vec![
                Token::If,
                Token::True,
                Token::Else,
                Token::False,
                Token::End,
                Token::EndOfInput,
            ]
        );
    }

    #[test]
    fn scans_string_with_interpolation() {
        let tokens = scan("\"a${1}b\"");
        assert_eq!(
            tokens,
            vec![
                Token::Str(vec![
                    StringPart::Literal("a".into()),
                    StringPart::Group("1".into()),
                    StringPart::Literal("b".into()),
                ]),
                Token::EndOfInput,
            ]
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        let source = Source::new(Cursor::new("\"abc"));
        let scanner = Scanner::new(source);
        assert!(scanner.scan().is_err());
    }

    #[test]
    fn floor_division_and_equal_forms() {
        let tokens = scan("a \\ b \\= c != d");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".into()),
                Token::Backslash,
                Token::Identifier("b".into()),
                Token::BackslashEqual,
                Token::Identifier("c".into()),
                Token::NotEqual,
                Token::Identifier("d".into()),
                Token::EndOfInput,
            ]
        );
    }
}
