use std::fmt;

pub(crate) use crate::util::Location;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    EndOfInput,
    Newline,
    Semicolon,

    LeftParen,  // (
    RightParen, // )
    LeftSquareBracket,
    RightSquareBracket,

    Comma, // ,
    Colon, // :
    Dot,   // .

    // Literals
    True,  // істина
    False, // хиба
    Nil,   // нич
    Float(String),
    Int(String),
    Str(Vec<StringPart>), // already split into literal/interpolation parts

    // Arithmetic / assignment punctuation
    Equal,        // =
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Backslash,    // \  (integer floor division)
    Percent,      // %
    PlusEqual,    // +=
    MinusEqual,   // -=
    StarEqual,    // *=
    SlashEqual,   // /=
    BackslashEqual, // \=
    PercentEqual, // %=

    // Comparison
    EqualEqual,  // ==
    NotEqual,    // !=
    Greater,     // більше
    GreaterEqual, // більше=
    Less,        // менше
    LessEqual,   // менше=

    // Logical / identity keywords
    And,   // та
    Or,    // або
    Not,   // не
    Is,    // є

    // Structural keywords
    Let,      // нехай
    If,       // якщо
    Else,     // інакше
    End,      // кінець
    While,    // поки
    For,      // для
    Each,     // кожного
    In,       // в
    Break,    // завершити
    Continue, // продовжити
    Function, // функція
    Return,   // повернути
    Try,      // спробувати
    Catch,    // зловити
    Finally,  // нарешті
    Raise,    // викинути

    Identifier(String),

    Comment(String),
}

/// One part of a scanned string literal: either a literal run of
/// characters (with escapes already resolved) or an interpolation
/// group's raw source text, re-scanned and parsed as a nested
/// expression by the parser.
#[derive(Clone, Debug, PartialEq)]
pub enum StringPart {
    Literal(String),
    Group(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TokenWithLocation {
    pub token: Token,
    pub start: Location,
    pub end: Location,
}

impl TokenWithLocation {
    pub fn new(token: Token, start: Location, end: Location) -> Self {
        Self { token, start, end }
    }
}

impl fmt::Display for TokenWithLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token {} -> {} {:?}", self.start, self.end, self.token)
    }
}
