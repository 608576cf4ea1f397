use std::fmt;

use crate::util::Location;

use super::TokenWithLocation;

pub(crate) type ScanResult = Result<TokenWithLocation, ScanErr>;
pub(crate) type ScanTokensResult = Result<Vec<TokenWithLocation>, ScanErr>;

#[derive(Debug)]
pub struct ScanErr {
    pub kind: ScanErrKind,
    pub location: Location,
}

impl ScanErr {
    pub fn new(kind: ScanErrKind, location: Location) -> Self {
        Self { kind, location }
    }
}

impl fmt::Display for ScanErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.location)
    }
}

impl std::error::Error for ScanErr {}

#[derive(Debug)]
pub enum ScanErrKind {
    UnexpectedCharacter(char),
    UnterminatedString,
    UnterminatedGroup,
    EmptyGroup,
    InvalidEscapeSequence(char),
    InvalidNumber(String),
}

impl fmt::Display for ScanErrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character: {c:?}"),
            Self::UnterminatedString => write!(f, "unterminated string"),
            Self::UnterminatedGroup => write!(f, "unterminated ${{...}} group"),
            Self::EmptyGroup => write!(f, "empty ${{...}} group"),
            Self::InvalidEscapeSequence(c) => write!(f, "invalid escape sequence: \\{c}"),
            Self::InvalidNumber(s) => write!(f, "invalid numeric literal: {s}"),
        }
    }
}
