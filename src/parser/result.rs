use std::fmt;

use crate::ast::Module;
use crate::scanner::{ScanErr, TokenWithLocation};

pub(crate) type ParseResult = Result<Module, ParseErr>;

#[derive(Debug)]
pub struct ParseErr {
    pub kind: ParseErrKind,
}

impl ParseErr {
    pub fn new(kind: ParseErrKind) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for ParseErr {}

#[derive(Debug)]
pub enum ParseErrKind {
    ScanErr(ScanErr),
    UnexpectedToken(TokenWithLocation),
    ExpectedExpression(TokenWithLocation),
    ExpectedToken { expected: String, found: TokenWithLocation },
    DuplicateParameter(String),
    RepeatedNamedArgument(String),
    UnexpectedEndOfInput,
}

impl fmt::Display for ParseErrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanErr(e) => write!(f, "{e}"),
            Self::UnexpectedToken(t) => write!(f, "unexpected token: {t}"),
            Self::ExpectedExpression(t) => write!(f, "expected expression, found: {t}"),
            Self::ExpectedToken { expected, found } => {
                write!(f, "expected {expected}, found: {found}")
            }
            Self::DuplicateParameter(name) => write!(f, "duplicate parameter: {name}"),
            Self::RepeatedNamedArgument(name) => write!(f, "repeated named argument: {name}"),
            Self::UnexpectedEndOfInput => write!(f, "unexpected end of input"),
        }
    }
}

impl From<ScanErr> for ParseErr {
    fn from(e: ScanErr) -> Self {
        ParseErr::new(ParseErrKind::ScanErr(e))
    }
}
