use std::fmt;
use std::rc::Rc;

use crate::util::Location;
use crate::vm::Code;

pub(crate) type CompResult = Result<Rc<Code>, CompErr>;

#[derive(Debug)]
pub struct CompErr {
    pub kind: CompErrKind,
    pub location: Location,
}

impl CompErr {
    pub fn new(kind: CompErrKind, location: Location) -> Self {
        Self { kind, location }
    }
}

impl fmt::Display for CompErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.kind, self.location.line, self.location.col)
    }
}

impl std::error::Error for CompErr {}

#[derive(Debug)]
pub enum CompErrKind {
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ReturnOutsideFunction,
    /// A parameter without a default followed one that has one.
    NonTrailingDefault(String),
    /// An assignment target other than a bare name (e.g. `x.y = 1`,
    /// `(a, b) = c`). The object model has no attribute-mutation
    /// instruction, so only variables are assignable.
    InvalidAssignmentTarget,
}

impl fmt::Display for CompErrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BreakOutsideLoop => write!(f, "перервати поза циклом"),
            Self::ContinueOutsideLoop => write!(f, "продовжити поза циклом"),
            Self::ReturnOutsideFunction => write!(f, "повернути поза функцією"),
            Self::NonTrailingDefault(name) => {
                write!(f, "параметр без значення за замовчуванням після параметра зі значенням: {name}")
            }
            Self::InvalidAssignmentTarget => write!(f, "неприпустима ціль присвоєння"),
        }
    }
}
