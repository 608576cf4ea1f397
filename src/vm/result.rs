//! Error and state types returned by the VM driver (§10 ambient error
//! handling: typed errors at the module boundary, `String` only at the
//! final CLI-facing edge).
use std::fmt;

#[derive(Debug)]
pub(crate) enum RuntimeErrKind {
    /// An exception propagated out of the top-level program without
    /// being caught; carries its rendered message and trace.
    UncaughtException(String),
    /// Something the VM itself cannot continue from: a dangling
    /// reference, a malformed code object, stack underflow.
    Internal(String),
}

#[derive(Debug)]
pub(crate) struct RuntimeErr {
    pub kind: RuntimeErrKind,
}

impl RuntimeErr {
    pub fn uncaught(message: impl Into<String>) -> Self {
        Self { kind: RuntimeErrKind::UncaughtException(message.into()) }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { kind: RuntimeErrKind::Internal(message.into()) }
    }
}

impl fmt::Display for RuntimeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RuntimeErrKind::UncaughtException(msg) => write!(f, "{msg}"),
            RuntimeErrKind::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for RuntimeErr {}

pub(crate) type RuntimeResult<T> = Result<T, RuntimeErr>;

#[derive(Debug, PartialEq)]
pub(crate) enum VMState {
    Idle,
    Halted(i32),
}
