pub(crate) use compiler::compile;
pub(crate) use result::{CompErr, CompErrKind, CompResult};

mod compiler;
mod result;
mod scope;
