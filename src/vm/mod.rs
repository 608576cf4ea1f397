pub use vm::{Vm, DEFAULT_MAX_CALL_DEPTH};

pub(crate) use code::{Code, ProtectedRegion};
pub(crate) use dis::disassemble;
pub(crate) use inst::Inst;
pub(crate) use result::{RuntimeErr, RuntimeErrKind, RuntimeResult, VMState};
pub(crate) use vm::native_fn;

mod code;
mod dis;
mod heap;
mod inst;
mod result;
mod vm;
