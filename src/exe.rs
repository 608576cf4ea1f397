//! Runs source text through the scan -> parse -> compile -> execute
//! pipeline (§10), or prints its disassembly when `-а`/`--асемблер` is
//! given instead of running it.
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::rc::Rc;

use log::debug;

use crate::compiler::{self, CompErr};
use crate::parser::{self, ParseErr};
use crate::vm::{disassemble, Code, RuntimeErr, VMState, Vm};

#[derive(Debug)]
pub(crate) enum ExeErr {
    Io(String, io::Error),
    Parse(ParseErr),
    Compile(CompErr),
    Runtime(RuntimeErr),
}

impl fmt::Display for ExeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, err) => write!(f, "не вдалося прочитати {path}: {err}"),
            Self::Parse(err) => write!(f, "{err}"),
            Self::Compile(err) => write!(f, "{err}"),
            Self::Runtime(err) => write!(f, "{err}"),
        }
    }
}

impl From<ParseErr> for ExeErr {
    fn from(err: ParseErr) -> Self {
        Self::Parse(err)
    }
}

impl From<CompErr> for ExeErr {
    fn from(err: CompErr) -> Self {
        Self::Compile(err)
    }
}

impl From<RuntimeErr> for ExeErr {
    fn from(err: RuntimeErr) -> Self {
        Self::Runtime(err)
    }
}

/// Scans, parses, and compiles `text` into a runnable top-level `Code`
/// object, running scope analysis along the way (`compiler::compile`
/// does both in one call).
pub(crate) fn compile_text(vm: &mut Vm, text: &str) -> Result<Rc<Code>, ExeErr> {
    let module = parser::parse_text(text)?;
    debug!("parsed {} top-level statement(s)", module.body.len());
    let code = compiler::compile(vm, &module)?;
    debug!("compiled {} instruction(s)", code.insts.len());
    Ok(code)
}

fn run_code(vm: &mut Vm, code: Rc<Code>, dis: bool) -> Result<VMState, ExeErr> {
    if dis {
        print!("{}", disassemble(vm, &code));
        return Ok(VMState::Halted(0));
    }
    Ok(vm.execute(code)?)
}

pub(crate) fn execute_text(vm: &mut Vm, text: &str, dis: bool) -> Result<VMState, ExeErr> {
    let code = compile_text(vm, text)?;
    run_code(vm, code, dis)
}

pub(crate) fn execute_file(vm: &mut Vm, file_path: &str, dis: bool) -> Result<VMState, ExeErr> {
    let text = fs::read_to_string(file_path).map_err(|e| ExeErr::Io(file_path.to_string(), e))?;
    execute_text(vm, &text, dis)
}

pub(crate) fn execute_stdin(vm: &mut Vm, dis: bool) -> Result<VMState, ExeErr> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|e| ExeErr::Io("<стдін>".to_string(), e))?;
    execute_text(vm, &text, dis)
}
