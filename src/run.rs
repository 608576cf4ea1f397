//! Translates a pipeline run into the process-facing `ExitResult`
//! (§10): zero on clean termination, one on any scan, parse, compile,
//! or uncaught-exception error.
use std::sync::atomic::Ordering;

use log::{error, info};

use crate::exe::{self, ExeErr};
use crate::parser::ParseErrKind;
use crate::result::ExitResult;
use crate::vm::{RuntimeErrKind, VMState, Vm};

const EXIT_ERR: i32 = 1;

/// Run text source.
pub fn run_text(text: &str, dis: bool) -> ExitResult {
    let mut vm = Vm::new("<текст>");
    install_interrupt_handler(&vm);
    exit(exe::execute_text(&mut vm, text, dis))
}

/// Run source from a file.
pub fn run_file(file_path: &str, dis: bool) -> ExitResult {
    info!("running {file_path}");
    let mut vm = Vm::new(file_path.to_string());
    install_interrupt_handler(&vm);
    exit(exe::execute_file(&mut vm, file_path, dis))
}

/// Read and run source from stdin.
pub fn run_stdin(dis: bool) -> ExitResult {
    info!("running from stdin");
    let mut vm = Vm::new("<стдін>");
    install_interrupt_handler(&vm);
    exit(exe::execute_stdin(&mut vm, dis))
}

/// Wires `ctrlc` to the VM's interrupt flag so Ctrl-C aborts the
/// running script rather than killing the process outright. Only the
/// first call in a process actually installs a handler; later ones are
/// ignored since each CLI invocation creates at most one `Vm`.
fn install_interrupt_handler(vm: &Vm) {
    let flag = vm.interrupt_handle();
    let _ = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst));
}

fn exit(result: Result<VMState, ExeErr>) -> ExitResult {
    match result {
        Ok(_) => Ok(None),
        Err(err) => {
            let (code, message) = handle_err(err);
            error!("{message}");
            Err((code, message))
        }
    }
}

fn handle_err(err: ExeErr) -> (i32, String) {
    match err {
        ExeErr::Io(path, io_err) => (EXIT_ERR, format!("{path}: {io_err}")),
        ExeErr::Parse(err) => match &err.kind {
            ParseErrKind::ScanErr(scan_err) => {
                (EXIT_ERR, mark(scan_err.location.col, scan_err.to_string()))
            }
            _ => (EXIT_ERR, err.to_string()),
        },
        ExeErr::Compile(err) => (EXIT_ERR, mark(err.location.col, err.to_string())),
        ExeErr::Runtime(err) => match err.kind {
            RuntimeErrKind::UncaughtException(message) => (EXIT_ERR, message),
            RuntimeErrKind::Internal(message) => {
                (EXIT_ERR, format!("внутрішня помилка: {message}"))
            }
        },
    }
}

/// Prefixes a message with a caret pointing at the offending column.
fn mark(col: usize, message: String) -> String {
    let indent = col.saturating_sub(1);
    format!("{:>width$}^\n{message}", "", width = indent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_text() {
        let result = run_text("1 + 2", false);
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_run_text_scan_err() {
        let result = run_text("\"незакінчений", false);
        assert_eq!(result.unwrap_err().0, EXIT_ERR);
    }

    #[test]
    fn test_run_text_compile_err() {
        let result = run_text("перервати", false);
        assert_eq!(result.unwrap_err().0, EXIT_ERR);
    }
}
