//! Interactive read-eval-print loop (§10): one persistent `Vm` across
//! lines, history, a few dot-commands, and an implicit `_` binding for
//! the last expression's value.
use std::sync::atomic::Ordering;

use log::info;
use rustyline::error::ReadlineError;
use rustyline::Editor;

use crate::exe::{self, ExeErr};
use crate::parser::ParseErrKind;
use crate::result::ExitResult;
use crate::scanner::ScanErrKind;
use crate::vm::{VMState, Vm};

const PROMPT: &str = "→ ";
const CONT_PROMPT: &str = "… ";
const HELP: &str = "\
.допомога, ?   показати цю довідку
.вихід, .exit  вийти з циклу
.стек          показати глобальні змінні";

/// Runs the REPL. `dis` disassembles each accumulated input instead of
/// executing it.
pub fn run(dis: bool) -> ExitResult {
    let mut editor = Editor::<()>::new().map_err(|e| (1, format!("не вдалося запустити REPL: {e}")))?;
    let history_path = history_path();
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    let mut vm = Vm::new("<repl>");
    let flag = vm.interrupt_handle();
    let _ = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst));
    info!("repl started");
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { PROMPT } else { CONT_PROMPT };
        match editor.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    match line.trim() {
                        ".вихід" | ".exit" | ".quit" => break,
                        ".допомога" | "?" => {
                            println!("{HELP}");
                            continue;
                        }
                        ".стек" => {
                            print_globals(&vm);
                            continue;
                        }
                        _ => {}
                    }
                }
                buffer.push_str(&line);
                buffer.push('\n');
                let _ = editor.add_history_entry(line.clone());

                if eval(&mut vm, &buffer, dis) {
                    buffer.clear();
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("помилка читання рядка: {err}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }

    Ok(None)
}

/// Evaluates `text` against `vm`. Returns `true` when the input was
/// complete (whether it succeeded or failed outright), `false` when
/// more lines should be read before trying again.
fn eval(vm: &mut Vm, text: &str, dis: bool) -> bool {
    if let Some(wrapped) = wrap_as_assignment(text) {
        match exe::compile_text(vm, &wrapped) {
            Ok(code) => {
                if dis {
                    print!("{}", crate::vm::disassemble(vm, &code));
                    return true;
                }
                match vm.execute(code) {
                    Ok(VMState::Halted(_)) | Ok(VMState::Idle) => {
                        if let Some(r) = vm.get_global("_") {
                            if r != vm.nil {
                                let rendered = vm.display(r);
                                println!("{rendered}");
                            }
                        }
                        return true;
                    }
                    Err(err) => return report(err.into()),
                }
            }
            Err(err) => {
                if is_incomplete(&err) {
                    return false;
                }
                // fall through: not a bare expression, try as a block below
            }
        }
    }

    match exe::execute_text(vm, text, dis) {
        Ok(_) => true,
        Err(err) => {
            if is_incomplete(&err) {
                false
            } else {
                report(err)
            }
        }
    }
}

/// Wraps `text` as `_ = (text)` so a bare expression's value can be
/// read back from the `_` global afterward. Returns `None` when the
/// wrapped form doesn't even parse, since that means the original text
/// wasn't a single expression to begin with.
fn wrap_as_assignment(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        return None;
    }
    let wrapped = format!("_ = ({trimmed})\n");
    crate::parser::parse_text(&wrapped).ok().map(|_| wrapped)
}

fn is_incomplete(err: &ExeErr) -> bool {
    let ExeErr::Parse(e) = err else { return false };
    match &e.kind {
        ParseErrKind::UnexpectedEndOfInput => true,
        ParseErrKind::ScanErr(s) => {
            matches!(s.kind, ScanErrKind::UnterminatedString | ScanErrKind::UnterminatedGroup)
        }
        _ => false,
    }
}

/// Prints an error to stderr and signals the input was complete (no
/// point accumulating more lines after a real error).
fn report(err: ExeErr) -> bool {
    eprintln!("{err}");
    true
}

fn print_globals(vm: &Vm) {
    let mut names: Vec<&str> = vm.global_names().into_iter().collect();
    names.sort_unstable();
    for name in names {
        println!("{name}");
    }
}

fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".barvinok_history");
        p
    })
}
