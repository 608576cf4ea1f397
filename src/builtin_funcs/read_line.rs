use std::io::{self, Write};

use crate::types::{ObjRef, ObjectData};
use crate::vm::Vm;

/// `прочитати_рядок([запрошення])`: writes an optional prompt to
/// stdout, then blocks reading one line from stdin (§3's "blocks until
/// the OS call returns; no cancellation"). The trailing newline is
/// stripped; end of input yields an empty string, the same as the
/// teacher's line-oriented I/O having nothing left to distinguish EOF
/// from a blank line once the newline is gone.
pub(super) fn read_line(vm: &mut Vm, _this: Option<ObjRef>, args: &[ObjRef]) -> Option<ObjRef> {
    if let Some(&prompt) = args.first() {
        let text = vm.display(prompt);
        print!("{text}");
        let _ = io::stdout().flush();
    }

    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(_) => {
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Some(vm.alloc_heap(ObjectData::Str(line.chars().collect())))
        }
        Err(err) => {
            let internal_error = vm.types.internal_error;
            vm.raise(internal_error, format!("не вдалося прочитати рядок: {err}"))
        }
    }
}
