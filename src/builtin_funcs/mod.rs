//! Registry of free-standing builtin functions (§3 "Built-in types and
//! functions"): `друк`, `прочитати_рядок`, `ітератор`. Installed as
//! globals once at VM startup, the same spot `types::install` installs
//! the builtin type descriptors.
pub(crate) use specs::get_builtin_func_specs;

use crate::types::ObjectData;
use crate::vm::{native_fn, Vm};

mod iterator;
mod print;
mod read_line;
mod specs;

pub(crate) fn install(vm: &mut Vm) {
    for (name, arity, is_variadic, func) in get_builtin_func_specs() {
        let native = native_fn(name, arity, is_variadic, func);
        let r = vm.alloc_heap(ObjectData::Native(native));
        vm.define_global(name, r);
    }
}
