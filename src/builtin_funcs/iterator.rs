use crate::types::{ObjRef, ObjectData};
use crate::vm::Vm;

/// `ітератор(значення)`: the same `get_iter` conversion `FOR_EACH`
/// drives internally, exposed as an ordinary call so user code can
/// materialize an iterator value without a loop (§3's "iterator"
/// built-in function).
pub(super) fn iterator(vm: &mut Vm, _this: Option<ObjRef>, args: &[ObjRef]) -> Option<ObjRef> {
    let r = args[0];
    let type_ref = vm.type_of(r);
    let op = match vm.heap.get(type_ref) {
        ObjectData::Type(desc) => desc.operators.get_iter,
        _ => None,
    };
    match op.and_then(|f| f(vm, r)) {
        Some(v) => Some(v),
        None if vm.pending_exception.is_some() => None,
        None => {
            let type_error = vm.types.type_error;
            let tname = vm.type_name(type_ref);
            vm.raise(type_error, format!("{tname} не ітерується"))
        }
    }
}
