//! Bool operators (§3). `та`/`або` (logical and/or) short-circuit in
//! the compiler itself (§4.2); this module only covers `to_string`,
//! `to_bool` and equality-style comparison.
use crate::vm::Vm;

use super::base::ObjRef;
use super::ObjectData;

fn as_bool(vm: &Vm, r: ObjRef) -> Option<bool> {
    match vm.heap.get(r) {
        ObjectData::Bool(v) => Some(*v),
        _ => None,
    }
}

pub(crate) fn to_string(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_bool(vm, r)?;
    Some(vm.alloc_str(if v { "істина" } else { "хиба" }.to_string()))
}

pub(crate) fn to_bool(_vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    Some(r)
}

pub(crate) fn compare(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match (as_bool(vm, a), as_bool(vm, b)) {
        (Some(x), Some(y)) => Some(vm.alloc_int((x.cmp(&y) as i8) as i64)),
        _ => Some(vm.not_implemented),
    }
}
