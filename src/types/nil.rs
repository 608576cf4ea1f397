//! The singleton `nich` (nil) value (§3). Falsy, stringifies to `нич`,
//! compares equal only to itself.
use crate::vm::Vm;

use super::base::ObjRef;

pub(crate) fn to_string(vm: &mut Vm, _r: ObjRef) -> Option<ObjRef> {
    Some(vm.alloc_str("нич".to_string()))
}

pub(crate) fn to_bool(vm: &mut Vm, _r: ObjRef) -> Option<ObjRef> {
    Some(vm.alloc_bool(false))
}

pub(crate) fn compare(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    Some(vm.alloc_int(if a == b { 0 } else { 2 }))
}
