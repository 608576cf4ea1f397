//! Tuple operators (§3, §4.5): an immutable sequence.
use crate::vm::Vm;

use super::base::ObjRef;
use super::ObjectData;

fn as_tuple<'a>(vm: &'a Vm, r: ObjRef) -> Option<&'a [ObjRef]> {
    match vm.heap.get(r) {
        ObjectData::Tuple(v) => Some(v),
        _ => None,
    }
}

pub(crate) fn to_bool(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let empty = as_tuple(vm, r)?.is_empty();
    Some(vm.alloc_bool(!empty))
}

pub(crate) fn to_string(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let items = as_tuple(vm, r)?.to_vec();
    let rendered = vm.render_sequence('(', ')', &items);
    Some(vm.alloc_str(rendered))
}

pub(crate) fn get_iter(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let items = as_tuple(vm, r)?.to_vec();
    Some(super::iterator::make(vm, items))
}

pub(crate) fn compare(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    let (Some(x), Some(y)) =
        (as_tuple(vm, a).map(<[_]>::to_vec), as_tuple(vm, b).map(<[_]>::to_vec))
    else {
        return Some(vm.not_implemented);
    };
    Some(vm.lexicographic_compare(&x, &y))
}
