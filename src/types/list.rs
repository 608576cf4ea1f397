//! List operators (§3, §4.5): the one built-in mutable sequence type.
use crate::vm::Vm;

use super::base::ObjRef;
use super::ObjectData;

fn as_list<'a>(vm: &'a Vm, r: ObjRef) -> Option<&'a [ObjRef]> {
    match vm.heap.get(r) {
        ObjectData::List(v) => Some(v),
        _ => None,
    }
}

pub(crate) fn to_bool(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let empty = as_list(vm, r)?.is_empty();
    Some(vm.alloc_bool(!empty))
}

pub(crate) fn to_string(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let items = as_list(vm, r)?.to_vec();
    let rendered = vm.render_sequence('[', ']', &items);
    Some(vm.alloc_str(rendered))
}

pub(crate) fn get_iter(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let items = as_list(vm, r)?.to_vec();
    Some(super::iterator::make(vm, items))
}

pub(crate) fn add(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    let (Some(x), Some(y)) = (as_list(vm, a), as_list(vm, b)) else {
        return Some(vm.not_implemented);
    };
    let mut joined = x.to_vec();
    joined.extend_from_slice(y);
    Some(vm.alloc_heap(ObjectData::List(joined)))
}

pub(crate) fn compare(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    let (Some(x), Some(y)) = (as_list(vm, a).map(<[_]>::to_vec), as_list(vm, b).map(<[_]>::to_vec))
    else {
        return Some(vm.not_implemented);
    };
    Some(vm.lexicographic_compare(&x, &y))
}

/// `впорядкувати` (sort): returns a new list with elements ordered
/// according to the default comparison for their runtime type.
pub(crate) fn sort_method(
    vm: &mut Vm,
    this: Option<ObjRef>,
    _args: &[ObjRef],
) -> Option<ObjRef> {
    let this = this.expect("method call without receiver");
    let mut items = as_list(vm, this)?.to_vec();
    let mut incomparable = None;
    items.sort_by(|&a, &b| match vm.compare_values(a, b) {
        Some(ord) => ord,
        None => {
            incomparable.get_or_insert((a, b));
            std::cmp::Ordering::Equal
        }
    });
    if let Some((a, b)) = incomparable {
        let type_error = vm.types.type_error;
        let (ta, tb) = (vm.type_name(vm.type_of(a)), vm.type_name(vm.type_of(b)));
        return vm.raise(type_error, format!("неможливо порівняти {ta} і {tb}"));
    }
    Some(vm.alloc_heap(ObjectData::List(items)))
}
