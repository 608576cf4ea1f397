//! String operators (§3, §4.5). Strings are stored as `Vec<char>`
//! (unicode scalar values, not bytes) so that Ukrainian-alphabet source
//! text indexes and slices the way a user expects.
use crate::vm::Vm;

use super::base::ObjRef;
use super::ObjectData;

fn as_str<'a>(vm: &'a Vm, r: ObjRef) -> Option<&'a [char]> {
    match vm.heap.get(r) {
        ObjectData::Str(v) => Some(v),
        _ => None,
    }
}

pub(crate) fn to_string(_vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    Some(r)
}

pub(crate) fn to_bool(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let s = as_str(vm, r)?;
    let empty = s.is_empty();
    Some(vm.alloc_bool(!empty))
}

pub(crate) fn to_integer(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let s: String = as_str(vm, r)?.iter().collect();
    match s.trim().parse::<i64>() {
        Ok(v) => Some(vm.alloc_int(v)),
        Err(_) => {
            let value_error = vm.types.value_error;
            vm.raise(value_error, format!("not an integer: \"{s}\""))
        }
    }
}

pub(crate) fn to_real(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let s: String = as_str(vm, r)?.iter().collect();
    match s.trim().parse::<f64>() {
        Ok(v) => Some(vm.alloc_float(v)),
        Err(_) => {
            let value_error = vm.types.value_error;
            vm.raise(value_error, format!("not a real number: \"{s}\""))
        }
    }
}

pub(crate) fn add(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    let (Some(x), Some(y)) = (as_str(vm, a), as_str(vm, b)) else {
        return Some(vm.not_implemented);
    };
    let mut joined = x.to_vec();
    joined.extend_from_slice(y);
    Some(vm.alloc_heap(ObjectData::Str(joined)))
}

pub(crate) fn compare(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    let (Some(x), Some(y)) = (as_str(vm, a), as_str(vm, b)) else {
        return Some(vm.not_implemented);
    };
    Some(vm.alloc_int((x.cmp(y) as i8) as i64))
}

pub(crate) fn get_iter(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let chars = as_str(vm, r)?.to_vec();
    let items: Vec<ObjRef> = chars.into_iter().map(|c| vm.alloc_heap(ObjectData::Str(vec![c]))).collect();
    Some(super::iterator::make(vm, items))
}

/// `впорядкувати` (sort): returns a new sorted list of the string's
/// characters (§9's note that methods live in each type's `attributes`
/// table rather than a second dispatch mechanism).
pub(crate) fn sort_method(
    vm: &mut Vm,
    this: Option<ObjRef>,
    _args: &[ObjRef],
) -> Option<ObjRef> {
    let this = this.expect("method call without receiver");
    let mut chars: Vec<char> = as_str(vm, this)?.to_vec();
    chars.sort_unstable();
    let items: Vec<ObjRef> =
        chars.into_iter().map(|c| vm.alloc_heap(ObjectData::Str(vec![c]))).collect();
    Some(vm.alloc_heap(ObjectData::List(items)))
}

/// `замінити(стара, нова)`: replaces every non-overlapping occurrence
/// of `стара` with `нова`. `replace(a, a)` is the identity when `a` is
/// non-empty (an empty needle matches nowhere, so it's also a no-op).
pub(crate) fn replace_method(
    vm: &mut Vm,
    this: Option<ObjRef>,
    args: &[ObjRef],
) -> Option<ObjRef> {
    let this = this.expect("method call without receiver");
    let subject: String = as_str(vm, this)?.iter().collect();
    let old: String = as_str(vm, args[0])?.iter().collect();
    let new: String = as_str(vm, args[1])?.iter().collect();
    let replaced = if old.is_empty() { subject } else { subject.replace(&old, &new) };
    Some(vm.alloc_heap(ObjectData::Str(replaced.chars().collect())))
}
