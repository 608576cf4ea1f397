//! Integer operators (§3 value catalogue, §4.5).
use crate::vm::Vm;

use super::base::ObjRef;
use super::ObjectData;

fn as_int(vm: &Vm, r: ObjRef) -> Option<i64> {
    match vm.heap.get(r) {
        ObjectData::Int(v) => Some(*v),
        _ => None,
    }
}

pub(crate) fn to_string(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_int(vm, r)?;
    Some(vm.alloc_str(v.to_string()))
}

pub(crate) fn to_bool(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_int(vm, r)?;
    Some(vm.alloc_bool(v != 0))
}

pub(crate) fn to_integer(_vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    Some(r)
}

pub(crate) fn to_real(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_int(vm, r)?;
    Some(vm.alloc_float(v as f64))
}

pub(crate) fn pos(_vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    Some(r)
}

pub(crate) fn neg(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_int(vm, r)?;
    Some(vm.alloc_int(-v))
}

fn both(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<(i64, i64)> {
    match (vm.heap.get(a), vm.heap.get(b)) {
        (ObjectData::Int(x), ObjectData::Int(y)) => Some((*x, *y)),
        _ => None,
    }
}

pub(crate) fn add(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((x, y)) => Some(vm.alloc_int(x.wrapping_add(y))),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn sub(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((x, y)) => Some(vm.alloc_int(x.wrapping_sub(y))),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn mul(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((x, y)) => Some(vm.alloc_int(x.wrapping_mul(y))),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn div(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((_, 0)) => {
            let division_by_zero_error = vm.types.division_by_zero_error;
            vm.raise(division_by_zero_error, "division by zero")
        }
        Some((x, y)) => Some(vm.alloc_float(x as f64 / y as f64)),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn floor_div(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((_, 0)) => {
            let division_by_zero_error = vm.types.division_by_zero_error;
            vm.raise(division_by_zero_error, "division by zero")
        }
        Some((x, y)) => Some(vm.alloc_int(x.div_euclid(y))),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn modulo(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((_, 0)) => {
            let division_by_zero_error = vm.types.division_by_zero_error;
            vm.raise(division_by_zero_error, "division by zero")
        }
        Some((x, y)) => Some(vm.alloc_int(x.rem_euclid(y))),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn compare(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((x, y)) => Some(vm.alloc_int((x.cmp(&y) as i8) as i64)),
        None => Some(vm.not_implemented),
    }
}
