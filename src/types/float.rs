//! Float operators (§3, §4.5). Comparisons follow `PartialOrd`; NaN
//! compares unordered and every ordering query against it is `false`.
use crate::vm::Vm;

use super::base::ObjRef;
use super::ObjectData;

fn as_float(vm: &Vm, r: ObjRef) -> Option<f64> {
    match vm.heap.get(r) {
        ObjectData::Float(v) => Some(*v),
        _ => None,
    }
}

pub(crate) fn to_string(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_float(vm, r)?;
    Some(vm.alloc_str(format!("{v}")))
}

pub(crate) fn to_bool(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_float(vm, r)?;
    Some(vm.alloc_bool(v != 0.0))
}

pub(crate) fn to_integer(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_float(vm, r)?;
    Some(vm.alloc_int(v as i64))
}

pub(crate) fn to_real(_vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    Some(r)
}

pub(crate) fn pos(_vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    Some(r)
}

pub(crate) fn neg(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let v = as_float(vm, r)?;
    Some(vm.alloc_float(-v))
}

fn both(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<(f64, f64)> {
    let x = match vm.heap.get(a) {
        ObjectData::Float(v) => *v,
        ObjectData::Int(v) => *v as f64,
        _ => return None,
    };
    let y = match vm.heap.get(b) {
        ObjectData::Float(v) => *v,
        ObjectData::Int(v) => *v as f64,
        _ => return None,
    };
    Some((x, y))
}

pub(crate) fn add(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((x, y)) => Some(vm.alloc_float(x + y)),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn sub(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((x, y)) => Some(vm.alloc_float(x - y)),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn mul(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((x, y)) => Some(vm.alloc_float(x * y)),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn div(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((_, y)) if y == 0.0 => {
            let division_by_zero_error = vm.types.division_by_zero_error;
            vm.raise(division_by_zero_error, "division by zero")
        }
        Some((x, y)) => Some(vm.alloc_float(x / y)),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn floor_div(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((_, y)) if y == 0.0 => {
            let division_by_zero_error = vm.types.division_by_zero_error;
            vm.raise(division_by_zero_error, "division by zero")
        }
        Some((x, y)) => Some(vm.alloc_float((x / y).floor())),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn modulo(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((_, y)) if y == 0.0 => {
            let division_by_zero_error = vm.types.division_by_zero_error;
            vm.raise(division_by_zero_error, "division by zero")
        }
        Some((x, y)) => Some(vm.alloc_float(x.rem_euclid(y))),
        None => Some(vm.not_implemented),
    }
}

pub(crate) fn compare(vm: &mut Vm, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
    match both(vm, a, b) {
        Some((x, y)) => match x.partial_cmp(&y) {
            Some(ord) => Some(vm.alloc_int(ord as i8 as i64)),
            None => Some(vm.alloc_int(2)), // unordered (NaN): never Eq/Lt/Gt
        },
        None => Some(vm.not_implemented),
    }
}
