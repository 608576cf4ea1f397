//! The exception hierarchy (§3, §4.7, §9): `Exception` at the root,
//! with `NameError`, `TypeError`, `AttributeError`, `IndexError`,
//! `DivisionByZeroError`, `ValueError`, `NotImplementedError` and
//! `InternalError` descending from it via `TypeDescriptor::base`.
use crate::vm::Vm;

use super::base::{CallableInfo, ExceptionData, NativeFunc, ObjRef, Operators, TypeDescriptor};
use super::ObjectData;

pub(crate) fn to_string(vm: &mut Vm, r: ObjRef) -> Option<ObjRef> {
    let rendered = match vm.heap.get(r) {
        ObjectData::Exception(e) => {
            let name = vm.type_name(e.type_ref);
            format!("{name}: {}", e.message)
        }
        _ => return None,
    };
    Some(vm.alloc_str(rendered))
}

pub(crate) fn to_bool(vm: &mut Vm, _r: ObjRef) -> Option<ObjRef> {
    Some(vm.alloc_bool(false))
}

/// `повідомлення` reads an exception's message; exposed as an
/// attribute rather than a method since it takes no arguments.
pub(crate) fn message_getter(
    vm: &mut Vm,
    this: Option<ObjRef>,
    _args: &[ObjRef],
) -> Option<ObjRef> {
    let this = this.expect("attribute access without receiver");
    match vm.heap.get(this) {
        ObjectData::Exception(e) => {
            let message = e.message.clone();
            Some(vm.alloc_str(message))
        }
        _ => None,
    }
}

pub(crate) fn operators() -> Operators {
    Operators { to_string: Some(to_string), to_bool: Some(to_bool), ..Default::default() }
}

pub(crate) fn install_hierarchy(vm: &mut Vm) {
    let exception_type =
        vm.heap.allocate(ObjectData::Type(TypeDescriptor::new("Виняток", None)));
    vm.types.exception_type = exception_type;

    let names = [
        ("НазваПомилка", "NameError"),
        ("ТипПомилка", "TypeError"),
        ("АтрибутПомилка", "AttributeError"),
        ("ІндексПомилка", "IndexError"),
        ("ДіленняНаНульПомилка", "DivisionByZeroError"),
        ("ЗначенняПомилка", "ValueError"),
        ("НеРеалізованоПомилка", "NotImplementedError"),
        ("ВнутрішняПомилка", "InternalError"),
    ];
    let mut made = Vec::with_capacity(names.len());
    for (display_name, _english) in names {
        let leaked: &'static str = Box::leak(display_name.to_string().into_boxed_str());
        let mut desc = TypeDescriptor::new(leaked, Some(exception_type));
        desc.operators = operators();
        desc.attributes.insert(
            "повідомлення".to_string(),
            vm.heap.allocate(ObjectData::Native(NativeFunc {
                name: "повідомлення".to_string(),
                info: CallableInfo { arity: 0, is_variadic: false, default_count: 0, is_method: true },
                func: message_getter,
            })),
        );
        made.push(vm.heap.allocate(ObjectData::Type(desc)));
    }
    vm.types.name_error = made[0];
    vm.types.type_error = made[1];
    vm.types.attribute_error = made[2];
    vm.types.index_error = made[3];
    vm.types.division_by_zero_error = made[4];
    vm.types.value_error = made[5];
    vm.types.not_implemented_error = made[6];
    vm.types.internal_error = made[7];

    if let ObjectData::Type(desc) = vm.heap.get_mut(exception_type) {
        desc.operators = operators();
    }
}

pub(crate) fn make(
    vm: &mut Vm,
    type_ref: ObjRef,
    message: impl Into<String>,
) -> ObjRef {
    let trace = vm.current_trace();
    vm.alloc_heap(ObjectData::Exception(ExceptionData { type_ref, message: message.into(), trace }))
}
