//! The builtin type registry (§3 "Built-in types", §4.5): every
//! built-in type descriptor is allocated once, at VM start-up, and
//! referenced by `ObjRef` from then on -- mirrors the teacher's
//! `BUILTIN_TYPES` static table, minus the global-lock indirection
//! since `Vm` already owns the heap exclusively.
use crate::vm::Vm;

use super::base::{CallableInfo, NativeFunc, ObjRef, Operators, TypeDescriptor};
use super::{bool, exception, float, int, iterator, list, nil, str, tuple, ObjectData};

pub(crate) struct Builtins {
    pub int_type: ObjRef,
    pub float_type: ObjRef,
    pub bool_type: ObjRef,
    pub str_type: ObjRef,
    pub list_type: ObjRef,
    pub tuple_type: ObjRef,
    pub nil_type: ObjRef,
    pub function_type: ObjRef,
    pub type_type: ObjRef,
    pub iterator_type: ObjRef,
    pub exception_type: ObjRef,
    pub name_error: ObjRef,
    pub type_error: ObjRef,
    pub attribute_error: ObjRef,
    pub index_error: ObjRef,
    pub division_by_zero_error: ObjRef,
    pub value_error: ObjRef,
    pub not_implemented_error: ObjRef,
    pub internal_error: ObjRef,
}

impl Builtins {
    /// Dummy indices, overwritten by `install` before anything else
    /// runs. `Vm` cannot exist without a `Builtins`, and `Builtins`
    /// cannot be populated without a `Vm` to allocate into -- so this
    /// breaks the chicken-and-egg cycle.
    pub fn placeholder() -> Self {
        Self {
            int_type: 0,
            float_type: 0,
            bool_type: 0,
            str_type: 0,
            list_type: 0,
            tuple_type: 0,
            nil_type: 0,
            function_type: 0,
            type_type: 0,
            iterator_type: 0,
            exception_type: 0,
            name_error: 0,
            type_error: 0,
            attribute_error: 0,
            index_error: 0,
            division_by_zero_error: 0,
            value_error: 0,
            not_implemented_error: 0,
            internal_error: 0,
        }
    }

    /// Every exception leaf type by its surface-syntax name, for
    /// installing into the global namespace (§10).
    pub fn exception_globals(&self) -> [(&'static str, ObjRef); 9] {
        [
            ("Виняток", self.exception_type),
            ("НазваПомилка", self.name_error),
            ("ТипПомилка", self.type_error),
            ("АтрибутПомилка", self.attribute_error),
            ("ІндексПомилка", self.index_error),
            ("ДіленняНаНульПомилка", self.division_by_zero_error),
            ("ЗначенняПомилка", self.value_error),
            ("НеРеалізованоПомилка", self.not_implemented_error),
            ("ВнутрішняПомилка", self.internal_error),
        ]
    }

    /// Walks the `base` chain of `exc_type` looking for `target`
    /// (§4.7 `catch` type matching).
    pub fn is_instance_of(&self, vm: &Vm, exc_type: ObjRef, target: ObjRef) -> bool {
        let mut current = Some(exc_type);
        while let Some(t) = current {
            if t == target {
                return true;
            }
            current = match vm.heap.get(t) {
                ObjectData::Type(desc) => desc.base,
                _ => None,
            };
        }
        false
    }
}

fn native(name: &str, arity: usize, is_method: bool, func: super::base::NativeFn) -> NativeFunc {
    NativeFunc {
        name: name.to_string(),
        info: CallableInfo { arity, is_variadic: false, default_count: 0, is_method },
        func,
    }
}

pub(crate) fn install(vm: &mut Vm) {
    let int_ops = Operators {
        to_string: Some(int::to_string),
        to_integer: Some(int::to_integer),
        to_real: Some(int::to_real),
        to_bool: Some(int::to_bool),
        pos: Some(int::pos),
        neg: Some(int::neg),
        add: Some(int::add),
        sub: Some(int::sub),
        mul: Some(int::mul),
        div: Some(int::div),
        floor_div: Some(int::floor_div),
        modulo: Some(int::modulo),
        comparison: Some(int::compare),
        ..Default::default()
    };
    vm.types.int_type = vm.heap.allocate(ObjectData::Type(TypeDescriptor {
        operators: int_ops,
        ..TypeDescriptor::new("Ціле", None)
    }));

    let float_ops = Operators {
        to_string: Some(float::to_string),
        to_integer: Some(float::to_integer),
        to_real: Some(float::to_real),
        to_bool: Some(float::to_bool),
        pos: Some(float::pos),
        neg: Some(float::neg),
        add: Some(float::add),
        sub: Some(float::sub),
        mul: Some(float::mul),
        div: Some(float::div),
        floor_div: Some(float::floor_div),
        modulo: Some(float::modulo),
        comparison: Some(float::compare),
        ..Default::default()
    };
    vm.types.float_type = vm.heap.allocate(ObjectData::Type(TypeDescriptor {
        operators: float_ops,
        ..TypeDescriptor::new("Дійсне", None)
    }));

    let bool_ops = Operators {
        to_string: Some(bool::to_string),
        to_bool: Some(bool::to_bool),
        comparison: Some(bool::compare),
        ..Default::default()
    };
    vm.types.bool_type = vm.heap.allocate(ObjectData::Type(TypeDescriptor {
        operators: bool_ops,
        ..TypeDescriptor::new("Логічне", None)
    }));

    let nil_ops = Operators {
        to_string: Some(nil::to_string),
        to_bool: Some(nil::to_bool),
        comparison: Some(nil::compare),
        ..Default::default()
    };
    vm.types.nil_type = vm.heap.allocate(ObjectData::Type(TypeDescriptor {
        operators: nil_ops,
        ..TypeDescriptor::new("Нич", None)
    }));

    let str_ops = Operators {
        to_string: Some(str::to_string),
        to_integer: Some(str::to_integer),
        to_real: Some(str::to_real),
        to_bool: Some(str::to_bool),
        get_iter: Some(str::get_iter),
        add: Some(str::add),
        comparison: Some(str::compare),
        ..Default::default()
    };
    let mut str_desc = TypeDescriptor { operators: str_ops, ..TypeDescriptor::new("Рядок", None) };
    let sort_native = vm.heap.allocate(ObjectData::Native(native(
        "впорядкувати",
        0,
        true,
        str::sort_method,
    )));
    str_desc.attributes.insert("впорядкувати".to_string(), sort_native);
    let replace_native = vm.heap.allocate(ObjectData::Native(native(
        "замінити",
        2,
        false,
        str::replace_method,
    )));
    str_desc.attributes.insert("замінити".to_string(), replace_native);
    vm.types.str_type = vm.heap.allocate(ObjectData::Type(str_desc));

    let list_ops = Operators {
        to_string: Some(list::to_string),
        to_bool: Some(list::to_bool),
        get_iter: Some(list::get_iter),
        add: Some(list::add),
        comparison: Some(list::compare),
        ..Default::default()
    };
    let mut list_desc = TypeDescriptor { operators: list_ops, ..TypeDescriptor::new("Список", None) };
    let sort_native = vm.heap.allocate(ObjectData::Native(native(
        "впорядкувати",
        0,
        true,
        list::sort_method,
    )));
    list_desc.attributes.insert("впорядкувати".to_string(), sort_native);
    vm.types.list_type = vm.heap.allocate(ObjectData::Type(list_desc));

    let tuple_ops = Operators {
        to_string: Some(tuple::to_string),
        to_bool: Some(tuple::to_bool),
        get_iter: Some(tuple::get_iter),
        comparison: Some(tuple::compare),
        ..Default::default()
    };
    vm.types.tuple_type = vm.heap.allocate(ObjectData::Type(TypeDescriptor {
        operators: tuple_ops,
        ..TypeDescriptor::new("Кортеж", None)
    }));

    vm.types.function_type =
        vm.heap.allocate(ObjectData::Type(TypeDescriptor::new("Функція", None)));
    vm.types.type_type = vm.heap.allocate(ObjectData::Type(TypeDescriptor::new("Тип", None)));

    let mut iterator_desc = TypeDescriptor::new("Ітератор", None);
    let next_native =
        vm.heap.allocate(ObjectData::Native(native("next", 0, true, iterator::next_method)));
    iterator_desc.attributes.insert("next".to_string(), next_native);
    vm.types.iterator_type = vm.heap.allocate(ObjectData::Type(iterator_desc));

    exception::install_hierarchy(vm);
}
