//! The dynamic object model (§3, §4.5, §4.6, §9): a flat `ObjectData`
//! enum plus a per-type `Operators` dispatch table, instead of the
//! trait-object class hierarchy a naive port of the teacher would use.

pub(crate) use base::{
    traverse, CallableInfo, Closure, ExceptionData, NativeFn, NativeFunc, ObjRef, ObjectData,
    Operators, TraceEntry, TypeDescriptor,
};
pub(crate) use class::{install, Builtins};
pub(crate) use exception::make as make_exception;

mod base;
mod bool;
mod class;
mod exception;
mod float;
mod int;
mod iterator;
mod list;
mod nil;
mod str;
mod tuple;
