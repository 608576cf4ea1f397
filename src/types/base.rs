//! The object model (§3, §4.5): a non-moving arena of heap objects,
//! each tagged with a pointer to its type descriptor, dispatched
//! through a flat `ObjectData` enum rather than a trait-object
//! hierarchy, per §9's "favor a flat enum of built-in kinds ... over
//! deeply nested class hierarchies" guidance.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::vm::{Code, Vm};

/// Index into the heap's object arena. Stable for the lifetime of the
/// object (the GC is non-moving, §4.6).
pub(crate) type ObjRef = usize;

/// A unary operator implementation (§3 "operators table"). Returns
/// `None` to signal that an exception has been raised and recorded on
/// `vm.pending_exception`; `Some(r)` where `r` is `vm.not_implemented`
/// to signal "try the other side" (never user-visible, §7); otherwise
/// the result value.
pub(crate) type UnaryOp = fn(&mut Vm, ObjRef) -> Option<ObjRef>;
pub(crate) type BinaryOp = fn(&mut Vm, ObjRef, ObjRef) -> Option<ObjRef>;
/// Three-way comparison: same protocol as `BinaryOp`, but a successful
/// result is always a boolean object (or `not_implemented`).
pub(crate) type CompareOp = fn(&mut Vm, ObjRef, ObjRef) -> Option<ObjRef>;
/// `call` entry of the operators table: invoked with the callable and
/// the already-evaluated positional/named arguments.
pub(crate) type CallOp = fn(&mut Vm, ObjRef, &[ObjRef], &[(String, ObjRef)]) -> Option<ObjRef>;

/// Per-type dispatch table (§3 "Type descriptor"). `None` means the
/// operation is unsupported for the type; the VM's dispatch layer
/// raises `TypeError` accordingly (§4.3).
#[derive(Default)]
pub(crate) struct Operators {
    pub to_string: Option<UnaryOp>,
    pub to_integer: Option<UnaryOp>,
    pub to_real: Option<UnaryOp>,
    pub to_bool: Option<UnaryOp>,
    pub pos: Option<UnaryOp>,
    pub neg: Option<UnaryOp>,
    pub get_iter: Option<UnaryOp>,
    pub add: Option<BinaryOp>,
    pub sub: Option<BinaryOp>,
    pub mul: Option<BinaryOp>,
    pub div: Option<BinaryOp>,
    pub floor_div: Option<BinaryOp>,
    pub modulo: Option<BinaryOp>,
    pub call: Option<CallOp>,
    pub comparison: Option<CompareOp>,
}

/// A type descriptor is itself a heap object (§3, §4.5 "Layout"): every
/// built-in type is allocated once at VM startup and referenced by
/// `ObjRef` from every instance's header.
pub(crate) struct TypeDescriptor {
    pub name: &'static str,
    /// `None` only for *Object*, the root of the `base` chain (§3 invariant).
    pub base: Option<ObjRef>,
    pub operators: Operators,
    /// Methods and static members, resolved by `GET_ATTR`/`LOAD_METHOD`.
    pub attributes: IndexMap<String, ObjRef>,
}

impl TypeDescriptor {
    pub fn new(name: &'static str, base: Option<ObjRef>) -> Self {
        Self { name, base, operators: Operators::default(), attributes: IndexMap::new() }
    }
}

/// Arity/variadic/defaults contract shared by function closures and
/// native callables (§4.5 "Native callables").
#[derive(Clone, Debug)]
pub(crate) struct CallableInfo {
    pub arity: usize,
    pub is_variadic: bool,
    pub default_count: usize,
    pub is_method: bool,
}

pub(crate) type NativeFn = fn(&mut Vm, Option<ObjRef>, &[ObjRef]) -> Option<ObjRef>;

pub(crate) struct NativeFunc {
    pub name: String,
    pub info: CallableInfo,
    pub func: NativeFn,
}

/// A function closure (§3 "Function closure"): a code object plus the
/// cells it captured (one per freevar, declaration order) and the
/// evaluated default-argument values.
pub(crate) struct Closure {
    pub code: ObjRef,
    pub cells: Vec<ObjRef>,
    pub defaults: Vec<ObjRef>,
}

/// One entry of an exception's stack trace (§3): source name, line,
/// enclosing function name.
#[derive(Clone, Debug)]
pub(crate) struct TraceEntry {
    pub source: String,
    pub line: usize,
    pub function_name: String,
}

pub(crate) struct ExceptionData {
    /// The specific exception type (e.g. `NameError`), since every
    /// exception instance shares this one `ObjectData` variant.
    pub type_ref: ObjRef,
    pub message: String,
    pub trace: Vec<TraceEntry>,
}

/// State behind the `next`-exposing iterator object `getIter` returns
/// for the built-in sequence types (§4.5 "iterator protocol"). A
/// snapshot of the elements at the moment of iteration plus a cursor,
/// advanced one element per `next` call.
pub(crate) struct IteratorData {
    pub items: Vec<ObjRef>,
    pub index: usize,
}

/// The payload of a heap object. One variant per value kind named in
/// §3's Value catalogue.
pub(crate) enum ObjectData {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Vec<char>),
    List(Vec<ObjRef>),
    Tuple(Vec<ObjRef>),
    Nil,
    Cell(ObjRef),
    Closure(Closure),
    Code(Rc<Code>),
    Exception(ExceptionData),
    Type(TypeDescriptor),
    Native(NativeFunc),
    BoundMethod { instance: ObjRef, method: ObjRef },
    Iterator(IteratorData),
    EndIteration,
    /// The `NotImplemented` sentinel (§7, §9): internal-only, never
    /// user-visible from a correctly written program.
    NotImplemented,
}

impl ObjectData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::Bool(_) => "Bool",
            Self::Str(_) => "Str",
            Self::List(_) => "List",
            Self::Tuple(_) => "Tuple",
            Self::Nil => "Nil",
            Self::Cell(_) => "Cell",
            Self::Closure(_) => "Function",
            Self::Code(_) => "Code",
            Self::Exception(_) => "Exception",
            Self::Type(_) => "Type",
            Self::Native(_) => "NativeFunction",
            Self::BoundMethod { .. } => "BoundMethod",
            Self::Iterator(_) => "Iterator",
            Self::EndIteration => "EndIteration",
            Self::NotImplemented => "NotImplemented",
        }
    }
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind_name())
    }
}

/// GC traversal for a single object's payload (§4.6 mark phase): feeds
/// every directly reachable `ObjRef` to `mark`.
pub(crate) fn traverse(data: &ObjectData, mark: &mut dyn FnMut(ObjRef)) {
    match data {
        ObjectData::List(items) | ObjectData::Tuple(items) => {
            for &item in items {
                mark(item);
            }
        }
        ObjectData::Cell(value) => mark(*value),
        ObjectData::Closure(c) => {
            mark(c.code);
            for &cell in &c.cells {
                mark(cell);
            }
            for &default in &c.defaults {
                mark(default);
            }
        }
        ObjectData::Code(code) => {
            for &constant in code.constants() {
                mark(constant);
            }
        }
        ObjectData::BoundMethod { instance, method } => {
            mark(*instance);
            mark(*method);
        }
        ObjectData::Iterator(it) => {
            for &item in &it.items {
                mark(item);
            }
        }
        ObjectData::Type(type_desc) => {
            if let Some(base) = type_desc.base {
                mark(base);
            }
            for &attr in type_desc.attributes.values() {
                mark(attr);
            }
        }
        ObjectData::Int(_)
        | ObjectData::Float(_)
        | ObjectData::Bool(_)
        | ObjectData::Str(_)
        | ObjectData::Nil
        | ObjectData::Exception(_)
        | ObjectData::Native(_)
        | ObjectData::EndIteration
        | ObjectData::NotImplemented => {}
    }
}
