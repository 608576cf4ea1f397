//! The bytecode interpreter (§4, §9): a flat fetch-execute loop over
//! `Frame`s kept in an explicit `Vec` rather than the Rust call stack,
//! so the GC can walk every live frame's locals and operand stack as
//! roots (§4.6) without needing to unwind anything.
use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::util::{BinaryOperator, CompareOperator, UnaryOperator};

use super::code::Code;
use super::heap::Heap;
use super::inst::Inst;
use super::result::{RuntimeErr, VMState};
use crate::builtin_funcs;
use crate::types::{
    install, Builtins, CallableInfo, Closure, NativeFn, NativeFunc, ObjRef, ObjectData, TraceEntry,
};

pub const DEFAULT_MAX_CALL_DEPTH: usize = if cfg!(debug_assertions) { 256 } else { 1024 };

struct Frame {
    code: Rc<Code>,
    ip: usize,
    locals: Vec<ObjRef>,
    cell_slots: Vec<ObjRef>,
    stack: Vec<ObjRef>,
    active_regions: Vec<usize>,
    deferred_exception: Option<ObjRef>,
}

impl Frame {
    fn new(code: Rc<Code>, nil: ObjRef) -> Self {
        let locals = vec![nil; code.locals.len()];
        let cell_slots = Vec::with_capacity(code.cells.len() + code.freevars.len());
        Self { code, ip: 0, locals, cell_slots, stack: Vec::new(), active_regions: Vec::new(), deferred_exception: None }
    }
}

enum Flow {
    Continue,
    Returned(ObjRef),
    Raised,
}

/// See `Vm::compare_raw`.
enum Cmp {
    Ordered(Ordering),
    Unordered,
    NotComparable,
}

/// The interpreter. Every running program owns exactly one; the CLI
/// driver (§10) creates one per `execute_*` call.
pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) types: Builtins,
    globals: IndexMap<String, ObjRef>,
    frames: Vec<Frame>,
    pub(crate) pending_exception: Option<ObjRef>,
    pub(crate) not_implemented: ObjRef,
    pub(crate) nil: ObjRef,
    true_: ObjRef,
    false_: ObjRef,
    pub(crate) end_iteration: ObjRef,
    max_call_depth: usize,
    source_name: String,
    /// Set from a `ctrlc` handler so a long-running script can be
    /// aborted between instructions (§10's REPL interrupt handling).
    interrupted: Arc<AtomicBool>,
}

impl Vm {
    pub fn new(source_name: impl Into<String>) -> Self {
        let mut heap = Heap::default();
        let not_implemented = heap.allocate(ObjectData::NotImplemented);
        let nil = heap.allocate(ObjectData::Nil);
        let true_ = heap.allocate(ObjectData::Bool(true));
        let false_ = heap.allocate(ObjectData::Bool(false));
        let end_iteration = heap.allocate(ObjectData::EndIteration);
        let mut vm = Self {
            heap,
            types: Builtins::placeholder(),
            globals: IndexMap::new(),
            frames: Vec::new(),
            pending_exception: None,
            not_implemented,
            nil,
            true_,
            false_,
            end_iteration,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            source_name: source_name.into(),
            interrupted: Arc::new(AtomicBool::new(false)),
        };
        install(&mut vm);
        for (name, type_ref) in vm.types.exception_globals() {
            vm.define_global(name, type_ref);
        }
        builtin_funcs::install(&mut vm);
        vm
    }

    // -- allocation helpers -------------------------------------------

    pub(crate) fn alloc_heap(&mut self, data: ObjectData) -> ObjRef {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.allocate(data)
    }

    pub(crate) fn alloc_int(&mut self, v: i64) -> ObjRef {
        self.alloc_heap(ObjectData::Int(v))
    }

    pub(crate) fn alloc_float(&mut self, v: f64) -> ObjRef {
        self.alloc_heap(ObjectData::Float(v))
    }

    pub(crate) fn alloc_bool(&mut self, v: bool) -> ObjRef {
        if v {
            self.true_
        } else {
            self.false_
        }
    }

    pub(crate) fn alloc_str(&mut self, s: String) -> ObjRef {
        self.alloc_heap(ObjectData::Str(s.chars().collect()))
    }

    fn collect_garbage(&mut self) {
        let mut roots = vec![
            self.not_implemented,
            self.nil,
            self.true_,
            self.false_,
            self.end_iteration,
            self.types.int_type,
            self.types.float_type,
            self.types.bool_type,
            self.types.str_type,
            self.types.list_type,
            self.types.tuple_type,
            self.types.nil_type,
            self.types.function_type,
            self.types.type_type,
            self.types.iterator_type,
            self.types.exception_type,
            self.types.name_error,
            self.types.type_error,
            self.types.attribute_error,
            self.types.index_error,
            self.types.division_by_zero_error,
            self.types.value_error,
            self.types.not_implemented_error,
            self.types.internal_error,
        ];
        roots.extend(self.globals.values().copied());
        if let Some(exc) = self.pending_exception {
            roots.push(exc);
        }
        for frame in &self.frames {
            // `frame.code` is an `Rc<Code>` held outside the heap while
            // it's executing, so its constant pool needs its own root
            // entry -- it isn't reachable through any `ObjRef`.
            roots.extend(frame.code.constants().iter().copied());
            roots.extend(frame.locals.iter().copied());
            roots.extend(frame.cell_slots.iter().copied());
            roots.extend(frame.stack.iter().copied());
            if let Some(exc) = frame.deferred_exception {
                roots.push(exc);
            }
        }
        self.heap.collect(roots);
    }

    // -- globals --------------------------------------------------------

    /// A shared flag the driver wires a `ctrlc` handler to, so Ctrl-C
    /// aborts the running script instead of the whole process.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn define_global(&mut self, name: impl Into<String>, value: ObjRef) {
        self.globals.insert(name.into(), value);
    }

    pub fn get_global(&self, name: &str) -> Option<ObjRef> {
        self.globals.get(name).copied()
    }

    /// Names already bound at the global scope (built-in functions,
    /// exception types) before any user code has run -- the compiler's
    /// scope analyzer (§4.1) treats these as pre-declared globals rather
    /// than requiring a local binding site.
    pub(crate) fn global_names(&self) -> std::collections::HashSet<&str> {
        self.globals.keys().map(String::as_str).collect()
    }

    // -- type introspection ----------------------------------------------

    pub(crate) fn type_of(&self, r: ObjRef) -> ObjRef {
        match self.heap.get(r) {
            ObjectData::Int(_) => self.types.int_type,
            ObjectData::Float(_) => self.types.float_type,
            ObjectData::Bool(_) => self.types.bool_type,
            ObjectData::Str(_) => self.types.str_type,
            ObjectData::List(_) => self.types.list_type,
            ObjectData::Tuple(_) => self.types.tuple_type,
            ObjectData::Nil => self.types.nil_type,
            ObjectData::Cell(_) => self.types.nil_type,
            ObjectData::Closure(_) | ObjectData::Native(_) | ObjectData::BoundMethod { .. } => {
                self.types.function_type
            }
            ObjectData::Code(_) => self.types.type_type,
            ObjectData::Exception(e) => e.type_ref,
            ObjectData::Type(_) => self.types.type_type,
            ObjectData::Iterator(_) => self.types.iterator_type,
            ObjectData::EndIteration | ObjectData::NotImplemented => self.types.nil_type,
        }
    }

    pub(crate) fn type_name(&self, type_ref: ObjRef) -> String {
        match self.heap.get(type_ref) {
            ObjectData::Type(desc) => desc.name.to_string(),
            _ => "?".to_string(),
        }
    }

    // -- exceptions -------------------------------------------------------

    pub(crate) fn current_trace(&self) -> Vec<TraceEntry> {
        self.frames
            .iter()
            .rev()
            .map(|f| TraceEntry {
                source: self.source_name.clone(),
                line: f.code.line_for(f.ip),
                function_name: f.code.name.clone(),
            })
            .collect()
    }

    pub(crate) fn raise(&mut self, type_ref: ObjRef, message: impl Into<String>) -> Option<ObjRef> {
        let exc = crate::types::make_exception(self, type_ref, message);
        self.pending_exception = Some(exc);
        None
    }

    /// Renders an exception's message and trace for top-level reporting
    /// (§10, an uncaught exception's CLI presentation).
    pub fn render_exception(&self, exc: ObjRef) -> String {
        match self.heap.get(exc) {
            ObjectData::Exception(e) => {
                let name = self.type_name(e.type_ref);
                let mut out = format!("{name}: {}", e.message);
                for entry in &entry_lines(&e.trace) {
                    out.push('\n');
                    out.push_str(entry);
                }
                out
            }
            _ => "не обробили виняток".to_string(),
        }
    }

    // -- rendering ----------------------------------------------------

    pub(crate) fn render_sequence(&mut self, open: char, close: char, items: &[ObjRef]) -> String {
        let mut out = String::new();
        out.push(open);
        for (i, &item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&self.display(item));
        }
        out.push(close);
        out
    }

    /// `to_string` for diagnostics and interpolation; falls back to
    /// the object's kind name if the type has no `to_string` operator.
    pub(crate) fn display(&mut self, r: ObjRef) -> String {
        let type_ref = self.type_of(r);
        let op = match self.heap.get(type_ref) {
            ObjectData::Type(desc) => desc.operators.to_string,
            _ => None,
        };
        match op.and_then(|f| f(self, r)) {
            Some(s) => match self.heap.get(s) {
                ObjectData::Str(chars) => chars.iter().collect(),
                _ => String::new(),
            },
            None => self.heap.get(r).kind_name().to_string(),
        }
    }

    // -- comparisons ----------------------------------------------------

    /// Three-way result of asking a type's `comparison` operator to
    /// order two values: a definite `Ordering`, the "unordered" sentinel
    /// a type reports for its own incomparable values (NaN vs anything,
    /// §8), or "no operator agreed to compare these at all" (§4.3).
    fn compare_raw(&mut self, a: ObjRef, b: ObjRef) -> Cmp {
        let type_ref = self.type_of(a);
        let op = match self.heap.get(type_ref) {
            ObjectData::Type(desc) => desc.operators.comparison,
            _ => None,
        };
        let Some(op) = op else { return Cmp::NotComparable };
        let Some(result) = op(self, a, b) else { return Cmp::NotComparable };
        if result == self.not_implemented {
            return Cmp::NotComparable;
        }
        match self.heap.get(result) {
            ObjectData::Int(0) => Cmp::Ordered(Ordering::Equal),
            ObjectData::Int(v) if *v < 0 => Cmp::Ordered(Ordering::Less),
            ObjectData::Int(1) => Cmp::Ordered(Ordering::Greater),
            _ => Cmp::Unordered,
        }
    }

    /// `None` covers both "unordered" (NaN) and "not comparable"
    /// (heterogeneous types); callers that need to tell those apart use
    /// `compare_raw` directly.
    pub(crate) fn compare_values(&mut self, a: ObjRef, b: ObjRef) -> Option<Ordering> {
        match self.compare_raw(a, b) {
            Cmp::Ordered(ord) => Some(ord),
            Cmp::Unordered | Cmp::NotComparable => None,
        }
    }

    pub(crate) fn lexicographic_compare(&mut self, a: &[ObjRef], b: &[ObjRef]) -> ObjRef {
        for (&x, &y) in a.iter().zip(b.iter()) {
            match self.compare_values(x, y) {
                Some(Ordering::Equal) => continue,
                Some(ord) => return self.alloc_int(ord as i8 as i64),
                None => return self.not_implemented,
            }
        }
        self.alloc_int((a.len().cmp(&b.len()) as i8) as i64)
    }

    fn dispatch_compare(&mut self, op: CompareOperator, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
        if matches!(op, CompareOperator::Is | CompareOperator::IsNot) {
            let same = a == b;
            let result = if op == CompareOperator::Is { same } else { !same };
            return Some(self.alloc_bool(result));
        }
        match self.compare_raw(a, b) {
            Cmp::Ordered(ord) => {
                let result = match op {
                    CompareOperator::Eq => ord == Ordering::Equal,
                    CompareOperator::NotEq => ord != Ordering::Equal,
                    CompareOperator::Gt => ord == Ordering::Greater,
                    CompareOperator::Ge => ord != Ordering::Less,
                    CompareOperator::Lt => ord == Ordering::Less,
                    CompareOperator::Le => ord != Ordering::Greater,
                    CompareOperator::Is | CompareOperator::IsNot => unreachable!(),
                };
                Some(self.alloc_bool(result))
            }
            // NaN-style unordered: every ordering query is false, equality
            // is false, inequality is true, and none of this raises (§8).
            Cmp::Unordered => {
                let result = matches!(op, CompareOperator::NotEq);
                Some(self.alloc_bool(result))
            }
            // Heterogeneous/incomparable types: equality falls back to
            // identity without raising; ordering is a TypeError (§4.3).
            Cmp::NotComparable => match op {
                CompareOperator::Eq => Some(self.alloc_bool(a == b)),
                CompareOperator::NotEq => Some(self.alloc_bool(a != b)),
                _ => {
                    let type_error = self.types.type_error;
                    let (ta, tb) = (self.type_name(self.type_of(a)), self.type_name(self.type_of(b)));
                    self.raise(type_error, format!("неможливо порівняти {ta} і {tb}"))
                }
            },
        }
    }

    fn dispatch_unary(&mut self, op: UnaryOperator, r: ObjRef) -> Option<ObjRef> {
        let type_ref = self.type_of(r);
        let field = match self.heap.get(type_ref) {
            ObjectData::Type(desc) => match op {
                UnaryOperator::Plus => desc.operators.pos,
                UnaryOperator::Minus => desc.operators.neg,
                UnaryOperator::Not => desc.operators.to_bool,
            },
            _ => None,
        };
        match field.and_then(|f| f(self, r)) {
            Some(v) if op == UnaryOperator::Not => {
                let truthy = matches!(self.heap.get(v), ObjectData::Bool(true));
                Some(self.alloc_bool(!truthy))
            }
            Some(v) => Some(v),
            None if self.pending_exception.is_some() => None,
            None => {
                let type_error = self.types.type_error;
                let tname = self.type_name(type_ref);
                self.raise(type_error, format!("{op} не підтримується для {tname}"))
            }
        }
    }

    fn dispatch_binary(&mut self, op: BinaryOperator, a: ObjRef, b: ObjRef) -> Option<ObjRef> {
        let ta = self.type_of(a);
        let field = |vm: &Vm, t: ObjRef| match vm.heap.get(t) {
            ObjectData::Type(desc) => match op {
                BinaryOperator::Add => desc.operators.add,
                BinaryOperator::Subtract => desc.operators.sub,
                BinaryOperator::Multiply => desc.operators.mul,
                BinaryOperator::Divide => desc.operators.div,
                BinaryOperator::FloorDiv => desc.operators.floor_div,
                BinaryOperator::Modulo => desc.operators.modulo,
            },
            _ => None,
        };
        if let Some(f) = field(self, ta) {
            match f(self, a, b) {
                None => return None,
                Some(v) if v != self.not_implemented => return Some(v),
                _ => {}
            }
        }
        let tb = self.type_of(b);
        if let Some(f) = field(self, tb) {
            match f(self, b, a) {
                None => return None,
                Some(v) if v != self.not_implemented => return Some(v),
                _ => {}
            }
        }
        let type_error = self.types.type_error;
        let (na, nb) = (self.type_name(ta), self.type_name(tb));
        self.raise(type_error, format!("{op} не підтримується для {na} і {nb}"))
    }

    fn get_attr(&mut self, object: ObjRef, name: &str) -> Option<ObjRef> {
        let mut type_ref = self.type_of(object);
        loop {
            let (found, base) = match self.heap.get(type_ref) {
                ObjectData::Type(desc) => (desc.attributes.get(name).copied(), desc.base),
                _ => (None, None),
            };
            if let Some(attr) = found {
                let is_method = matches!(self.heap.get(attr), ObjectData::Native(nf) if nf.info.is_method);
                return if is_method {
                    Some(self.alloc_heap(ObjectData::BoundMethod { instance: object, method: attr }))
                } else {
                    Some(attr)
                };
            }
            match base {
                Some(b) => type_ref = b,
                None => {
                    let attribute_error = self.types.attribute_error;
                    let tname = self.type_name(self.type_of(object));
                    return self.raise(attribute_error, format!("{tname} не має атрибута {name}"));
                }
            }
        }
    }

    // -- calling ----------------------------------------------------------

    pub(crate) fn call_value(
        &mut self,
        callable: ObjRef,
        args: &[ObjRef],
        kwargs: &[(String, ObjRef)],
    ) -> Option<ObjRef> {
        if self.frames.len() >= self.max_call_depth {
            let internal_error = self.types.internal_error;
            return self.raise(internal_error, "перевищено максимальну глибину викликів");
        }
        match self.heap.get(callable) {
            ObjectData::Native(nf) => {
                let func = nf.func;
                let arity = nf.info.arity;
                if !nf.info.is_variadic && args.len() != arity {
                    let type_error = self.types.type_error;
                    return self.raise(
                        type_error,
                        format!("очікувалось {arity} аргумент(ів), отримано {}", args.len()),
                    );
                }
                func(self, None, args)
            }
            ObjectData::BoundMethod { instance, method } => {
                let instance = *instance;
                let method = *method;
                match self.heap.get(method) {
                    ObjectData::Native(nf) => {
                        let func = nf.func;
                        func(self, Some(instance), args)
                    }
                    _ => {
                        let type_error = self.types.type_error;
                        self.raise(type_error, "метод не викликається")
                    }
                }
            }
            ObjectData::Closure(_) => self.call_closure(callable, args, kwargs),
            _ => {
                let type_error = self.types.type_error;
                let tname = self.type_name(self.type_of(callable));
                self.raise(type_error, format!("{tname} не викликається"))
            }
        }
    }

    fn call_closure(
        &mut self,
        callable: ObjRef,
        args: &[ObjRef],
        kwargs: &[(String, ObjRef)],
    ) -> Option<ObjRef> {
        let (code, cells, defaults) = match self.heap.get(callable) {
            ObjectData::Closure(c) => (Rc::clone(match self.heap.get(c.code) {
                ObjectData::Code(code) => code,
                _ => unreachable!("closure code slot must hold a Code object"),
            }), c.cells.clone(), c.defaults.clone()),
            _ => unreachable!("call_closure on non-closure"),
        };

        let mut positional: Vec<Option<ObjRef>> = vec![None; code.param_names.len()];
        let required = code.arity - code.default_count;

        if args.len() > code.param_names.len() && !code.is_variadic {
            let type_error = self.types.type_error;
            return self.raise(
                type_error,
                format!("забагато аргументів для {}", code.name),
            );
        }
        let plain_count = args.len().min(code.param_names.len());
        for (slot, &value) in positional.iter_mut().zip(args[..plain_count].iter()) {
            *slot = Some(value);
        }

        if !kwargs.is_empty() && code.default_count == 0 {
            let type_error = self.types.type_error;
            return self.raise(type_error, "немає параметрів за замовчуванням");
        }

        for (name, value) in kwargs {
            match code.param_names.iter().position(|n| n == name) {
                Some(i) if positional[i].is_none() => positional[i] = Some(*value),
                Some(_) => {
                    let type_error = self.types.type_error;
                    return self.raise(type_error, format!("повторний іменований аргумент: {name}"));
                }
                None => {
                    let type_error = self.types.type_error;
                    return self.raise(type_error, format!("невідомий іменований аргумент: {name}"));
                }
            }
        }

        for (i, name) in code.param_names.iter().enumerate() {
            if positional[i].is_none() {
                let default_idx = i as isize - required as isize;
                if default_idx >= 0 {
                    positional[i] = Some(defaults[default_idx as usize]);
                } else {
                    let type_error = self.types.type_error;
                    return self.raise(
                        type_error,
                        format!("відсутній обов'язковий аргумент: {name}"),
                    );
                }
            }
        }

        let mut frame = Frame::new(Rc::clone(&code), self.nil);
        for _ in 0..code.cells.len() {
            let nil = self.nil;
            let cell = self.alloc_heap(ObjectData::Cell(nil));
            frame.cell_slots.push(cell);
        }
        frame.cell_slots.extend(cells.iter().copied());

        if let Some(self_name) = code.self_name.as_ref() {
            if let Some(slot) = code.cell_slot(self_name) {
                if let ObjectData::Cell(inner) = self.heap.get_mut(frame.cell_slots[slot]) {
                    *inner = callable;
                }
            } else if let Some(slot) = code.local_slot(self_name) {
                frame.locals[slot] = callable;
            }
        }

        for (i, name) in code.param_names.iter().enumerate() {
            let value = positional[i].expect("validated above");
            if code.args_as_cells.contains(name) {
                let slot = code.cell_slot(name).expect("args_as_cells name must be a cell");
                if let ObjectData::Cell(inner) = self.heap.get_mut(frame.cell_slots[slot]) {
                    *inner = value;
                }
            } else if let Some(slot) = code.local_slot(name) {
                frame.locals[slot] = value;
            }
        }

        if code.is_variadic {
            let extra: Vec<ObjRef> = args.get(code.param_names.len()..).unwrap_or(&[]).to_vec();
            let tuple = self.alloc_heap(ObjectData::Tuple(extra));
            if let Some(name) = code.variadic_name.as_ref() {
                if code.args_as_cells.contains(name) {
                    let slot = code.cell_slot(name).unwrap();
                    if let ObjectData::Cell(inner) = self.heap.get_mut(frame.cell_slots[slot]) {
                        *inner = tuple;
                    }
                } else if let Some(slot) = code.local_slot(name) {
                    frame.locals[slot] = tuple;
                }
            }
        }

        let target_depth = self.frames.len();
        self.frames.push(frame);
        self.run_until(target_depth)
    }

    // -- main loop ----------------------------------------------------

    fn run_until(&mut self, target_depth: usize) -> Option<ObjRef> {
        loop {
            if self.frames.len() <= target_depth {
                return None;
            }
            if self.interrupted.swap(false, AtomicOrdering::Relaxed) {
                let internal_error = self.types.internal_error;
                self.raise(internal_error, "перервано користувачем");
            }
            match self.step() {
                Flow::Continue => {}
                Flow::Returned(v) => {
                    if self.frames.len() == target_depth {
                        return Some(v);
                    }
                    self.frames.last_mut().unwrap().stack.push(v);
                }
                Flow::Raised => {
                    if self.frames.len() == target_depth {
                        return None;
                    }
                }
            }
        }
    }

    fn step(&mut self) -> Flow {
        if self.pending_exception.is_some() {
            return self.handle_pending_exception();
        }
        self.execute_next_instruction()
    }

    fn handle_pending_exception(&mut self) -> Flow {
        let exc = self.pending_exception.take().expect("pending exception");
        let frame = self.frames.last_mut().expect("no active frame for pending exception");
        let fault_ip = frame.ip;
        // An exception raised in the try body or in a catch body of the
        // same construct (`fault_ip` anywhere up to `handlers_end`, the
        // `RERAISE` address) re-enters the catches rather than unwinding
        // past this region -- it may match a later catch, and either way
        // it still has to run through `finally` (§4.7).
        let region_idx = frame
            .active_regions
            .iter()
            .rev()
            .find(|&&ri| {
                let r = &frame.code.protected_regions[ri];
                fault_ip >= r.try_start && fault_ip < r.handlers_end
            })
            .copied();
        match region_idx {
            Some(ri) => {
                let region = frame.code.protected_regions[ri].clone();
                frame.stack.truncate(region.stack_depth);
                frame.ip = region.handlers_start;
                frame.stack.push(exc);
                Flow::Continue
            }
            None => {
                self.frames.pop();
                self.pending_exception = Some(exc);
                Flow::Raised
            }
        }
    }

    fn execute_next_instruction(&mut self) -> Flow {
        let ip = self.frames.last().unwrap().ip;
        let inst = self.frames.last().unwrap().code.insts[ip].clone();
        let mut next_ip = ip + 1;

        macro_rules! frame {
            () => {
                self.frames.last_mut().unwrap()
            };
        }
        macro_rules! pop {
            () => {
                frame!().stack.pop().expect("operand stack underflow")
            };
        }
        macro_rules! push {
            ($v:expr) => {
                frame!().stack.push($v)
            };
        }

        match inst {
            Inst::Pop => {
                pop!();
            }
            Inst::Dup => {
                let v = *frame!().stack.last().unwrap();
                push!(v);
            }
            Inst::LoadConst(i) => {
                let v = frame!().code.constants[i];
                push!(v);
            }
            Inst::LoadGlobal(i) => {
                let name = frame!().code.names[i].clone();
                match self.get_global(&name) {
                    Some(v) => push!(v),
                    None => {
                        let name_error = self.types.name_error;
                        self.raise(name_error, format!("ім'я не визначено: {name}"));
                    }
                }
            }
            Inst::StoreGlobal(i) => {
                let name = frame!().code.names[i].clone();
                let v = pop!();
                self.define_global(name, v);
            }
            Inst::DeleteGlobal(i) => {
                let name = frame!().code.names[i].clone();
                self.globals.shift_remove(&name);
            }
            Inst::LoadLocal(i) => {
                let v = frame!().locals[i];
                push!(v);
            }
            Inst::StoreLocal(i) => {
                let v = pop!();
                frame!().locals[i] = v;
            }
            Inst::DeleteLocal(i) => {
                let nil = self.nil;
                frame!().locals[i] = nil;
            }
            Inst::LoadCell(i) => {
                let cell = frame!().cell_slots[i];
                let v = match self.heap.get(cell) {
                    ObjectData::Cell(inner) => *inner,
                    _ => self.nil,
                };
                push!(v);
            }
            Inst::StoreCell(i) => {
                let v = pop!();
                let cell = frame!().cell_slots[i];
                if let ObjectData::Cell(inner) = self.heap.get_mut(cell) {
                    *inner = v;
                }
            }
            Inst::GetCell(i) => {
                let cell = frame!().cell_slots[i];
                push!(cell);
            }
            Inst::GetAttr(i) => {
                let name = frame!().code.names[i].clone();
                let obj = pop!();
                if let Some(v) = self.get_attr(obj, &name) {
                    push!(v);
                }
            }
            Inst::UnaryOp(op) => {
                let v = pop!();
                if let Some(r) = self.dispatch_unary(op, v) {
                    push!(r);
                }
            }
            Inst::BinaryOp(op) => {
                let b = pop!();
                let a = pop!();
                if let Some(r) = self.dispatch_binary(op, a, b) {
                    push!(r);
                }
            }
            Inst::Compare(op) => {
                let b = pop!();
                let a = pop!();
                if let Some(r) = self.dispatch_compare(op, a, b) {
                    push!(r);
                }
            }
            Inst::Not => {
                let v = pop!();
                let truthy = self.truthy(v);
                let r = self.alloc_bool(!truthy);
                push!(r);
            }
            Inst::BuildList(n) => {
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(pop!());
                }
                items.reverse();
                let v = self.alloc_heap(ObjectData::List(items));
                push!(v);
            }
            Inst::BuildTuple(n) => {
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(pop!());
                }
                items.reverse();
                let v = self.alloc_heap(ObjectData::Tuple(items));
                push!(v);
            }
            Inst::BuildString(n) => {
                let mut parts = Vec::with_capacity(n);
                for _ in 0..n {
                    parts.push(pop!());
                }
                parts.reverse();
                let mut s = String::new();
                for p in parts {
                    s.push_str(&self.display(p));
                }
                let v = self.alloc_str(s);
                push!(v);
            }
            Inst::Jmp(target) => {
                next_ip = target;
            }
            Inst::JmpIfTrue(target) => {
                let v = pop!();
                if self.truthy(v) {
                    next_ip = target;
                }
            }
            Inst::JmpIfFalse(target) => {
                let v = pop!();
                if !self.truthy(v) {
                    next_ip = target;
                }
            }
            Inst::JmpIfTrueOrPop(target) => {
                let v = *frame!().stack.last().unwrap();
                if self.truthy(v) {
                    next_ip = target;
                } else {
                    pop!();
                }
            }
            Inst::JmpIfFalseOrPop(target) => {
                let v = *frame!().stack.last().unwrap();
                if !self.truthy(v) {
                    next_ip = target;
                } else {
                    pop!();
                }
            }
            Inst::GetIter => {
                let v = pop!();
                let type_ref = self.type_of(v);
                let op = match self.heap.get(type_ref) {
                    ObjectData::Type(desc) => desc.operators.get_iter,
                    _ => None,
                };
                match op.and_then(|f| f(self, v)) {
                    Some(r) => push!(r),
                    None if self.pending_exception.is_some() => {}
                    None => {
                        let type_error = self.types.type_error;
                        let tname = self.type_name(type_ref);
                        self.raise(type_error, format!("{tname} не ітерується"));
                    }
                }
            }
            Inst::ForIter(exit_target) => {
                let iter_ref = *frame!().stack.last().unwrap();
                // Routed through ordinary attribute dispatch: the iterator
                // protocol is just an object exposing a `next` method
                // (§4.5), not a VM-internal index.
                match self.get_attr(iter_ref, "next") {
                    Some(next_method) => match self.call_value(next_method, &[], &[]) {
                        Some(v) if v == self.end_iteration => {
                            pop!(); // drop the exhausted iterator
                            next_ip = exit_target;
                        }
                        Some(v) => push!(v),
                        None => {}
                    },
                    None => {}
                }
            }
            Inst::Call(argc) => {
                let mut args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    args.push(pop!());
                }
                args.reverse();
                let callable = pop!();
                if let Some(r) = self.call_value(callable, &args, &[]) {
                    push!(r);
                }
            }
            Inst::CallNamed(positional, named) => {
                let mut kwargs = Vec::with_capacity(named);
                for _ in 0..named {
                    let value = pop!();
                    let name_ref = pop!();
                    let name = match self.heap.get(name_ref) {
                        ObjectData::Str(s) => s.iter().collect(),
                        _ => String::new(),
                    };
                    kwargs.push((name, value));
                }
                kwargs.reverse();
                let mut args = Vec::with_capacity(positional);
                for _ in 0..positional {
                    args.push(pop!());
                }
                args.reverse();
                let callable = pop!();
                if let Some(r) = self.call_value(callable, &args, &kwargs) {
                    push!(r);
                }
            }
            Inst::MakeFunction(const_idx) => {
                let code_ref = frame!().code.constants[const_idx];
                let code = match self.heap.get(code_ref) {
                    ObjectData::Code(c) => Rc::clone(c),
                    _ => unreachable!("MakeFunction operand must be a Code constant"),
                };
                let mut cells = Vec::with_capacity(code.freevars.len());
                for _ in 0..code.freevars.len() {
                    cells.push(pop!());
                }
                cells.reverse();
                let mut defaults = Vec::with_capacity(code.default_count);
                for _ in 0..code.default_count {
                    defaults.push(pop!());
                }
                defaults.reverse();
                let closure = self.alloc_heap(ObjectData::Closure(Closure { code: code_ref, cells, defaults }));
                push!(closure);
            }
            Inst::Return => {
                let v = pop!();
                self.frames.pop();
                return Flow::Returned(v);
            }
            Inst::Try(region_idx) => {
                frame!().active_regions.push(region_idx);
            }
            Inst::EndTry => {
                let f = frame!();
                let region_idx = f.active_regions.pop().expect("EndTry without matching Try");
                if let Some(exc) = f.deferred_exception.take() {
                    let _ = region_idx;
                    self.pending_exception = Some(exc);
                }
            }
            Inst::Catch(next_handler_ip) => {
                let type_ref = pop!();
                let exc = *frame!().stack.last().unwrap();
                let exc_type = match self.heap.get(exc) {
                    ObjectData::Exception(e) => e.type_ref,
                    _ => exc,
                };
                if self.types.is_instance_of(self, exc_type, type_ref) {
                    // fall through into the handler body, exc stays on stack
                } else {
                    next_ip = next_handler_ip;
                }
            }
            Inst::Raise => {
                let v = pop!();
                let already_exc = matches!(self.heap.get(v), ObjectData::Exception(_));
                let (exc_type, message) = if already_exc {
                    match self.heap.get(v) {
                        ObjectData::Exception(e) => (e.type_ref, e.message.clone()),
                        _ => unreachable!(),
                    }
                } else {
                    (self.types.value_error, self.display(v))
                };
                self.raise(exc_type, message);
            }
            Inst::Reraise => {
                let v = pop!();
                frame!().deferred_exception = Some(v);
            }
        }

        if self.pending_exception.is_none() {
            if let Some(f) = self.frames.last_mut() {
                f.ip = next_ip;
            }
            Flow::Continue
        } else if self.frames.is_empty() {
            Flow::Raised
        } else {
            Flow::Continue
        }
    }

    pub(crate) fn truthy(&mut self, r: ObjRef) -> bool {
        if r == self.nil {
            return false;
        }
        let type_ref = self.type_of(r);
        let op = match self.heap.get(type_ref) {
            ObjectData::Type(desc) => desc.operators.to_bool,
            _ => None,
        };
        match op.and_then(|f| f(self, r)) {
            Some(b) => matches!(self.heap.get(b), ObjectData::Bool(true)),
            None => true,
        }
    }

    /// Runs a top-level module's code object to completion (§10). The
    /// top frame has no caller to return into, so `target_depth` is 0.
    pub fn execute(&mut self, code: Rc<Code>) -> Result<VMState, RuntimeErr> {
        let frame = Frame::new(code, self.nil);
        self.frames.push(frame);
        match self.run_until(0) {
            Some(_) => Ok(VMState::Halted(0)),
            None => match self.pending_exception.take() {
                Some(exc) => Err(RuntimeErr::uncaught(self.render_exception(exc))),
                None => Ok(VMState::Idle),
            },
        }
    }
}

fn entry_lines(trace: &[TraceEntry]) -> Vec<String> {
    trace.iter().map(|t| format!("  у {} (рядок {})", t.function_name, t.line)).collect()
}

/// Native-function helper used by `builtin_funcs`: wraps a plain `fn`
/// pointer with its calling-convention metadata.
pub(crate) fn native_fn(name: &str, arity: usize, is_variadic: bool, func: NativeFn) -> NativeFunc {
    NativeFunc {
        name: name.to_string(),
        info: CallableInfo { arity, is_variadic, default_count: 0, is_method: false },
        func,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exe;

    fn run_ok(source: &str) -> Vm {
        let mut vm = Vm::new("<тест>");
        let code = exe::compile_text(&mut vm, source).expect("compile");
        vm.execute(code).expect("execute");
        vm
    }

    fn global_int(vm: &Vm, name: &str) -> i64 {
        let r = vm.get_global(name).unwrap_or_else(|| panic!("no global named {name}"));
        match vm.heap.get(r) {
            ObjectData::Int(v) => *v,
            other => panic!("{name} is a {}, not an Int", other.kind_name()),
        }
    }

    fn global_bool(vm: &Vm, name: &str) -> bool {
        let r = vm.get_global(name).unwrap_or_else(|| panic!("no global named {name}"));
        match vm.heap.get(r) {
            ObjectData::Bool(v) => *v,
            other => panic!("{name} is a {}, not a Bool", other.kind_name()),
        }
    }

    /// A Fibonacci generator closure: the nested function mutates the
    /// enclosing locals, so the scope analyzer must promote `а`/`б` to
    /// cells shared between the two frames (§4.1, §4.4).
    #[test]
    fn fibonacci_closure() {
        let vm = run_ok(
            r#"
функція зробити_фібоначчі()
    а = 0
    б = 1
    функція далі()
        результат = а
        нове = а + б
        а = б
        б = нове
        повернути результат
    кінець
    повернути далі
кінець

фіб = зробити_фібоначчі()
х0 = фіб()
х1 = фіб()
х2 = фіб()
х3 = фіб()
х4 = фіб()
"#,
        );
        assert_eq!(global_int(&vm, "х0"), 0);
        assert_eq!(global_int(&vm, "х1"), 1);
        assert_eq!(global_int(&vm, "х2"), 1);
        assert_eq!(global_int(&vm, "х3"), 2);
        assert_eq!(global_int(&vm, "х4"), 3);
    }

    /// An exception raised inside a catch body of the same construct
    /// must retry the remaining catches and still run `finally` before
    /// re-raising to the caller (§4.3, §4.7) -- not unwind straight past
    /// both.
    #[test]
    fn try_catch_finally_ordering() {
        let vm = run_ok(
            r#"
нарешті_виконано = хиба
тип_спіймано = хиба

спробувати
    спробувати
        викинути "a"
    зловити ЗначенняПомилка як e
        викинути "b"
    нарешті
        нарешті_виконано = істина
    кінець
зловити ТипПомилка як e2
    тип_спіймано = істина
кінець
"#,
        );
        assert!(global_bool(&vm, "нарешті_виконано"), "finally must run before the re-raise escapes");
        assert!(global_bool(&vm, "тип_спіймано"), "the re-raised TypeError must reach the outer catch");
    }

    /// Named arguments fill default parameters (§4.2); already-filled
    /// positional slots and a function with no defaults at all are both
    /// rejected.
    #[test]
    fn named_args_and_defaults() {
        let vm = run_ok(
            r#"
функція f(x, y=10, z=20)
    повернути x + y + z
кінець
а = f(1, z=5)
"#,
        );
        assert_eq!(global_int(&vm, "а"), 16);

        let dup_parse = crate::parser::parse_text("f(1, z=5, z=6)");
        assert!(dup_parse.is_err(), "repeating a named argument must be rejected at parse time");

        let already_filled = exe::execute_text(
            &mut Vm::new("<тест>"),
            r#"
функція g(x, y=10)
    повернути x + y
кінець
в = g(1, 2, x=5)
"#,
            false,
        );
        assert!(already_filled.is_err(), "a kwarg can't refill a slot a positional arg already set");

        let no_defaults = exe::execute_text(
            &mut Vm::new("<тест>"),
            r#"
функція h(x, y)
    повернути x + y
кінець
г = h(1, y=2)
"#,
            false,
        );
        assert!(no_defaults.is_err(), "kwargs are only legal when the function has default parameters");
    }

    /// Sorting a list whose elements aren't pairwise comparable raises
    /// `TypeError` rather than failing silently (§4.5).
    #[test]
    fn list_sort_raises_on_incomparable_elements() {
        let vm = run_ok(
            r#"
спіймано = хиба
спробувати
    список = [3, "a", 2]
    список.впорядкувати()
зловити ТипПомилка як e
    спіймано = істина
кінець
"#,
        );
        assert!(global_bool(&vm, "спіймано"));
    }

    /// A closure that captures a cell holding a reference back to
    /// itself is a genuine reference cycle; the mark-and-sweep collector
    /// (unlike a refcounting one) must still reclaim it once the last
    /// external reference is dropped (§4.6).
    #[test]
    fn gc_reclaims_cyclic_closures() {
        let mut vm = run_ok(
            r#"
функція зробити()
    тримач = нич
    функція замкнення()
        повернути тримач
    кінець
    тримач = замкнення
    повернути замкнення
кінець

i = 0
поки i < 500
    тимчасова = зробити()
    i = i + 1
кінець
"#,
        );
        vm.collect_garbage();
        assert!(vm.heap.len() < 100, "cyclic closures from dropped loop iterations must be collected, got {}", vm.heap.len());
    }

    /// Disassembling the same source twice must produce byte-identical
    /// output (§9): no nondeterminism from allocation order or iteration
    /// over unordered collections.
    #[test]
    fn disassembly_is_deterministic() {
        let source = "функція квадрат(x)\n    повернути x * x\nкінець\nа = квадрат(4)\n";

        let mut vm1 = Vm::new("<тест>");
        let code1 = exe::compile_text(&mut vm1, source).expect("compile 1");
        let dis1 = crate::vm::disassemble(&vm1, &code1);

        let mut vm2 = Vm::new("<тест>");
        let code2 = exe::compile_text(&mut vm2, source).expect("compile 2");
        let dis2 = crate::vm::disassemble(&vm2, &code2);

        assert_eq!(dis1, dis2);
        assert!(dis1.contains("квадрат"));
    }
}
