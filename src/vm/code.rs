//! A compiled unit of code (§3 "Code object", §4.2). Holds the
//! instruction stream, the constant pool, and the name tables the
//! compiler resolved ahead of time so the VM never has to look a name
//! up by string at run time except for globals and attributes.
use crate::types::ObjRef;

use super::inst::Inst;

/// One `try`/`catch*`/`finally` region (§4.7). Indices are into the
/// owning `Code`'s instruction stream.
#[derive(Clone, Debug)]
pub(crate) struct ProtectedRegion {
    pub try_start: usize,
    pub try_end: usize,
    pub handlers_start: usize,
    /// End of the last catch body (the `RERAISE` instruction's address).
    /// An exception raised anywhere in `[try_start, handlers_end)` --
    /// the try body or a catch body -- re-enters `handlers_start` to try
    /// the catches again, rather than unwinding past this region.
    pub handlers_end: usize,
    /// `None` when there's no `finally` block.
    pub finally_start: Option<usize>,
    pub region_end: usize,
    /// Operand-stack depth at the matching `Try` instruction, restored
    /// before jumping into a handler (§4.7 unwind).
    pub stack_depth: usize,
}

#[derive(Default)]
pub(crate) struct Code {
    pub name: String,
    /// Number of declared positional parameters, including defaulted
    /// ones, excluding a trailing variadic parameter.
    pub arity: usize,
    pub default_count: usize,
    pub is_variadic: bool,

    pub insts: Vec<Inst>,
    pub constants: Vec<ObjRef>,

    /// Names referenced by `LoadGlobal`/`StoreGlobal`/`DeleteGlobal`
    /// and by `GetAttr`/`LoadMethod`.
    pub names: Vec<String>,

    /// Slot table for the frame's local region, in declaration order.
    /// Covers every positional parameter, the variadic parameter (if
    /// any), and every other name the scope analyzer left classified
    /// as `Local` (for-each variables, catch bindings).
    pub locals: Vec<String>,
    /// This function's own promoted names -- locals an inner function
    /// closes over (§4.1). Occupies the frame's cell-slot region,
    /// immediately following `freevars` in address order.
    pub cells: Vec<String>,
    /// Names captured from an enclosing function's cells.
    pub freevars: Vec<String>,
    /// Parameter names that were promoted to cells: the call prologue
    /// fills their ordinary local slot from the argument first, then
    /// copies that value into the corresponding cell (§4.3).
    pub args_as_cells: Vec<String>,

    /// Declared positional parameter names, in order; used by the call
    /// prologue to resolve named arguments and to fill defaults.
    pub param_names: Vec<String>,
    /// Name of the trailing variadic parameter, if any. Kept as its own
    /// field rather than inferred positionally from `locals`, since a
    /// promoted (cell) parameter doesn't occupy a `locals` slot at all.
    pub variadic_name: Option<String>,
    /// The function's own declared name, bound as a local inside its
    /// own scope (§4.1) so straightforward recursion resolves without
    /// going through a global lookup. `None` for the top-level module.
    pub self_name: Option<String>,

    /// Maps instruction index to source line, sorted and sparse: a
    /// given line covers every instruction up to the next entry.
    pub line_map: Vec<(usize, usize)>,

    pub protected_regions: Vec<ProtectedRegion>,
}

impl Code {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn constants(&self) -> &[ObjRef] {
        &self.constants
    }

    pub fn add_const(&mut self, obj: ObjRef) -> usize {
        self.constants.push(obj);
        self.constants.len() - 1
    }

    pub fn add_name(&mut self, name: &str) -> usize {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return i;
        }
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    pub fn add_local(&mut self, name: &str) -> usize {
        if let Some(i) = self.locals.iter().position(|n| n == name) {
            return i;
        }
        self.locals.push(name.to_string());
        self.locals.len() - 1
    }

    /// Index of `name` within the combined `[cells, freevars]` address
    /// space that `LoadCell`/`StoreCell`/`GetCell` index into.
    pub fn cell_slot(&self, name: &str) -> Option<usize> {
        self.cells
            .iter()
            .position(|n| n == name)
            .or_else(|| self.freevars.iter().position(|n| n == name).map(|i| i + self.cells.len()))
    }

    pub fn local_slot(&self, name: &str) -> Option<usize> {
        self.locals.iter().position(|n| n == name)
    }

    pub fn line_for(&self, ip: usize) -> usize {
        match self.line_map.binary_search_by_key(&ip, |&(i, _)| i) {
            Ok(idx) => self.line_map[idx].1,
            Err(0) => 0,
            Err(idx) => self.line_map[idx - 1].1,
        }
    }

    pub fn record_line(&mut self, line: usize) {
        let ip = self.insts.len();
        if self.line_map.last().map(|&(_, l)| l) != Some(line) {
            self.line_map.push((ip, line));
        }
    }

    pub fn push(&mut self, inst: Inst) -> usize {
        let ip = self.insts.len();
        self.insts.push(inst);
        ip
    }

    pub fn patch_jmp_target(&mut self, at: usize, target: usize) {
        self.insts[at] = match &self.insts[at] {
            Inst::Jmp(_) => Inst::Jmp(target),
            Inst::JmpIfTrue(_) => Inst::JmpIfTrue(target),
            Inst::JmpIfFalse(_) => Inst::JmpIfFalse(target),
            Inst::JmpIfTrueOrPop(_) => Inst::JmpIfTrueOrPop(target),
            Inst::JmpIfFalseOrPop(_) => Inst::JmpIfFalseOrPop(target),
            Inst::ForIter(_) => Inst::ForIter(target),
            Inst::Catch(_) => Inst::Catch(target),
            other => panic!("not a jump instruction: {other:?}"),
        };
    }
}
