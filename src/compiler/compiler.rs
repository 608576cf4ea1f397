//! Lowers an analyzed AST into a `Code` object (§4.2). Scope analysis
//! (`super::scope`) has already run by the time `compile` is called, so
//! every `Variable`/`Assignment` site's `resolved` annotation is in
//! place and every `FunctionDecl`'s `cell_vars`/`free_vars` are final.
//!
//! Literal constants and nested function code objects are heap values,
//! so compilation needs a live `Vm` to allocate into -- threaded
//! through every `compile_*` method as an explicit `&mut Vm` rather
//! than stashed as a field, the same "no hidden global state" shape
//! the VM itself uses for its frame stack.
use std::rc::Rc;

use crate::ast::{self, Catch, Expr, ExprKind, FunctionDecl, Module, Stmt, StmtKind, VarKind};
use crate::types::ObjectData;
use crate::util::{Location, LogicalOperator, UnaryOperator};
use crate::vm::{Code, Inst, ProtectedRegion, Vm};

use super::result::{CompErr, CompErrKind, CompResult};
use super::scope;

pub(crate) fn compile(vm: &mut Vm, module: &Module) -> CompResult {
    let builtins = vm.global_names();
    scope::analyze(module, &builtins);

    let mut c = Compiler { stack: Vec::new() };
    c.stack.push(FuncCtx::new(Code::new("$голов")));
    c.compile_block(vm, &module.body)?;
    c.emit_return_nil(vm);
    let ctx = c.stack.pop().expect("module frame");
    Ok(Rc::new(ctx.code))
}

struct LoopCtx {
    header: usize,
    break_sites: Vec<usize>,
}

struct FuncCtx {
    code: Code,
    loops: Vec<LoopCtx>,
}

impl FuncCtx {
    fn new(code: Code) -> Self {
        Self { code, loops: Vec::new() }
    }
}

struct Compiler {
    stack: Vec<FuncCtx>,
}

impl Compiler {
    fn code(&mut self) -> &mut Code {
        &mut self.stack.last_mut().expect("no active code frame").code
    }

    fn is_root(&self) -> bool {
        self.stack.len() == 1
    }

    fn ip(&self) -> usize {
        self.stack.last().expect("no active code frame").code.insts.len()
    }

    fn emit(&mut self, inst: Inst) -> usize {
        self.code().push(inst)
    }

    fn patch(&mut self, at: usize, target: usize) {
        self.code().patch_jmp_target(at, target);
    }

    fn emit_return_nil(&mut self, vm: &mut Vm) {
        let nil = vm.nil;
        let idx = self.code().add_const(nil);
        self.emit(Inst::LoadConst(idx));
        self.emit(Inst::Return);
    }

    /// Where a name actually lives, given what this function's own
    /// scope analysis settled on (`cells`/`freevars` are final once
    /// compilation of this function begins) and, for names this scope
    /// never itself declares, the per-use-site hint the scope analyzer
    /// left behind.
    fn classify(&self, name: &str, resolved: Option<VarKind>) -> VarKind {
        let ctx = self.stack.last().expect("no active code frame");
        if ctx.code.cells.iter().any(|c| c == name) || ctx.code.freevars.iter().any(|f| f == name)
        {
            return VarKind::Cell;
        }
        if self.stack.len() == 1 {
            return VarKind::Global;
        }
        match resolved {
            Some(VarKind::Global) => VarKind::Global,
            _ => VarKind::Local,
        }
    }

    fn emit_load(&mut self, name: &str, resolved: Option<VarKind>) {
        match self.classify(name, resolved) {
            VarKind::Cell => {
                let slot = self.code().cell_slot(name).expect("cell slot must exist");
                self.emit(Inst::LoadCell(slot));
            }
            VarKind::Global => {
                let idx = self.code().add_name(name);
                self.emit(Inst::LoadGlobal(idx));
            }
            VarKind::Local => {
                let slot = self.code().add_local(name);
                self.emit(Inst::LoadLocal(slot));
            }
        }
    }

    fn emit_store(&mut self, name: &str, resolved: Option<VarKind>) {
        match self.classify(name, resolved) {
            VarKind::Cell => {
                let slot = self.code().cell_slot(name).expect("cell slot must exist");
                self.emit(Inst::StoreCell(slot));
            }
            VarKind::Global => {
                let idx = self.code().add_name(name);
                self.emit(Inst::StoreGlobal(idx));
            }
            VarKind::Local => {
                let slot = self.code().add_local(name);
                self.emit(Inst::StoreLocal(slot));
            }
        }
    }

    /// `завершити`/catch-exit cleanup: globals and locals get a real
    /// `DELETE_*`; a promoted (cell) binding has no such instruction, so
    /// it's reset to nil instead (§4.2's delete step, generalized).
    fn emit_delete(&mut self, vm: &mut Vm, name: &str, resolved: Option<VarKind>) {
        match self.classify(name, resolved) {
            VarKind::Cell => {
                let nil = vm.nil;
                let idx = self.code().add_const(nil);
                self.emit(Inst::LoadConst(idx));
                let slot = self.code().cell_slot(name).expect("cell slot must exist");
                self.emit(Inst::StoreCell(slot));
            }
            VarKind::Global => {
                let idx = self.code().add_name(name);
                self.emit(Inst::DeleteGlobal(idx));
            }
            VarKind::Local => {
                let slot = self.code().add_local(name);
                self.emit(Inst::DeleteLocal(slot));
            }
        }
    }

    // -- statements -------------------------------------------------

    fn compile_block(&mut self, vm: &mut Vm, block: &[Stmt]) -> Result<(), CompErr> {
        for stmt in block {
            self.compile_stmt(vm, stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, vm: &mut Vm, stmt: &Stmt) -> Result<(), CompErr> {
        self.code().record_line(stmt.location.line);
        match &stmt.kind {
            StmtKind::Expr(e) => {
                if let ExprKind::Assignment { target, op, value } = &e.kind {
                    self.compile_assignment(vm, target, *op, value)?;
                } else {
                    self.compile_expr(vm, e)?;
                    self.emit(Inst::Pop);
                }
            }
            StmtKind::While { condition, body } => self.compile_while(vm, condition, body)?,
            StmtKind::Break => {
                if self.stack.last().unwrap().loops.is_empty() {
                    return Err(CompErr::new(CompErrKind::BreakOutsideLoop, stmt.location));
                }
                let site = self.emit(Inst::Jmp(0));
                self.stack.last_mut().unwrap().loops.last_mut().unwrap().break_sites.push(site);
            }
            StmtKind::Continue => {
                if self.stack.last().unwrap().loops.is_empty() {
                    return Err(CompErr::new(CompErrKind::ContinueOutsideLoop, stmt.location));
                }
                let header = self.stack.last().unwrap().loops.last().unwrap().header;
                self.emit(Inst::Jmp(header));
            }
            StmtKind::If { condition, then_block, else_block } => {
                self.compile_if(vm, condition, then_block, else_block.as_deref())?
            }
            StmtKind::FunctionDecl(decl) => {
                self.compile_closure(vm, decl, stmt.location)?;
                let in_root = self.is_root();
                let resolved = if in_root { Some(VarKind::Global) } else { None };
                self.emit_store(&decl.name, resolved);
            }
            StmtKind::Return(value) => {
                if self.is_root() {
                    return Err(CompErr::new(CompErrKind::ReturnOutsideFunction, stmt.location));
                }
                match value {
                    Some(v) => self.compile_expr(vm, v)?,
                    None => {
                        let nil = vm.nil;
                        let idx = self.code().add_const(nil);
                        self.emit(Inst::LoadConst(idx));
                    }
                }
                self.emit(Inst::Return);
            }
            StmtKind::ForEach { var_name, iterable, body } => {
                self.compile_for_each(vm, var_name, iterable, body)?
            }
            StmtKind::TryCatch { try_block, catches, finally_block } => {
                self.compile_try(vm, try_block, catches, finally_block.as_deref())?
            }
            StmtKind::Raise(e) => {
                self.compile_expr(vm, e)?;
                self.emit(Inst::Raise);
            }
        }
        Ok(())
    }

    fn compile_assignment(
        &mut self,
        vm: &mut Vm,
        target: &Expr,
        op: ast::AssignOp,
        value: &Expr,
    ) -> Result<(), CompErr> {
        let ExprKind::Variable { name, resolved } = &target.kind else {
            return Err(CompErr::new(CompErrKind::InvalidAssignmentTarget, target.location));
        };
        let resolved = *resolved.borrow();
        match op {
            ast::AssignOp::Assign => {
                self.compile_expr(vm, value)?;
            }
            ast::AssignOp::Inplace(iop) => {
                self.emit_load(name, resolved);
                self.compile_expr(vm, value)?;
                self.emit(Inst::BinaryOp(iop.as_binary()));
            }
        }
        self.emit_store(name, resolved);
        Ok(())
    }

    fn compile_while(
        &mut self,
        vm: &mut Vm,
        condition: &Expr,
        body: &[Stmt],
    ) -> Result<(), CompErr> {
        let header = self.ip();
        self.compile_expr(vm, condition)?;
        let exit_site = self.emit(Inst::JmpIfFalse(0));
        self.stack.last_mut().unwrap().loops.push(LoopCtx { header, break_sites: Vec::new() });
        self.compile_block(vm, body)?;
        self.emit(Inst::Jmp(header));
        let exit_ip = self.ip();
        self.patch(exit_site, exit_ip);
        let loop_ctx = self.stack.last_mut().unwrap().loops.pop().unwrap();
        for site in loop_ctx.break_sites {
            self.patch(site, exit_ip);
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        vm: &mut Vm,
        condition: &Expr,
        then_block: &[Stmt],
        else_block: Option<&[Stmt]>,
    ) -> Result<(), CompErr> {
        self.compile_expr(vm, condition)?;
        let else_site = self.emit(Inst::JmpIfFalse(0));
        self.compile_block(vm, then_block)?;
        match else_block {
            Some(eb) => {
                let end_site = self.emit(Inst::Jmp(0));
                let else_ip = self.ip();
                self.patch(else_site, else_ip);
                self.compile_block(vm, eb)?;
                let end_ip = self.ip();
                self.patch(end_site, end_ip);
            }
            None => {
                let else_ip = self.ip();
                self.patch(else_site, else_ip);
            }
        }
        Ok(())
    }

    fn compile_for_each(
        &mut self,
        vm: &mut Vm,
        var_name: &str,
        iterable: &Expr,
        body: &[Stmt],
    ) -> Result<(), CompErr> {
        self.compile_expr(vm, iterable)?;
        self.emit(Inst::GetIter);
        let header = self.ip();
        let exit_site = self.emit(Inst::ForIter(0));
        self.emit_store(var_name, None);
        self.stack.last_mut().unwrap().loops.push(LoopCtx { header, break_sites: Vec::new() });
        self.compile_block(vm, body)?;
        self.emit(Inst::Jmp(header));
        let exit_ip = self.ip();
        self.patch(exit_site, exit_ip);
        let loop_ctx = self.stack.last_mut().unwrap().loops.pop().unwrap();
        for site in loop_ctx.break_sites {
            self.patch(site, exit_ip);
        }
        Ok(())
    }

    /// `спробувати`/`зловити`/`нарешті` (§4.7). Layout:
    ///
    /// ```text
    ///   TRY region
    ///   <try body>
    ///   JMP convergence      (collected)
    /// handlers_start:
    ///   <catch 1 type expr>
    ///   CATCH next_1
    ///   <store/pop binding>; <catch 1 body>; <delete binding>
    ///   JMP convergence      (collected)
    /// next_1:
    ///   ...
    /// reraise:
    ///   RERAISE
    /// convergence:
    ///   <finally body, if any>
    ///   END_TRY
    /// ```
    ///
    /// Every path -- normal completion, a matched catch, or no catch
    /// matching -- runs through `finally` (if present) and always hits
    /// exactly one `END_TRY`, keeping the frame's active-region stack
    /// balanced.
    fn compile_try(
        &mut self,
        vm: &mut Vm,
        try_block: &[Stmt],
        catches: &[Catch],
        finally_block: Option<&[Stmt]>,
    ) -> Result<(), CompErr> {
        let region_idx = self.code().protected_regions.len();
        self.code().protected_regions.push(ProtectedRegion {
            try_start: 0,
            try_end: 0,
            handlers_start: 0,
            handlers_end: 0,
            finally_start: None,
            region_end: 0,
            stack_depth: 0,
        });

        let try_start = self.emit(Inst::Try(region_idx));
        self.compile_block(vm, try_block)?;
        let mut end_jumps = vec![self.emit(Inst::Jmp(0))];

        let try_end = self.ip();
        let mut handlers_start = try_end;
        let mut next_patch: Option<usize> = None;

        for (i, catch) in catches.iter().enumerate() {
            if i == 0 {
                handlers_start = self.ip();
            }
            if let Some(p) = next_patch.take() {
                let here = self.ip();
                self.patch(p, here);
            }
            self.code().record_line(catch.location.line);
            self.compile_expr(vm, &catch.exc_type)?;
            let catch_site = self.emit(Inst::Catch(0));
            next_patch = Some(catch_site);
            match &catch.binding {
                Some(binding) => self.emit_store(binding, None),
                None => {
                    self.emit(Inst::Pop);
                }
            }
            self.compile_block(vm, &catch.body)?;
            if let Some(binding) = &catch.binding {
                self.emit_delete(vm, binding, None);
            }
            end_jumps.push(self.emit(Inst::Jmp(0)));
        }

        let reraise_ip = self.ip();
        if let Some(p) = next_patch.take() {
            self.patch(p, reraise_ip);
        }
        if catches.is_empty() {
            handlers_start = reraise_ip;
        }
        self.emit(Inst::Reraise);

        let convergence_ip = self.ip();
        for site in end_jumps {
            self.patch(site, convergence_ip);
        }

        let finally_start = match finally_block {
            Some(fb) => {
                let fs = self.ip();
                self.compile_block(vm, fb)?;
                Some(fs)
            }
            None => None,
        };

        let region_end = self.ip();
        self.emit(Inst::EndTry);

        let region = &mut self.code().protected_regions[region_idx];
        region.try_start = try_start;
        region.try_end = try_end;
        region.handlers_start = handlers_start;
        region.handlers_end = reraise_ip;
        region.finally_start = finally_start;
        region.region_end = region_end;
        Ok(())
    }

    // -- expressions --------------------------------------------------

    fn compile_expr(&mut self, vm: &mut Vm, expr: &Expr) -> Result<(), CompErr> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.compile_literal(vm, lit),
            ExprKind::Variable { name, resolved } => self.emit_load(name, *resolved.borrow()),
            ExprKind::Attribute { object, name } => {
                self.compile_expr(vm, object)?;
                let idx = self.code().add_name(name);
                self.emit(Inst::GetAttr(idx));
            }
            ExprKind::Assignment { target, op, value } => {
                self.compile_assignment(vm, target, *op, value)?;
                let nil = vm.nil;
                let idx = self.code().add_const(nil);
                self.emit(Inst::LoadConst(idx));
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.compile_expr(vm, lhs)?;
                self.compile_expr(vm, rhs)?;
                self.emit(Inst::BinaryOp(*op));
            }
            ExprKind::Compare { op, lhs, rhs } => {
                self.compile_expr(vm, lhs)?;
                self.compile_expr(vm, rhs)?;
                self.emit(Inst::Compare(*op));
            }
            ExprKind::Logical { op, lhs, rhs } => {
                self.compile_expr(vm, lhs)?;
                match op {
                    LogicalOperator::And => {
                        let site = self.emit(Inst::JmpIfFalseOrPop(0));
                        self.compile_expr(vm, rhs)?;
                        let end = self.ip();
                        self.patch(site, end);
                    }
                    LogicalOperator::Or => {
                        let site = self.emit(Inst::JmpIfTrueOrPop(0));
                        self.compile_expr(vm, rhs)?;
                        let end = self.ip();
                        self.patch(site, end);
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                self.compile_expr(vm, operand)?;
                match op {
                    UnaryOperator::Not => {
                        self.emit(Inst::Not);
                    }
                    _ => {
                        self.emit(Inst::UnaryOp(*op));
                    }
                }
            }
            ExprKind::Paren(inner) => self.compile_expr(vm, inner)?,
            ExprKind::Call { callable, args, kwargs } => {
                self.compile_expr(vm, callable)?;
                for a in args {
                    self.compile_expr(vm, a)?;
                }
                if kwargs.is_empty() {
                    self.emit(Inst::Call(args.len()));
                } else {
                    for (name, value) in kwargs {
                        let r = vm.alloc_str(name.clone());
                        let idx = self.code().add_const(r);
                        self.emit(Inst::LoadConst(idx));
                        self.compile_expr(vm, value)?;
                    }
                    self.emit(Inst::CallNamed(args.len(), kwargs.len()));
                }
            }
            ExprKind::Interpolated(parts) => {
                for part in parts {
                    match part {
                        ast::InterpolatedPart::Literal(s) => {
                            let r = vm.alloc_str(s.clone());
                            let idx = self.code().add_const(r);
                            self.emit(Inst::LoadConst(idx));
                        }
                        ast::InterpolatedPart::Group(inner) => self.compile_expr(vm, inner)?,
                    }
                }
                self.emit(Inst::BuildString(parts.len()));
            }
            ExprKind::List(items) => {
                for it in items {
                    self.compile_expr(vm, it)?;
                }
                self.emit(Inst::BuildList(items.len()));
            }
            ExprKind::Tuple(items) => {
                for it in items {
                    self.compile_expr(vm, it)?;
                }
                self.emit(Inst::BuildTuple(items.len()));
            }
            ExprKind::FunctionLiteral(decl) => {
                self.compile_closure(vm, decl, expr.location)?;
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, vm: &mut Vm, lit: &ast::Literal) {
        let r = match lit {
            ast::Literal::Int(v) => vm.alloc_int(*v),
            ast::Literal::Float(v) => vm.alloc_float(*v),
            ast::Literal::Bool(v) => vm.alloc_bool(*v),
            ast::Literal::Nil => vm.nil,
            ast::Literal::Str(s) => vm.alloc_str(s.clone()),
        };
        let idx = self.code().add_const(r);
        self.emit(Inst::LoadConst(idx));
    }

    /// Compiles a function into its own `Code`, then -- still in the
    /// *outer* context -- pushes its defaults, collects the cells it
    /// captures, and emits `MAKE_FUNCTION`. Leaves the resulting closure
    /// on the stack; the caller (a `FunctionDecl` statement, or a
    /// `FunctionLiteral` expression used as a value) decides what to do
    /// with it.
    fn compile_closure(
        &mut self,
        vm: &mut Vm,
        decl: &FunctionDecl,
        location: Location,
    ) -> Result<(), CompErr> {
        validate_params(decl, location)?;
        let child = self.compile_function_body(vm, decl)?;

        for p in decl.params.iter().filter(|p| p.default.is_some()) {
            self.compile_expr(vm, p.default.as_ref().unwrap())?;
        }
        for name in &child.freevars {
            let slot = self.code().cell_slot(name).expect("freevar must resolve to an outer cell");
            self.emit(Inst::GetCell(slot));
        }

        let code_ref = vm.alloc_heap(ObjectData::Code(Rc::clone(&child)));
        let idx = self.code().add_const(code_ref);
        self.emit(Inst::MakeFunction(idx));
        Ok(())
    }

    fn compile_function_body(
        &mut self,
        vm: &mut Vm,
        decl: &FunctionDecl,
    ) -> Result<Rc<Code>, CompErr> {
        let mut code = Code::new(decl.name.clone());
        code.arity = decl.params.len();
        code.default_count = decl.params.iter().filter(|p| p.default.is_some()).count();
        code.is_variadic = decl.variadic.is_some();
        code.param_names = decl.params.iter().map(|p| p.name.clone()).collect();
        code.variadic_name = decl.variadic.clone();
        code.self_name = Some(decl.name.clone());
        code.cells = decl.cell_vars.borrow().clone();
        code.freevars = decl.free_vars.borrow().clone();
        code.args_as_cells = code
            .param_names
            .iter()
            .chain(code.variadic_name.iter())
            .filter(|n| code.cells.contains(n))
            .cloned()
            .collect();

        self.stack.push(FuncCtx::new(code));

        {
            let ctx_code = self.code();
            let self_name = ctx_code.self_name.clone().unwrap();
            if !ctx_code.cells.contains(&self_name) {
                ctx_code.add_local(&self_name);
            }
            for name in ctx_code.param_names.clone() {
                if !ctx_code.cells.contains(&name) {
                    ctx_code.add_local(&name);
                }
            }
            if let Some(v) = ctx_code.variadic_name.clone() {
                if !ctx_code.cells.contains(&v) {
                    ctx_code.add_local(&v);
                }
            }
        }

        self.compile_block(vm, &decl.body)?;
        self.emit_return_nil(vm);

        let ctx = self.stack.pop().expect("function frame");
        Ok(Rc::new(ctx.code))
    }
}

/// Parameter-list checks the parser doesn't already make: duplicate
/// names and unknown named arguments are rejected while parsing
/// (`parser::result::ParseErrKind::DuplicateParameter`), but a
/// non-trailing default is only visible once every parameter's been
/// collected.
fn validate_params(decl: &FunctionDecl, location: Location) -> Result<(), CompErr> {
    let mut seen_default = false;
    for p in &decl.params {
        if p.default.is_some() {
            seen_default = true;
        } else if seen_default {
            return Err(CompErr::new(CompErrKind::NonTrailingDefault(p.name.clone()), location));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_source(source: &str) -> Rc<Code> {
        let mut vm = Vm::new("<тест>");
        let module = crate::parser::parse_text(source).expect("parse");
        compile(&mut vm, &module).expect("compile")
    }

    /// §4.3's try/catch/finally layout: `[try_start, try_end)` is the
    /// try body, `[handlers_start, handlers_end)` the catch clauses,
    /// `RERAISE` sits at `handlers_end`, and `finally`/`END_TRY` follow
    /// in order. Every region boundary must be non-decreasing.
    #[test]
    fn try_catch_finally_region_layout() {
        let code = compile_source(
            r#"
спробувати
    1 + 1
зловити Виняток як e
    2 + 2
нарешті
    3 + 3
кінець
"#,
        );
        assert_eq!(code.protected_regions.len(), 1);
        let r = &code.protected_regions[0];

        assert!(r.try_start < r.try_end);
        assert!(r.try_end <= r.handlers_start);
        assert!(r.handlers_start < r.handlers_end);
        let finally_start = r.finally_start.expect("finally block present");
        assert!(r.handlers_end < finally_start);
        assert!(finally_start <= r.region_end);

        assert!(matches!(code.insts[r.try_start], Inst::Try(0)));
        assert!(matches!(code.insts[r.handlers_end], Inst::Reraise));
        assert!(matches!(code.insts[r.region_end], Inst::EndTry));
    }

    /// No catch clauses at all: `handlers_start` collapses onto
    /// `handlers_end` (the `RERAISE` that every fault in the try body
    /// falls straight through to) since there's nothing to try first.
    #[test]
    fn try_finally_without_catches_collapses_handler_range() {
        let code = compile_source(
            r#"
спробувати
    1 + 1
нарешті
    2 + 2
кінець
"#,
        );
        let r = &code.protected_regions[0];
        assert_eq!(r.handlers_start, r.handlers_end);
        assert!(r.finally_start.is_some());
    }

    /// A `try` with catches but no `finally` leaves `finally_start` at
    /// `None`, and the region still ends in exactly one `END_TRY`.
    #[test]
    fn try_catch_without_finally_has_no_finally_start() {
        let code = compile_source(
            r#"
спробувати
    1 + 1
зловити Виняток як e
    2 + 2
кінець
"#,
        );
        let r = &code.protected_regions[0];
        assert!(r.finally_start.is_none());
        assert!(matches!(code.insts[r.region_end], Inst::EndTry));
    }

    /// A default parameter after a non-default one is rejected once the
    /// whole parameter list is visible, even though the parser alone
    /// can't see the violation while it's still reading tokens left to
    /// right.
    #[test]
    fn non_trailing_default_is_rejected() {
        let mut vm = Vm::new("<тест>");
        let module = crate::parser::parse_text("функція f(x=1, y)\n    повернути x\nкінець\n").expect("parse");
        let err = compile(&mut vm, &module).expect_err("non-trailing default must fail to compile");
        assert!(matches!(err.kind, CompErrKind::NonTrailingDefault(ref name) if name == "y"));
    }
}
