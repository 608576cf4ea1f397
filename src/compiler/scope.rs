//! Resolves every variable reference to a storage class -- global,
//! local, or cell -- and figures out which locals need to be promoted
//! to cells because an inner function closes over them.
//!
//! This is a direct port of the reference scope analyzer: same
//! `maybe_promote`/`resolve`/`promote` algorithm, same GLOBAL/LOCAL/CELL
//! classification. The owning-raw-pointer scope tree becomes an arena
//! (`Vec<ScopeNode>` addressed by index), the same shape the scope tree
//! elsewhere in this crate already uses for nested scopes.
use std::collections::{HashMap, HashSet};

use crate::ast::{self, Expr, ExprKind, FunctionDecl, Module, Stmt, StmtKind, VarKind};

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Global,
    Function,
}

struct ScopeNode {
    kind: ScopeKind,
    parent: Option<usize>,
    variables: HashMap<String, VarKind>,
    cells: Vec<String>,
    free_vars: Vec<String>,
}

impl ScopeNode {
    fn new(kind: ScopeKind, parent: Option<usize>) -> Self {
        Self { kind, parent, variables: HashMap::new(), cells: Vec::new(), free_vars: Vec::new() }
    }
}

/// Walks the whole module, writing resolution results back into the
/// AST's `RefCell` annotations (`Expr::Variable::resolved` and
/// `FunctionDecl::{cell_vars,free_vars}`).
pub(crate) fn analyze(module: &Module, builtins: &HashSet<&str>) {
    let arena = vec![ScopeNode::new(ScopeKind::Global, None)];
    let mut analyzer = Analyzer { arena, builtins };
    analyzer.analyze_block(&module.body, 0);
}

struct Analyzer<'a> {
    arena: Vec<ScopeNode>,
    builtins: &'a HashSet<&'a str>,
}

impl<'a> Analyzer<'a> {
    fn add_local(&mut self, scope: usize, name: &str) {
        let kind = if self.arena[scope].kind == ScopeKind::Global {
            VarKind::Global
        } else {
            VarKind::Local
        };
        self.arena[scope].variables.insert(name.to_string(), kind);
    }

    fn add_cell(&mut self, scope: usize, name: &str) {
        self.arena[scope].cells.push(name.to_string());
        self.arena[scope].variables.insert(name.to_string(), VarKind::Cell);
    }

    fn add_free(&mut self, scope: usize, name: &str) {
        self.arena[scope].free_vars.push(name.to_string());
        self.arena[scope].variables.insert(name.to_string(), VarKind::Cell);
    }

    /// Marks `name` as a cell in `owner` and as a free variable in every
    /// scope between the current one and `owner` (exclusive).
    fn promote(&mut self, scope: usize, name: &str, owner: usize) {
        self.add_cell(owner, name);
        let mut current = scope;
        while current != owner {
            self.add_free(current, name);
            current = self.arena[current].parent.expect("promote chain reached scope root");
        }
    }

    fn maybe_promote(&mut self, scope: usize, name: &str) -> VarKind {
        let mut var_type = if self.arena[scope].kind == ScopeKind::Global {
            VarKind::Global
        } else {
            VarKind::Local
        };

        if let Some(existing) = self.arena[scope].variables.get(name) {
            var_type = *existing;
        }

        if var_type == VarKind::Cell {
            return VarKind::Cell;
        }

        let (owner, resolved) = self.resolve(scope, name, var_type);
        self.arena[scope].variables.insert(name.to_string(), resolved);

        if resolved == VarKind::Cell {
            let owner = owner.expect("cell resolution must name an owning scope");
            self.promote(scope, name, owner);
        }

        resolved
    }

    /// Returns the scope that owns `name` and the storage class it
    /// should be resolved to at `scope`. `None` as the owning scope
    /// means "global" (either a true module global or a builtin).
    fn resolve(
        &mut self,
        scope: usize,
        name: &str,
        variable_type: VarKind,
    ) -> (Option<usize>, VarKind) {
        if self.builtins.contains(name) || self.arena[scope].kind == ScopeKind::Global {
            return (None, VarKind::Global);
        }

        if self.arena[scope].variables.contains_key(name) {
            return (Some(scope), variable_type);
        }

        let variable_type = if self.arena[scope].kind == ScopeKind::Function {
            VarKind::Cell
        } else {
            variable_type
        };

        let parent = self.arena[scope].parent.expect("non-global scope must have a parent");

        if self.arena[parent].kind == ScopeKind::Global {
            return (Some(parent), VarKind::Global);
        }

        self.resolve(parent, name, variable_type)
    }

    fn analyze_block(&mut self, block: &[Stmt], scope: usize) {
        for stmt in block {
            self.analyze_stmt(stmt, scope);
        }
    }

    fn analyze_stmt(&mut self, stmt: &Stmt, scope: usize) {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.analyze_expr(expr, scope),
            StmtKind::While { condition, body } => {
                self.analyze_expr(condition, scope);
                self.analyze_block(body, scope);
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::If { condition, then_block, else_block } => {
                self.analyze_expr(condition, scope);
                self.analyze_block(then_block, scope);
                if let Some(else_block) = else_block {
                    self.analyze_block(else_block, scope);
                }
            }
            StmtKind::FunctionDecl(decl) => self.analyze_function_decl(decl, scope),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.analyze_expr(value, scope);
                }
            }
            StmtKind::ForEach { var_name, iterable, body } => {
                self.analyze_expr(iterable, scope);
                self.add_local(scope, var_name);
                self.analyze_block(body, scope);
            }
            StmtKind::TryCatch { try_block, catches, finally_block } => {
                self.analyze_block(try_block, scope);
                for catch in catches {
                    self.analyze_expr(&catch.exc_type, scope);
                    if let Some(binding) = &catch.binding {
                        self.add_local(scope, binding);
                    }
                    self.analyze_block(&catch.body, scope);
                }
                if let Some(finally_block) = finally_block {
                    self.analyze_block(finally_block, scope);
                }
            }
            StmtKind::Raise(expr) => self.analyze_expr(expr, scope),
        }
    }

    fn analyze_function_decl(&mut self, decl: &FunctionDecl, scope: usize) {
        self.add_local(scope, &decl.name);

        let fn_scope = self.arena.len();
        self.arena.push(ScopeNode::new(ScopeKind::Function, Some(scope)));
        self.add_local(fn_scope, &decl.name);

        for param in &decl.params {
            self.add_local(fn_scope, &param.name);
            if let Some(default) = &param.default {
                self.analyze_expr(default, scope);
            }
        }
        if let Some(variadic) = &decl.variadic {
            self.add_local(fn_scope, variadic);
        }

        self.analyze_block(&decl.body, fn_scope);

        let node = &self.arena[fn_scope];
        *decl.cell_vars.borrow_mut() = node.cells.clone();
        *decl.free_vars.borrow_mut() = node.free_vars.clone();
    }

    fn analyze_expr(&mut self, expr: &Expr, scope: usize) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Variable { name, resolved } => {
                let kind = self.maybe_promote(scope, name);
                *resolved.borrow_mut() = Some(kind);
            }
            ExprKind::Attribute { object, .. } => self.analyze_expr(object, scope),
            ExprKind::Assignment { target, value, .. } => {
                if let ExprKind::Variable { name, .. } = &target.kind {
                    self.maybe_promote(scope, name);
                }
                self.analyze_expr(target, scope);
                self.analyze_expr(value, scope);
            }
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Compare { lhs, rhs, .. } => {
                self.analyze_expr(rhs, scope);
                self.analyze_expr(lhs, scope);
            }
            ExprKind::Logical { lhs, rhs, .. } => {
                self.analyze_expr(rhs, scope);
                self.analyze_expr(lhs, scope);
            }
            ExprKind::Unary { operand, .. } => self.analyze_expr(operand, scope),
            ExprKind::Paren(inner) => self.analyze_expr(inner, scope),
            ExprKind::Call { callable, args, kwargs } => {
                self.analyze_expr(callable, scope);
                for arg in args {
                    self.analyze_expr(arg, scope);
                }
                for (_, value) in kwargs {
                    self.analyze_expr(value, scope);
                }
            }
            ExprKind::Interpolated(parts) => {
                for part in parts {
                    if let ast::InterpolatedPart::Group(inner) = part {
                        self.analyze_expr(inner, scope);
                    }
                }
            }
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                for item in items {
                    self.analyze_expr(item, scope);
                }
            }
            ExprKind::FunctionLiteral(decl) => self.analyze_function_decl(decl, scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;

    #[test]
    fn variable_in_global_scope_resolves_global() {
        let module = parse_text("a = 1\nдрук(a)").unwrap();
        let mut builtins = HashSet::new();
        builtins.insert("друк");
        analyze(&module, &builtins);
        let StmtKind::Expr(Expr { kind: ExprKind::Call { args, .. }, .. }) = &module.body[1].kind
        else {
            panic!("expected call statement");
        };
        let ExprKind::Variable { resolved, .. } = &args[0].kind else {
            panic!("expected variable arg");
        };
        assert_eq!(*resolved.borrow(), Some(VarKind::Global));
    }

    #[test]
    fn closed_over_local_is_promoted_to_cell() {
        let module = parse_text(
            "функція зовнішня(x)\nфункція внутрішня()\nповернути x\nкінець\nповернути внутрішня\nкінець",
        )
        .unwrap();
        analyze_source_module(&module);
        let StmtKind::FunctionDecl(outer) = &module.body[0].kind else {
            panic!("expected function decl");
        };
        assert_eq!(outer.cell_vars.borrow().as_slice(), ["x"]);
        let StmtKind::FunctionDecl(inner) = &outer.body[0].kind else {
            panic!("expected nested function decl");
        };
        assert_eq!(inner.free_vars.borrow().as_slice(), ["x"]);
    }

    fn analyze_source_module(module: &Module) {
        let builtins: HashSet<&str> = HashSet::new();
        analyze(module, &builtins);
    }

    #[test]
    fn plain_local_stays_local() {
        let module = parse_text("функція f()\nx = 1\nповернути x\nкінець").unwrap();
        analyze_source_module(&module);
        let StmtKind::FunctionDecl(decl) = &module.body[0].kind else {
            panic!("expected function decl");
        };
        assert!(decl.cell_vars.borrow().is_empty());
    }
}
