//! Disassembler (§6): a direct textual dump of a `Code` object, used by
//! the `-а`/`--асемблер` CLI flag. Reads constants straight out of the
//! heap rather than going through the object protocol's `to_string` --
//! disassembly only ever needs to render literal values, never call
//! into user-overridable dispatch.
use std::fmt::Write as _;
use std::rc::Rc;

use crate::types::{ObjRef, ObjectData};
use crate::util::{BinaryOperator, CompareOperator, UnaryOperator};
use crate::vm::{Code, Inst, Vm};

pub(crate) fn disassemble(vm: &Vm, code: &Code) -> String {
    let mut out = String::new();
    let mut nested = Vec::new();
    disassemble_into(vm, code, &mut out, &mut nested);

    for child in nested {
        out.push('\n');
        let _ = writeln!(out, "Disassemble {}:", child.name);
        out.push_str(&disassemble(vm, &child));
    }
    out
}

fn disassemble_into(vm: &Vm, code: &Code, out: &mut String, nested: &mut Vec<Rc<Code>>) {
    let mut lineno = 0usize;
    for (ip, inst) in code.insts.iter().enumerate() {
        let line = code.line_for(ip);
        if ip == 0 || line != lineno {
            lineno = line;
            let _ = writeln!(out, "{lineno}");
        }
        let _ = write!(out, "{ip:>4} ");
        let _ = write!(out, "{:<20}", mnemonic(inst));
        write_operand(vm, code, inst, out, nested);
        out.push('\n');
    }
}

fn mnemonic(inst: &Inst) -> &'static str {
    match inst {
        Inst::Pop => "POP",
        Inst::Dup => "DUP",
        Inst::LoadConst(_) => "LOAD_CONST",
        Inst::LoadGlobal(_) => "LOAD_GLOBAL",
        Inst::StoreGlobal(_) => "STORE_GLOBAL",
        Inst::DeleteGlobal(_) => "DELETE_GLOBAL",
        Inst::LoadLocal(_) => "LOAD_LOCAL",
        Inst::StoreLocal(_) => "STORE_LOCAL",
        Inst::DeleteLocal(_) => "DELETE_LOCAL",
        Inst::LoadCell(_) => "LOAD_CELL",
        Inst::StoreCell(_) => "STORE_CELL",
        Inst::GetCell(_) => "GET_CELL",
        Inst::GetAttr(_) => "GET_ATTR",
        Inst::UnaryOp(_) => "UNARY_OP",
        Inst::BinaryOp(_) => "BINARY_OP",
        Inst::Compare(_) => "COMPARE",
        Inst::Not => "NOT",
        Inst::BuildList(_) => "BUILD_LIST",
        Inst::BuildTuple(_) => "BUILD_TUPLE",
        Inst::BuildString(_) => "BUILD_STRING",
        Inst::Jmp(_) => "JMP",
        Inst::JmpIfTrue(_) => "JMP_IF_TRUE",
        Inst::JmpIfFalse(_) => "JMP_IF_FALSE",
        Inst::JmpIfTrueOrPop(_) => "JMP_IF_TRUE_OR_POP",
        Inst::JmpIfFalseOrPop(_) => "JMP_IF_FALSE_OR_POP",
        Inst::ForIter(_) => "FOR_ITER",
        Inst::GetIter => "GET_ITER",
        Inst::Call(_) => "CALL",
        Inst::CallNamed(_, _) => "CALL_NAMED",
        Inst::MakeFunction(_) => "MAKE_FUNCTION",
        Inst::Return => "RETURN",
        Inst::Try(_) => "TRY",
        Inst::EndTry => "END_TRY",
        Inst::Catch(_) => "CATCH",
        Inst::Raise => "RAISE",
        Inst::Reraise => "RERAISE",
    }
}

fn write_operand(vm: &Vm, code: &Code, inst: &Inst, out: &mut String, nested: &mut Vec<Rc<Code>>) {
    match inst {
        Inst::LoadConst(i) => {
            let r = code.constants[*i];
            let _ = write!(out, "{i} ({})", value_as_string(vm, r));
            if let ObjectData::Code(c) = vm.heap.get(r) {
                nested.push(Rc::clone(c));
            }
        }
        Inst::LoadGlobal(i) | Inst::StoreGlobal(i) | Inst::DeleteGlobal(i) | Inst::GetAttr(i) => {
            let _ = write!(out, "{i} ({})", code.names[*i]);
        }
        Inst::LoadLocal(i) | Inst::StoreLocal(i) | Inst::DeleteLocal(i) => {
            let _ = write!(out, "{i} ({})", code.locals[*i]);
        }
        Inst::LoadCell(i) | Inst::StoreCell(i) | Inst::GetCell(i) => {
            let name = if *i < code.cells.len() {
                &code.cells[*i]
            } else {
                &code.freevars[*i - code.cells.len()]
            };
            let _ = write!(out, "{i} ({name})");
        }
        Inst::Compare(op) => {
            let _ = write!(out, "{} ({})", compare_index(*op), compare_keyword(*op));
        }
        Inst::UnaryOp(op) => {
            let _ = write!(out, "{} ({})", unary_index(*op), op);
        }
        Inst::BinaryOp(op) => {
            let _ = write!(out, "{} ({})", binary_index(*op), op);
        }
        Inst::Dup
        | Inst::Pop
        | Inst::Not
        | Inst::GetIter
        | Inst::Return
        | Inst::EndTry
        | Inst::Raise
        | Inst::Reraise => {}
        Inst::BuildList(n) | Inst::BuildTuple(n) | Inst::BuildString(n) | Inst::Call(n) => {
            let _ = write!(out, "{n}");
        }
        Inst::Jmp(t)
        | Inst::JmpIfTrue(t)
        | Inst::JmpIfFalse(t)
        | Inst::JmpIfTrueOrPop(t)
        | Inst::JmpIfFalseOrPop(t)
        | Inst::ForIter(t)
        | Inst::Try(t)
        | Inst::Catch(t)
        | Inst::MakeFunction(t) => {
            let _ = write!(out, "{t}");
        }
        Inst::CallNamed(positional, named) => {
            let _ = write!(out, "{positional}, {named}");
        }
    }
}

fn value_as_string(vm: &Vm, r: ObjRef) -> String {
    match vm.heap.get(r) {
        ObjectData::Int(v) => v.to_string(),
        ObjectData::Float(v) => v.to_string(),
        ObjectData::Bool(true) => "істина".to_string(),
        ObjectData::Bool(false) => "хиба".to_string(),
        ObjectData::Nil => "нич".to_string(),
        ObjectData::Str(chars) => {
            let s: String = chars.iter().collect();
            format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
        }
        ObjectData::Code(c) => format!("<Код {}>", c.name),
        other => format!("<{}>", other.kind_name()),
    }
}

fn compare_index(op: CompareOperator) -> usize {
    op as usize
}

fn unary_index(op: UnaryOperator) -> usize {
    op as usize
}

fn binary_index(op: BinaryOperator) -> usize {
    op as usize
}

fn compare_keyword(op: CompareOperator) -> &'static str {
    match op {
        CompareOperator::Eq => "==",
        CompareOperator::NotEq => "!=",
        CompareOperator::Gt => "більше",
        CompareOperator::Ge => "більше=",
        CompareOperator::Lt => "менше",
        CompareOperator::Le => "менше=",
        CompareOperator::Is => "є",
        CompareOperator::IsNot => "є не",
    }
}
