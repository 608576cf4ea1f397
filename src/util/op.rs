use std::fmt;

/// Unary operators, per the `operators` table's unary slots (§4.5/§4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,  // +x
    Minus, // -x
    Not,   // не x
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Not => "не",
        };
        write!(f, "{s}")
    }
}

/// Binary arithmetic operators dispatched through the operand's type
/// descriptor (§3 "operators table").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    FloorDiv, // \
    Modulo,   // %
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::FloorDiv => "\\",
            Self::Modulo => "%",
        };
        write!(f, "{s}")
    }
}

/// Three-way comparison / identity operators (§4.2 `COMPARE`, `IS`/`IS_NOT`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,    // ==
    NotEq, // !=
    Gt,    // більше
    Ge,    // більше=
    Lt,    // менше
    Le,    // менше=
    Is,    // є
    IsNot, // є не
}

impl fmt::Display for CompareOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Gt => "більше",
            Self::Ge => "більше=",
            Self::Lt => "менше",
            Self::Le => "менше=",
            Self::Is => "є",
            Self::IsNot => "є не",
        };
        write!(f, "{s}")
    }
}

/// Logical (short-circuit) operators, handled at the compiler level via
/// `JMP_IF_*_OR_POP` rather than a dispatched operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOperator {
    And, // та
    Or,  // або
}

/// In-place/compound assignment operators (`+=`, `-=`, ...), lowered by
/// the compiler into `LOAD_*; BINARY_OP; STORE_*` (§4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InplaceOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDiv,
    Modulo,
}

impl InplaceOperator {
    pub fn as_binary(&self) -> BinaryOperator {
        match self {
            Self::Add => BinaryOperator::Add,
            Self::Subtract => BinaryOperator::Subtract,
            Self::Multiply => BinaryOperator::Multiply,
            Self::Divide => BinaryOperator::Divide,
            Self::FloorDiv => BinaryOperator::FloorDiv,
            Self::Modulo => BinaryOperator::Modulo,
        }
    }
}

impl fmt::Display for InplaceOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.as_binary())
    }
}
