pub(crate) use op::{
    BinaryOperator, CompareOperator, InplaceOperator, LogicalOperator, UnaryOperator,
};
pub(crate) use source::{Location, Source};

mod op;
mod source;
