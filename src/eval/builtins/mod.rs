//! Implementations of the primitive combiners
pub mod arith;
pub mod combiners;
pub mod io;
pub mod lists;
pub mod support;
pub mod vectors;

use super::machine::intrinsic::Builtin;

/// Every builtin, in catalogue order
pub fn standard_builtins() -> Vec<Box<dyn Builtin>> {
    vec![
        Box::new(combiners::Vau),
        Box::new(combiners::Define),
        Box::new(combiners::If),
        Box::new(combiners::Sequence),
        Box::new(combiners::Wrap),
        Box::new(combiners::Unwrap),
        Box::new(combiners::Eval),
        Box::new(combiners::MakeEnvironment),
        Box::new(lists::Cons),
        Box::new(lists::Car),
        Box::new(lists::Cdr),
        Box::new(lists::List),
        Box::new(lists::EqP),
        Box::new(lists::NullP),
        Box::new(lists::PairP),
        Box::new(lists::SymbolP),
        Box::new(lists::OperativeP),
        Box::new(lists::ApplicativeP),
        Box::new(vectors::MakeVector),
        Box::new(vectors::VectorLength),
        Box::new(vectors::VectorRef),
        Box::new(vectors::VectorSet),
        Box::new(arith::Add),
        Box::new(arith::Sub),
        Box::new(arith::Mul),
        Box::new(arith::Lt),
        Box::new(arith::NumEq),
        Box::new(io::WriteObj),
        Box::new(io::Newline),
        Box::new(io::Read),
    ]
}
