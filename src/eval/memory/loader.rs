//! Load data produced by the reader into heap objects

use crate::eval::error::ExecutionError;
use crate::syntax::reader::Datum;

use super::{
    mutator::{Constants, MutatorHeapView, ObjectBuilder},
    object::Obj,
    symbol::find_or_intern,
};

/// Load a datum into the heap, interning symbols through `package`
pub fn load(
    view: &MutatorHeapView,
    constants: &Constants,
    package: Obj,
    datum: &Datum,
) -> Result<Obj, ExecutionError> {
    match datum {
        Datum::Integer(_, n) => view.make_fixnum(*n),
        Datum::String(_, s) => view.make_string(s),
        Datum::Symbol(_, name) => find_or_intern(view, package, name),
        Datum::Boolean(_, b) => Ok(constants.boolean(*b)),
        Datum::Inert(_) => Ok(constants.inert),
        Datum::Ignore(_) => Ok(constants.ignore),
        Datum::List(_, items, tail) => {
            let tail = match tail {
                Some(tail) => load(view, constants, package, tail)?,
                None => constants.nil,
            };
            let items = items
                .iter()
                .map(|item| load(view, constants, package, item))
                .collect::<Result<Vec<_>, _>>()?;
            view.list(&items, tail)
        }
    }
}
