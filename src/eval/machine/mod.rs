//! The vau machine

use self::{
    env::EnvBuilder,
    port::{PortTable, STDERR, STDIN, STDOUT},
    vm::{Globals, Machine, MachineSettings},
};

use super::{
    builtins,
    error::ExecutionError,
    intrinsics::{self, Kind},
    memory::{
        mutator::{Constants, Mutator, MutatorHeapView, ObjectBuilder},
        object::Obj,
        symbol::{find_or_intern, make_package, STANDARD_BUCKETS},
    },
};

pub mod env;
pub mod intrinsic;
pub mod metrics;
pub mod port;
pub mod vm;

/// Create the ground environment binding every intrinsic by name
///
/// Operative intrinsics are bound to the primitive itself;
/// applicative intrinsics to an applicative wrapping it.
pub fn establish_root_environment(
    view: &MutatorHeapView,
    constants: &Constants,
    package: Obj,
) -> Result<Obj, ExecutionError> {
    let root = view.extend(constants.nil, constants.nil)?;
    for (index, intrinsic) in intrinsics::catalogue().iter().enumerate() {
        let primitive = view.make_primitive(index)?;
        let value = match intrinsic.kind() {
            Kind::Operative => primitive,
            Kind::Applicative => view.make_applicative(primitive)?,
        };
        let symbol = find_or_intern(view, package, intrinsic.name())?;
        view.define(root, symbol, value)?;
    }
    Ok(root)
}

/// Allocates the globals of a fresh machine
pub struct Initialiser;

impl Mutator for Initialiser {
    type Input = ();
    type Output = Globals;

    fn run(&self, view: &MutatorHeapView, _input: ()) -> Result<Globals, ExecutionError> {
        let constants = Constants::allocate(view)?;
        let package = make_package(view, "user", STANDARD_BUCKETS, constants.nil)?;
        let root = establish_root_environment(view, &constants, package)?;

        for (name, index) in [("stdin", STDIN), ("stdout", STDOUT), ("stderr", STDERR)] {
            let port = view.make_port(index)?;
            let symbol = find_or_intern(view, package, name)?;
            view.define(root, symbol, port)?;
        }

        Ok(Globals {
            constants,
            package,
            root,
        })
    }
}

/// Create a standard machine with all builtins and the standard
/// ports bound in its root environment
pub fn standard_machine(
    settings: MachineSettings,
    ports: PortTable,
) -> Result<Machine, ExecutionError> {
    Machine::new(settings, builtins::standard_builtins(), ports, Initialiser)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::eval::memory::{heap::Heap, object::Tag};

    #[test]
    pub fn test_root_environment_binds_catalogue() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let globals = Initialiser.run(&view, ()).unwrap();

        let vau = find_or_intern(&view, globals.package, "vau").unwrap();
        let value = view.lookup(globals.root, vau).unwrap();
        assert_eq!(value.tag(), Tag::Primitive);

        let car = find_or_intern(&view, globals.package, "car").unwrap();
        let value = view.lookup(globals.root, car).unwrap();
        let underlying = value.applicative(&view).unwrap().underlying();
        assert_eq!(
            underlying.primitive(&view).unwrap().index(),
            intrinsics::index("car").unwrap()
        );

        let stdout = find_or_intern(&view, globals.package, "stdout").unwrap();
        let port = view.lookup(globals.root, stdout).unwrap();
        assert_eq!(port.port(&view).unwrap().index(), STDOUT);
    }
}
