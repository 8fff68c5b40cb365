//! Intrinsics for reading and writing through ports

use std::io::Write;

use codespan::{ByteIndex, Span};

use crate::{
    eval::{
        error::ExecutionError,
        machine::{
            intrinsic::{Builtin, Step},
            vm::Evaluator,
        },
        memory::object::Obj,
    },
    syntax::{error::SyntaxError, printer},
};

use super::support::{machine_return_inert, port_arg};

/// (write obj port)
pub struct WriteObj;

impl Builtin for WriteObj {
    fn name(&self) -> &str {
        "write"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let port = port_arg(machine, self.name(), args[1])?;
        let view = machine.view();
        let width = machine.settings().render_width;
        let out = machine.ports().writer(port)?;
        printer::write(&view, args[0], width, out)?;
        machine_return_inert(machine)
    }
}

/// (newline port)
pub struct Newline;

impl Builtin for Newline {
    fn name(&self) -> &str {
        "newline"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let port = port_arg(machine, self.name(), args[0])?;
        let out = machine.ports().writer(port)?;
        writeln!(out)?;
        out.flush()?;
        machine_return_inert(machine)
    }
}

/// (read port) - the next datum from the port
///
/// The end of input is an unexpected end of stream, which is fatal.
pub struct Read;

impl Builtin for Read {
    fn name(&self) -> &str {
        "read"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let port = port_arg(machine, self.name(), args[0])?;
        let reader = machine.ports().reader(port)?;
        match reader.read()? {
            Some(datum) => Ok(Step::Value(machine.load(&datum)?)),
            None => {
                let end = ByteIndex(reader.source().text().len() as u32);
                Err(SyntaxError::UnexpectedEndOfStream(Span::new(end, end)).into())
            }
        }
    }
}
