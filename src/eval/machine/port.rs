//! Port table
//!
//! Port objects in the heap carry only an index into the machine's
//! table of open streams.

use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};

use crate::{
    eval::error::ExecutionError,
    syntax::{reader::Reader, source::Source},
};

pub const STDIN: usize = 0;
pub const STDOUT: usize = 1;
pub const STDERR: usize = 2;

/// An open stream
enum Stream {
    Input(Box<Reader>),
    Output(Box<dyn Write>),
}

pub struct PortTable {
    streams: Vec<Stream>,
}

impl PortTable {
    /// Standard input, output and error at their conventional indexes
    pub fn standard() -> Self {
        Self::with_streams(
            Reader::new(Source::stdin()),
            Box::new(io::stdout()),
            Box::new(io::stderr()),
        )
    }

    /// Table with the three standard ports bound to the given streams
    pub fn with_streams(input: Reader, output: Box<dyn Write>, error: Box<dyn Write>) -> Self {
        PortTable {
            streams: vec![
                Stream::Input(Box::new(input)),
                Stream::Output(output),
                Stream::Output(error),
            ],
        }
    }

    pub fn reader(&mut self, index: usize) -> Result<&mut Reader, ExecutionError> {
        match self.streams.get_mut(index) {
            Some(Stream::Input(reader)) => Ok(reader.as_mut()),
            _ => Err(ExecutionError::PortUnavailable(index, "input")),
        }
    }

    pub fn writer(&mut self, index: usize) -> Result<&mut dyn Write, ExecutionError> {
        match self.streams.get_mut(index) {
            Some(Stream::Output(writer)) => {
                let writer: &mut dyn Write = writer.as_mut();
                Ok(writer)
            }
            _ => Err(ExecutionError::PortUnavailable(index, "output")),
        }
    }

    /// Flush every output stream
    pub fn flush(&mut self) -> io::Result<()> {
        for stream in self.streams.iter_mut() {
            if let Stream::Output(writer) = stream {
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// An output stream whose contents can be inspected, for capturing
/// output
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_standard_indexes() {
        let out = SharedBuffer::default();
        let mut ports = PortTable::with_streams(
            Reader::from_text("in", "1"),
            Box::new(out.clone()),
            Box::new(io::sink()),
        );
        assert!(ports.reader(STDIN).is_ok());
        assert!(matches!(
            ports.reader(STDOUT),
            Err(ExecutionError::PortUnavailable(STDOUT, "input"))
        ));
        write!(ports.writer(STDOUT).unwrap(), "hello").unwrap();
        assert_eq!(out.contents(), "hello");
        assert!(ports.writer(STDIN).is_err());
        assert!(ports.writer(7).is_err());
    }

    #[test]
    pub fn test_flush_skips_input() {
        let out = SharedBuffer::default();
        let mut ports = PortTable::with_streams(
            Reader::from_text("in", ""),
            Box::new(out.clone()),
            Box::new(io::sink()),
        );
        write!(ports.writer(STDERR).unwrap(), "ignored").unwrap();
        assert!(ports.flush().is_ok());
        assert_eq!(out.contents(), "");
    }
}
