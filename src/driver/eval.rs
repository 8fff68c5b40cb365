//! Read, evaluate and print
//!
//! Forms are read one at a time from each input in turn and evaluated
//! in the root environment. Recoverable errors are reported as
//! diagnostics and the session continues with the next form; fatal
//! errors end the session.
use std::{fs, io::Write, path::Path, time::Instant};

use codespan::Span;
use codespan_reporting::{
    diagnostic::Diagnostic,
    files::SimpleFiles,
    term::{
        self,
        termcolor::{ColorChoice, NoColor, StandardStream},
    },
};
use log::{debug, warn};

use crate::{
    driver::{
        error::BurkeError, options::BurkeOptions, prelude::load_prelude,
        statistics::Statistics,
    },
    eval::{
        error::ExecutionError,
        machine::{
            port::{PortTable, STDIN, STDOUT},
            standard_machine,
            vm::Machine,
        },
    },
    syntax::reader::{Datum, Reader},
};

/// Run a session on the standard streams as directed by `opt`
pub fn run(opt: &BurkeOptions, stats: &mut Statistics) -> Result<(), BurkeError> {
    let machine = standard_machine(opt.machine_settings(), PortTable::standard())?;
    let mut executor = Executor::new(machine);
    executor.execute(opt, stats)
}

/// Where forms are read from
pub enum Input {
    /// An input port of the machine
    Port(usize),
    /// Text private to the driver
    Text(Box<Reader>),
}

pub struct Executor<'a> {
    machine: Machine,

    /// Overridden error stream
    err: Option<Box<dyn Write + 'a>>,
}

impl<'a> Executor<'a> {
    pub fn new(machine: Machine) -> Self {
        Executor { machine, err: None }
    }

    /// Provide an override stream to capture diagnostics
    pub fn capture_errors(&mut self, err: Box<dyn Write + 'a>) {
        self.err = Some(err);
    }

    pub fn machine(&mut self) -> &mut Machine {
        &mut self.machine
    }

    /// Load the prelude, the files, any expression and then stdin as
    /// directed, recording statistics whatever the outcome
    pub fn execute(&mut self, opt: &BurkeOptions, stats: &mut Statistics) -> Result<(), BurkeError> {
        let result = self.try_execute(opt, stats);

        stats.set_ticks(self.machine.metrics().ticks());
        stats.set_allocs(self.machine.metrics().allocs());
        stats.set_max_depth(self.machine.metrics().max_depth());
        stats.set_collections(self.machine.collections().len());
        stats.set_blocks_allocated(self.machine.heap_stats().blocks_allocated);
        debug!("final heap state: {:?}", self.machine.heap_stats());

        result
    }

    fn try_execute(&mut self, opt: &BurkeOptions, stats: &mut Statistics) -> Result<(), BurkeError> {
        if !opt.no_prelude {
            let t = Instant::now();
            if let Err(e) = load_prelude(&mut self.machine) {
                let e = BurkeError::from(e);
                self.diagnose_message(&e);
                return Err(e);
            }
            stats.timings_mut().record("prelude", t.elapsed());
        }

        for path in &opt.files {
            let t = Instant::now();
            self.load_file(path)?;
            stats.timings_mut().record("files", t.elapsed());
        }

        if let Some(expr) = &opt.evaluate {
            let t = Instant::now();
            let mut input = Input::Text(Box::new(Reader::from_text("<eval>", expr)));
            self.run(&mut input, true)?;
            stats.timings_mut().record("eval", t.elapsed());
        }

        if opt.repl() {
            let t = Instant::now();
            self.run(&mut Input::Port(STDIN), true)?;
            stats.timings_mut().record("repl", t.elapsed());
        }

        self.machine.ports().flush()?;
        Ok(())
    }

    /// Evaluate every form in the file at `path` silently
    pub fn load_file(&mut self, path: &Path) -> Result<(), BurkeError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                debug!("reading {}: {}", path.display(), e);
                let e = BurkeError::FileCouldNotBeRead(path.display().to_string());
                self.diagnose_message(&e);
                return Err(e);
            }
        };
        let name = path.to_string_lossy();
        let mut input = Input::Text(Box::new(Reader::from_text(&name, &text)));
        self.run(&mut input, false)
    }

    /// Read and evaluate forms until `input` is exhausted, writing
    /// each result to stdout if `echo` is set
    ///
    /// Returns an error only if the session cannot continue.
    pub fn run(&mut self, input: &mut Input, echo: bool) -> Result<(), BurkeError> {
        loop {
            let datum = match self.read(input) {
                Ok(Some(datum)) => datum,
                Ok(None) => return Ok(()),
                Err(e) => {
                    self.diagnose(input, &e, None);
                    match e {
                        BurkeError::Syntax(ref s) if !s.is_fatal() => continue,
                        _ => return Err(e),
                    }
                }
            };

            if let Err(e) = self.evaluate(&datum, echo) {
                let e = BurkeError::from(e);
                self.diagnose(input, &e, Some(datum.span()));
                if e.is_fatal() {
                    return Err(e);
                }
            }

            if let Some(report) = self.machine.safepoint() {
                debug!("collected at safepoint: {:?}", report);
            }
        }
    }

    fn read(&mut self, input: &mut Input) -> Result<Option<Datum>, BurkeError> {
        match input {
            Input::Port(index) => Ok(self.machine.ports().reader(*index)?.read()?),
            Input::Text(reader) => Ok(reader.read()?),
        }
    }

    fn evaluate(&mut self, datum: &Datum, echo: bool) -> Result<(), ExecutionError> {
        let value = self.machine.evaluate_datum(datum)?;
        if echo {
            self.machine.write(value, STDOUT)?;
            self.machine.newline(STDOUT)?;
        }
        Ok(())
    }

    /// Report an error against the text consumed from `input` so far
    fn diagnose(&mut self, input: &mut Input, error: &BurkeError, span: Option<Span>) {
        let source = match input {
            Input::Port(index) => self.machine.ports().reader(*index).ok().map(|r| r.source()),
            Input::Text(reader) => Some(reader.source()),
        };

        let mut files = SimpleFiles::new();
        let diagnostic = match source {
            Some(source) => {
                let id = files.add(source.name().to_string(), source.text().to_string());
                error.to_diagnostic(id, span)
            }
            None => Diagnostic::error().with_message(error.to_string()),
        };
        self.emit(&files, &diagnostic);
    }

    /// Report an error that has no source location
    fn diagnose_message(&mut self, error: &BurkeError) {
        let files = SimpleFiles::new();
        self.emit(&files, &Diagnostic::error().with_message(error.to_string()));
    }

    /// Print a diagnostic to stderr
    fn emit(&mut self, files: &SimpleFiles<String, String>, diagnostic: &Diagnostic<usize>) {
        let config = term::Config::default();
        let result = match self.err {
            None => term::emit(
                &mut StandardStream::stderr(ColorChoice::Auto),
                &config,
                files,
                diagnostic,
            ),
            Some(ref mut err) => {
                term::emit(&mut NoColor::new(err.as_mut()), &config, files, diagnostic)
            }
        };
        if let Err(e) = result {
            warn!("failed to report diagnostic: {}", e);
        }
    }
}
