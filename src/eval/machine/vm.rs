//! The evaluator and the machine which hosts it

use std::io::Write;

use log::{debug, trace};

use crate::{
    eval::{
        error::ExecutionError,
        intrinsics,
        memory::{
            alloc::MutatorScope,
            collect::{self, CollectionReport},
            heap::{Heap, HeapStats},
            loader,
            mutator::{Constants, Mutator, MutatorHeapView},
            object::{Obj, Tag},
        },
    },
    syntax::{printer, reader::Datum},
};

use super::{
    env::EnvBuilder,
    intrinsic::{Builtin, Step},
    metrics::Metrics,
    port::PortTable,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSettings {
    /// Refuse to grow the heap beyond this many mebibytes
    pub heap_limit_mib: Option<usize>,
    /// Collect after this many mebibytes of allocation
    pub collection_threshold_mib: usize,
    /// Dump heap structure to stderr after each collection
    pub dump_heap: bool,
    /// Maximum nesting of non-tail evaluation
    pub max_depth: usize,
    /// Width used by the printer
    pub render_width: usize,
}

impl Default for MachineSettings {
    fn default() -> Self {
        MachineSettings {
            heap_limit_mib: None,
            collection_threshold_mib: 64,
            dump_heap: false,
            max_depth: 1000,
            render_width: 80,
        }
    }
}

/// Objects every machine holds for its lifetime
#[derive(Debug, Clone, Copy)]
pub struct Globals {
    pub constants: Constants,
    /// Package through which all symbols are interned
    pub package: Obj,
    /// The ground environment holding the builtins
    pub root: Obj,
}

impl Globals {
    pub fn roots(&self) -> Vec<Obj> {
        let mut roots = self.constants.roots().to_vec();
        roots.push(self.package);
        roots.push(self.root);
        roots
    }
}

/// Combinations evaluated between checks of the collection policy
const COLLECTION_CHECK_TICKS: u64 = 64;

/// Evaluates expressions with mutator access to the heap
///
/// An evaluator lives for the duration of one top-level evaluation.
/// It may collect at the head of each step of the evaluation loop;
/// any object held across a nested evaluation must be on its root
/// stack at that point.
pub struct Evaluator<'a> {
    view: MutatorHeapView<'a>,
    globals: &'a Globals,
    builtins: &'a [Box<dyn Builtin>],
    ports: &'a mut PortTable,
    metrics: &'a mut Metrics,
    settings: &'a MachineSettings,
    /// Reports of collections run by this machine
    collections: &'a mut Vec<CollectionReport>,
    /// Objects in use by evaluations in progress
    roots: Vec<Obj>,
    /// Current nesting of non-tail evaluation
    depth: usize,
}

impl MutatorScope for Evaluator<'_> {}

impl<'a> Evaluator<'a> {
    pub fn view(&self) -> MutatorHeapView<'a> {
        self.view
    }

    pub fn constants(&self) -> &Constants {
        &self.globals.constants
    }

    pub fn globals(&self) -> &Globals {
        self.globals
    }

    pub fn ports(&mut self) -> &mut PortTable {
        self.ports
    }

    pub fn settings(&self) -> &MachineSettings {
        self.settings
    }

    /// Single line text of an object for messages
    pub fn render(&self, obj: Obj) -> String {
        printer::render_compact(&self.view, obj)
    }

    /// Load a datum into the heap
    pub fn load(&self, datum: &Datum) -> Result<Obj, ExecutionError> {
        loader::load(
            &self.view,
            &self.globals.constants,
            self.globals.package,
            datum,
        )
    }

    /// Elements of the proper list `list`
    pub fn elements(&self, list: Obj, context: &str) -> Result<Vec<Obj>, ExecutionError> {
        let mut items = vec![];
        let mut next = list;
        while let Some(pair) = next.pair(&self.view) {
            items.push(pair.car());
            next = pair.cdr();
        }
        if next.is(Tag::Nil) {
            Ok(items)
        } else {
            Err(ExecutionError::MalformedOperandTree(format!(
                "{}: {} is not a proper list",
                context,
                self.render(list)
            )))
        }
    }

    /// Evaluate `expr` in `env`
    pub fn evaluate(&mut self, expr: Obj, env: Obj) -> Result<Obj, ExecutionError> {
        if self.depth >= self.settings.max_depth {
            return Err(ExecutionError::RecursionLimit(self.settings.max_depth));
        }
        self.depth += 1;
        self.metrics.depth(self.depth);
        let base = self.roots.len();
        let result = self.evaluate_tail(expr, env, base);
        self.roots.truncate(base);
        self.depth -= 1;
        result
    }

    /// Evaluate each expression of `body` in turn, leaving the last
    /// for evaluation in tail position
    pub fn sequence(&mut self, body: Obj, env: Obj) -> Result<Step, ExecutionError> {
        let view = self.view;
        self.roots.push(body);
        self.roots.push(env);
        let mut next = body;
        while let Some(pair) = next.pair(&view) {
            if pair.cdr().is(Tag::Nil) {
                return Ok(Step::Tail(pair.car(), env));
            }
            self.evaluate(pair.car(), env)?;
            next = pair.cdr();
        }

        if next.is(Tag::Nil) {
            Ok(Step::Value(self.constants().inert))
        } else {
            Err(ExecutionError::MalformedOperandTree(format!(
                "sequence: {} is not a proper list",
                self.render(body)
            )))
        }
    }

    fn evaluate_tail(&mut self, expr: Obj, env: Obj, base: usize) -> Result<Obj, ExecutionError> {
        let view = self.view;
        let mut expr = expr;
        let mut env = env;

        loop {
            self.roots.truncate(base);
            self.roots.push(expr);
            self.roots.push(env);

            let combination = match expr.tag() {
                Tag::Symbol => return view.lookup(env, expr),
                Tag::Pair => expr.pair(&view).ok_or_else(|| {
                    ExecutionError::type_mismatch("evaluate", "pair", expr.tag())
                })?,
                _ => return Ok(expr),
            };

            self.metrics.tick();
            self.safepoint();

            let mut combiner = self.evaluate(combination.car(), env)?;
            self.roots.push(combiner);
            let mut operands = combination.cdr();

            while let Some(applicative) = combiner.applicative(&view) {
                operands = self.evaluate_operands(operands, env)?;
                self.roots.push(operands);
                combiner = applicative.underlying();
            }

            match self.invoke(combiner, operands, env)? {
                Step::Value(value) => return Ok(value),
                Step::Tail(next, next_env) => {
                    expr = next;
                    env = next_env;
                }
            }
        }
    }

    /// Evaluate each element of the operand list
    fn evaluate_operands(&mut self, operands: Obj, env: Obj) -> Result<Obj, ExecutionError> {
        let items = self.elements(operands, "applicative combination")?;
        let mark = self.roots.len();
        for item in items {
            let value = self.evaluate(item, env)?;
            self.roots.push(value);
        }
        let list = self.view.list(&self.roots[mark..], self.constants().nil);
        self.roots.truncate(mark);
        list
    }

    /// Collect if the heap policy calls for it, retaining the globals
    /// and everything on the root stack
    fn safepoint(&mut self) {
        if self.metrics.ticks() % COLLECTION_CHECK_TICKS != 0 {
            return;
        }
        let heap = self.view.heap();
        if heap.policy_requires_collection() {
            let mut roots = self.globals.roots();
            roots.extend_from_slice(&self.roots);
            let report = collect::collect(&roots, heap, self.settings.dump_heap);
            self.collections.push(report);
        }
    }

    /// Apply an operative (compound or primitive) to unevaluated
    /// operands in the dynamic environment `env`
    fn invoke(&mut self, combiner: Obj, operands: Obj, env: Obj) -> Result<Step, ExecutionError> {
        let view = self.view;

        if let Some(operative) = combiner.operative(&view) {
            let frame = view.extend(operative.env(), self.constants().nil)?;
            view.bind(frame, operative.arg(), operands)?;
            if operative.earg().is(Tag::Symbol) {
                view.define(frame, operative.earg(), env)?;
            }
            return self.sequence(operative.body(), frame);
        }

        if let Some(primitive) = combiner.primitive(&view) {
            let index = primitive.index();
            let builtins = self.builtins;
            let builtin = builtins
                .get(index)
                .ok_or_else(|| ExecutionError::NotCombinable(self.render(combiner)))?;
            let info = intrinsics::intrinsic(index);
            let args = self.elements(operands, info.name())?;
            if !info.arity().accepts(args.len()) {
                return Err(ExecutionError::ArityMismatch {
                    combiner: info.name().to_string(),
                    expected: info.arity(),
                    found: args.len(),
                });
            }
            trace!("{} with {} operands", info.name(), args.len());
            return builtin.execute(self, operands, &args, env);
        }

        Err(ExecutionError::NotCombinable(self.render(combiner)))
    }
}

/// A machine: heap, global objects, builtins and ports
///
/// GC roots (outside heap, pointing in) are:
/// - the constants
/// - the package
/// - the root environment
/// - the root stack of any evaluation in progress
pub struct Machine {
    /// Main VM Memory - immutable ref and interior mutability
    heap: Heap,
    /// Objects allocated at initialisation
    globals: Globals,
    /// Primitive implementations in catalogue order
    builtins: Vec<Box<dyn Builtin>>,
    /// Open streams
    ports: PortTable,
    settings: MachineSettings,
    metrics: Metrics,
    /// Reports of collections so far
    collections: Vec<CollectionReport>,
}

impl Machine {
    /// A machine with an empty heap
    ///
    /// Globals are allocated by the initialiser passed to
    /// `initialise`; until then the machine has no objects.
    pub fn new(
        settings: MachineSettings,
        builtins: Vec<Box<dyn Builtin>>,
        ports: PortTable,
        init: impl Mutator<Input = (), Output = Globals>,
    ) -> Result<Self, ExecutionError> {
        let heap = settings
            .heap_limit_mib
            .map(Heap::with_limit)
            .unwrap_or_default()
            .with_threshold(settings.collection_threshold_mib);

        let globals = {
            let view = MutatorHeapView::new(&heap);
            init.run(&view, ())?
        };

        debug!(
            "machine initialised with {} builtins, heap {:?}",
            builtins.len(),
            heap.stats()
        );

        Ok(Machine {
            heap,
            globals,
            builtins,
            ports,
            settings,
            metrics: Metrics::default(),
            collections: vec![],
        })
    }

    /// Access the heap for allocation
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Get heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Access the metrics (ticks, allocs, etc.)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    pub fn ports(&mut self) -> &mut PortTable {
        &mut self.ports
    }

    pub fn collections(&self) -> &[CollectionReport] {
        &self.collections
    }

    /// The ground environment
    pub fn root_environment(&self) -> Obj {
        self.globals.root
    }

    /// Create a mutator heap view for heap access
    pub fn view(&self) -> MutatorHeapView<'_> {
        MutatorHeapView::new(&self.heap)
    }

    /// Load a datum into the heap
    pub fn load(&self, datum: &Datum) -> Result<Obj, ExecutionError> {
        loader::load(
            &self.view(),
            &self.globals.constants,
            self.globals.package,
            datum,
        )
    }

    /// Evaluate `expr` in `env`
    pub fn evaluate(&mut self, expr: Obj, env: Obj) -> Result<Obj, ExecutionError> {
        let objects_before = self.heap.counters().total_objects();

        let result = {
            let mut evaluator = Evaluator {
                view: MutatorHeapView::new(&self.heap),
                globals: &self.globals,
                builtins: &self.builtins,
                ports: &mut self.ports,
                metrics: &mut self.metrics,
                settings: &self.settings,
                collections: &mut self.collections,
                roots: vec![],
                depth: 0,
            };
            evaluator.evaluate(expr, env)
        };

        let objects_after = self.heap.counters().total_objects();
        self.metrics.alloc(objects_after - objects_before);
        result
    }

    /// Load and evaluate a datum in the root environment
    pub fn evaluate_datum(&mut self, datum: &Datum) -> Result<Obj, ExecutionError> {
        let expr = self.load(datum)?;
        let root = self.globals.root;
        self.evaluate(expr, root)
    }

    /// Render an object with the configured width
    pub fn render(&self, obj: Obj) -> String {
        printer::render(&self.view(), obj, self.settings.render_width)
    }

    /// Write an object to the output port `port`
    pub fn write(&mut self, obj: Obj, port: usize) -> Result<(), ExecutionError> {
        let view = MutatorHeapView::new(&self.heap);
        let out = self.ports.writer(port)?;
        printer::write(&view, obj, self.settings.render_width, out)?;
        Ok(())
    }

    /// Write a newline to the output port `port` and flush it
    pub fn newline(&mut self, port: usize) -> Result<(), ExecutionError> {
        let out = self.ports.writer(port)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }

    /// Collect garbage now, retaining everything reachable from the
    /// globals
    pub fn collect(&mut self) -> CollectionReport {
        let roots = self.globals.roots();
        let report = collect::collect(&roots, &self.heap, self.settings.dump_heap);
        self.collections.push(report);
        report
    }

    /// A point between top-level evaluations where collection is
    /// safe; collect if the heap policy calls for it
    pub fn safepoint(&mut self) -> Option<CollectionReport> {
        if self.heap.policy_requires_collection() {
            Some(self.collect())
        } else {
            None
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::driver::prelude::load_prelude;
    use crate::eval::builtins::tests::{evaluate, evaluate_err};
    use crate::eval::error::ExecutionError;
    use crate::eval::machine::{port::PortTable, standard_machine};
    use crate::syntax::reader::Reader;

    fn machine_with(settings: MachineSettings) -> Machine {
        let ports = PortTable::with_streams(
            Reader::from_text("stdin", ""),
            Box::new(std::io::sink()),
            Box::new(std::io::sink()),
        );
        let mut machine = standard_machine(settings, ports).unwrap();
        load_prelude(&mut machine).unwrap();
        machine
    }

    fn run(machine: &mut Machine, text: &str) -> Result<String, ExecutionError> {
        let mut reader = Reader::from_text("test", text);
        let mut last = None;
        while let Some(datum) = reader.read()? {
            last = Some(machine.evaluate_datum(&datum)?);
        }
        Ok(last.map(|obj| machine.render(obj)).unwrap_or_default())
    }

    #[test]
    pub fn test_self_evaluating() {
        assert_eq!(evaluate("5"), "5");
        assert_eq!(evaluate("\"s\""), "\"s\"");
        assert_eq!(evaluate("#inert"), "#inert");
        assert_eq!(evaluate("()"), "()");
    }

    #[test]
    pub fn test_wrapped_vau_receives_evaluated_operand() {
        assert_eq!(evaluate("((wrap (vau (x) e x)) 5)"), "5");
        assert_eq!(evaluate("((wrap (vau (x) e x)) (+ 2 3))"), "5");
    }

    #[test]
    pub fn test_operands_evaluated_once_per_wrap_layer() {
        let mut machine = machine_with(MachineSettings::default());
        let result = run(
            &mut machine,
            "(define count (make-vector 1 0))
             (define tick (vau (x) e
               (sequence (vector-set! count 0 (+ 1 (vector-ref count 0))) x)))
             ((wrap (wrap (vau (x) #ignore x))) (tick (quote y)))",
        )
        .unwrap();
        assert_eq!(result, "y");
        assert_eq!(run(&mut machine, "(vector-ref count 0)").unwrap(), "1");
    }

    #[test]
    pub fn test_not_combinable() {
        match evaluate_err("(1 2)") {
            ExecutionError::NotCombinable(text) => assert_eq!(text, "1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    pub fn test_unbound_symbol() {
        assert!(matches!(
            evaluate_err("(car nothing-here)"),
            ExecutionError::UnboundSymbol(name) if name == "nothing-here"
        ));
    }

    #[test]
    pub fn test_improper_operand_list() {
        assert!(matches!(
            evaluate_err("(car . 1)"),
            ExecutionError::MalformedOperandTree(_)
        ));
        assert!(matches!(
            evaluate_err("((vau (a b) #ignore a) 1)"),
            ExecutionError::MalformedOperandTree(_)
        ));
        assert!(matches!(
            evaluate_err("((vau (a . b) #ignore a) . 1)"),
            ExecutionError::MalformedOperandTree(_)
        ));
    }

    #[test]
    pub fn test_tail_calls_run_in_constant_depth() {
        let mut machine = machine_with(MachineSettings {
            max_depth: 50,
            ..MachineSettings::default()
        });
        let result = run(
            &mut machine,
            "(define loop (lambda (n) (if (= n 0) (quote done) (loop (- n 1)))))
             (loop 20000)",
        )
        .unwrap();
        assert_eq!(result, "done");
        assert!(machine.metrics().max_depth() < 50);
        assert!(machine.metrics().ticks() > 20000);
    }

    #[test]
    pub fn test_recursion_limit() {
        let mut machine = machine_with(MachineSettings {
            max_depth: 100,
            ..MachineSettings::default()
        });
        let err = run(
            &mut machine,
            "(define f (lambda (n) (+ 1 (f n))))
             (f 0)",
        )
        .unwrap_err();
        assert!(matches!(err, ExecutionError::RecursionLimit(100)));

        // the machine is still usable afterwards
        assert_eq!(run(&mut machine, "(+ 1 1)").unwrap(), "2");
    }

    #[test]
    pub fn test_collection_between_evaluations_preserves_definitions() {
        let mut machine = machine_with(MachineSettings::default());
        run(
            &mut machine,
            "(define keep (list 1 2 3))
             (define garbage (lambda (n) (if (= n 0) 0 (sequence (make-vector 10 0) (garbage (- n 1))))))
             (garbage 1000)",
        )
        .unwrap();
        let before = machine.heap().counters().total_objects();
        let report = machine.collect();
        assert!(report.live_objects > 0);
        assert!((report.live_objects as u64) < before);
        assert_eq!(run(&mut machine, "keep").unwrap(), "(1 2 3)");
        assert_eq!(run(&mut machine, "(car (list (quote a)))").unwrap(), "a");
        assert_eq!(machine.collections().len(), 1);
    }

    const LOOP: &str =
        "(define loop (lambda (n) (if (= n 0) (quote done) (loop (- n 1)))))";

    fn small_heap() -> Machine {
        machine_with(MachineSettings {
            heap_limit_mib: Some(2),
            ..MachineSettings::default()
        })
    }

    #[test]
    pub fn test_long_loop_collects_within_heap_limit() {
        let mut machine = small_heap();
        run(&mut machine, LOOP).unwrap();
        assert_eq!(run(&mut machine, "(loop 200000)").unwrap(), "done");
        assert!(!machine.collections().is_empty());
        assert!(machine.heap_stats().blocks_allocated <= 64);
    }

    #[test]
    pub fn test_pending_operands_survive_collection() {
        let mut machine = small_heap();
        run(&mut machine, LOOP).unwrap();
        assert_eq!(
            run(&mut machine, "(cons (make-vector 3 7) (loop 20000))").unwrap(),
            "(#(7 7 7) . done)"
        );
        assert!(!machine.collections().is_empty());
    }

    #[test]
    pub fn test_operative_frame_survives_collection() {
        let mut machine = small_heap();
        run(&mut machine, LOOP).unwrap();
        assert_eq!(
            run(
                &mut machine,
                "((lambda (v) (sequence (loop 20000) (list v (loop 10)))) (list 1 2))"
            )
            .unwrap(),
            "((1 2) done)"
        );
        assert!(!machine.collections().is_empty());
    }
}
