//! Run the harness scripts and compare their output with expectations
use std::fs;

use burke::driver::{
    error::BurkeError,
    eval::Executor,
    options::BurkeOptions,
    statistics::Statistics,
};
use burke::eval::machine::{
    port::{PortTable, SharedBuffer},
    standard_machine,
    vm::MachineSettings,
};
use burke::syntax::reader::Reader;
use structopt::StructOpt;

pub struct Outcome {
    result: Result<(), BurkeError>,
    output: String,
    errors: String,
}

/// Evaluate a harness file with the prelude, capturing stdout and
/// diagnostics
fn run_file(filename: &str) -> Outcome {
    let path = format!("harness/test/{filename}");
    let output = SharedBuffer::default();
    let errors = SharedBuffer::default();
    let ports = PortTable::with_streams(
        Reader::from_text("<stdin>", ""),
        Box::new(output.clone()),
        Box::new(std::io::sink()),
    );
    let machine = standard_machine(MachineSettings::default(), ports).unwrap();
    let mut executor = Executor::new(machine);
    executor.capture_errors(Box::new(errors.clone()));

    let opt = BurkeOptions::from_iter(vec!["burke", &path]);
    let result = executor.execute(&opt, &mut Statistics::default());
    Outcome {
        result,
        output: output.contents(),
        errors: errors.contents(),
    }
}

fn expected(filename: &str) -> String {
    let path = format!("harness/test/{}", filename.replace(".bk", ".expect"));
    fs::read_to_string(path).unwrap()
}

/// Run and assert success with the expected output and no
/// diagnostics
fn run_test(filename: &str) {
    let outcome = run_file(filename);
    assert!(outcome.result.is_ok(), "{}", outcome.errors);
    assert_eq!(outcome.errors, "");
    assert_eq!(outcome.output, expected(filename));
}

#[test]
pub fn test_harness_001() {
    run_test("001_wrap.bk");
}

#[test]
pub fn test_harness_002() {
    run_test("002_double_wrap.bk");
}

#[test]
pub fn test_harness_003() {
    let outcome = run_file("003_recovery.bk");
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.output, expected("003_recovery.bk"));
    assert!(outcome.errors.contains("unexpected close parenthesis"));
    assert!(outcome.errors.contains("car: expected pair"));
    assert!(outcome.errors.contains("unbound symbol no-such-binding"));
    assert!(outcome.errors.contains("003_recovery.bk"));
}

#[test]
pub fn test_harness_004() {
    run_test("004_recursion.bk");
}

#[test]
pub fn test_harness_005() {
    run_test("005_environments.bk");
}

#[test]
pub fn test_harness_006() {
    run_test("006_data.bk");
}

#[test]
pub fn test_harness_007() {
    let outcome = run_file("007_unterminated.bk");
    assert!(matches!(outcome.result, Err(BurkeError::Syntax(_))));
    assert_eq!(outcome.output, expected("007_unterminated.bk"));
    assert!(outcome.errors.contains("unexpected end of input"));
}
