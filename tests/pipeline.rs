//! End-to-end checks over real programs: parse, optimise with every pass
//! combination, and hold the interpreter to identical observations.

use std::io::Cursor;

use bfopt::interpreter::Interpreter;
use bfopt::optimiser::Passes;
use bfopt::source::SourceFile;
use bfopt::{Error, Program, START};

const HELLO: &str = include_str!("../test-resources/hello.b");
const MUL: &str = include_str!("../test-resources/mul.b");

fn compile_str(src: &str, passes: Passes) -> Program {
    let source = SourceFile::from_raw_parts("test.b".into(), src.as_bytes().to_vec());
    bfopt::compile(&source, passes).unwrap()
}

/// Output bytes, final pointer displacement and a window of cells.
fn observe(src: &str, passes: Passes, input: &[u8]) -> (Vec<u8>, isize, Vec<u8>) {
    let program = compile_str(src, passes);

    let mut output = Vec::new();
    let mut interp = Interpreter::new(&program, Cursor::new(input.to_vec()), &mut output);
    interp.run().unwrap();

    let pointer = interp.pointer() as isize - START as isize;
    let cells = (-4..12).map(|offset| interp.cell(offset)).collect();
    drop(interp);
    (output, pointer, cells)
}

fn no_passes() -> Passes {
    Passes {
        simple_loops: false,
        scan_loops: false,
        linearise: false,
    }
}

fn all_pass_subsets() -> Vec<Passes> {
    (0..8u8)
        .map(|bits| Passes {
            simple_loops: bits & 1 != 0,
            scan_loops: bits & 2 != 0,
            linearise: bits & 4 != 0,
        })
        .collect()
}

#[test]
fn hello_world_prints() {
    let (output, _, _) = observe(HELLO, no_passes(), b"");
    assert_eq!(output, b"Hello World!\n");
}

#[test]
fn hello_world_survives_every_pass_subset() {
    let reference = observe(HELLO, no_passes(), b"");
    for passes in all_pass_subsets() {
        assert_eq!(reference, observe(HELLO, passes, b""), "{passes:?}");
    }
}

#[test]
fn multiplication_kernel_computes_48() {
    let reference = observe(MUL, no_passes(), b"");
    assert_eq!(reference.2[4], 48); // cell 0 of the window starting at -4

    for passes in all_pass_subsets() {
        assert_eq!(reference, observe(MUL, passes, b""), "{passes:?}");
    }
}

#[test]
fn optimisation_actually_shrinks_the_kernel() {
    let plain = compile_str(MUL, no_passes());
    let optimised = compile_str(MUL, Passes::default());
    assert!(optimised.instructions().len() < plain.instructions().len());
    assert!(optimised.was_rewritten());
}

#[test]
fn echo_with_input_is_stable_under_passes() {
    let src = ",[->+<]>.";
    let reference = observe(src, no_passes(), b"Q");
    assert_eq!(reference.0, b"Q");

    for passes in all_pass_subsets() {
        assert_eq!(reference, observe(src, passes, b"Q"), "{passes:?}");
    }
}

#[test]
fn listing_ends_with_halt() {
    let program = compile_str(MUL, Passes::default());
    let listing = program.to_string();
    assert!(listing.trim_end().ends_with("HALT"));
}

#[test]
fn profile_report_covers_the_whole_run() {
    let program = compile_str(HELLO, no_passes());
    let mut interp = Interpreter::new(&program, Cursor::new(Vec::new()), Vec::new());
    interp.run().unwrap();

    let report = program.profile_report(interp.counts());
    assert!(report.contains("Profile Info"));
    assert!(report.contains("Simple Loops"));
    // hello.b walks back with a scan loop
    assert!(report.contains("[<]"));
}

#[test]
fn unbalanced_sources_abort_before_any_pass() {
    let source = SourceFile::from_raw_parts("broken.b".into(), b"++[->+<".to_vec());
    match bfopt::compile(&source, Passes::default()) {
        Err(Error::MismatchedOpener { offset }) => assert_eq!(offset, 2),
        other => panic!("expected an opener error, got {other:?}"),
    }

    let source = SourceFile::from_raw_parts("broken.b".into(), b"+]".to_vec());
    match bfopt::compile(&source, Passes::default()) {
        Err(Error::MismatchedCloser { offset }) => assert_eq!(offset, 1),
        other => panic!("expected a closer error, got {other:?}"),
    }
}
