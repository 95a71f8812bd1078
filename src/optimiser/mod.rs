//! The optimisation driver: applies the loop rewrites in a fixed order
//! and keeps the jump deltas consistent between passes.
//!
//! Ordering matters. Simple-loop reduction strips the easy counting loops,
//! scan reduction takes the pointer-walking loops out of the later pass's
//! way, and linearisation then works on whatever remains. Each pass visits
//! innermost loops in source order and is idempotent on loops it already
//! rewrote.

pub mod analysis;
mod optimisations;

pub use optimisations::{linearise_loops, reduce_scan_loops, reduce_simple_loops};

use crate::ir::{Instruction, Program};

/// Which passes to run; defaults to all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passes {
    pub simple_loops: bool,
    pub scan_loops: bool,
    pub linearise: bool,
}

impl Default for Passes {
    fn default() -> Passes {
        Passes {
            simple_loops: true,
            scan_loops: true,
            linearise: true,
        }
    }
}

/// Rewrites `program` in place with the enabled passes.
pub fn optimise(program: &mut Program, passes: Passes) {
    run_pass(program, passes.simple_loops, reduce_simple_loops);
    run_pass(program, passes.scan_loops, reduce_scan_loops);
    run_pass(program, passes.linearise, linearise_loops);
}

/// Runs one pass and recomputes the jump deltas afterwards. A replacement
/// that breaks bracket pairing is abandoned wholesale: the pre-pass
/// program is restored, so a faulty rewrite can never corrupt anything.
fn run_pass(program: &mut Program, enabled: bool, pass: fn(&mut Program)) {
    if !enabled {
        return;
    }

    let snapshot = program.instructions().to_vec();
    let was_rewritten = program.was_rewritten();

    pass(program);

    if relink_jumps(program.instructions_mut()).is_err() {
        program.restore(snapshot, was_rewritten);
    }
}

/// Recomputes every jump delta from the instruction indices, pairing
/// brackets by nesting. Fails on unbalanced brackets, which a valid
/// program (and a valid rewrite) can never produce.
fn relink_jumps(code: &mut [Instruction]) -> Result<(), ()> {
    let mut stack = Vec::new();

    for i in 0..code.len() {
        match code[i] {
            Instruction::JumpIfZero { .. } => stack.push(i),
            Instruction::JumpIfNonzero { .. } => {
                let Some(opening) = stack.pop() else {
                    return Err(());
                };
                let delta = (i - opening) as i32;
                code[opening] = Instruction::JumpIfZero { delta };
                code[i] = Instruction::JumpIfNonzero { delta: -delta };
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        Ok(())
    } else {
        Err(())
    }
}
