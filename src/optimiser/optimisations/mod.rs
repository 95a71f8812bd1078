//! The individual loop rewrites, applied by the driver in a fixed order.

mod linearise_loops;
mod reduce_scan_loops;
mod reduce_simple_loops;

pub use linearise_loops::linearise_loops;
pub use reduce_scan_loops::reduce_scan_loops;
pub use reduce_simple_loops::reduce_simple_loops;

use crate::ir::{Instruction, Program};

/// Sweeps the program in source order and offers every loop span
/// (brackets included) to `rewrite`. A `Some` return replaces the whole
/// span; `None` keeps it untouched. Replacements commit before the sweep
/// moves on, and the fresh buffer is swapped in atomically at the end.
///
/// Emitted jumps may carry placeholder deltas; the driver relinks every
/// surviving jump after the pass.
fn rewrite_loops(
    program: &mut Program,
    mut rewrite: impl FnMut(&[Instruction]) -> Option<Vec<Instruction>>,
) {
    let code = program.instructions().to_vec();
    let mut out = Vec::with_capacity(code.len());
    let mut changed = false;

    let mut i = 0;
    while i < code.len() {
        if let Instruction::JumpIfZero { delta } = &code[i] {
            let end = i + *delta as usize;
            if let Some(replacement) = rewrite(&code[i..=end]) {
                out.extend(replacement);
                changed = true;
                i = end + 1;
                continue;
            }
        }
        out.push(code[i].clone());
        i += 1;
    }

    if changed {
        program.replace_instructions(out);
    }
}
