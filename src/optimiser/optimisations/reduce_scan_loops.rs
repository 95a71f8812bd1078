//! Rewrites scan-shaped loops (cursor movement only) into a single
//! [`Scan`](Instruction::Scan) instruction.

use crate::ir::{Instruction, Program};
use crate::optimiser::analysis::{self, LoopKind};

pub fn reduce_scan_loops(program: &mut Program) {
    super::rewrite_loops(program, |span| match analysis::classify(span) {
        Some((LoopKind::Scan, info)) => Some(vec![Instruction::Scan { stride: info.shift }]),
        _ => None,
    });
}
