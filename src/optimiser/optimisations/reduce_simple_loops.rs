//! Rewrites simple loops into straight-line multiply-accumulates.
//!
//! A simple loop steps its entry cell by one per iteration and only adds
//! constants elsewhere, so it runs exactly `cell[0]` times (in the byte
//! ring) and every other changed cell accrues `cell[0] * change` in total.

use crate::ir::{Instruction, Program};
use crate::optimiser::analysis::{self, LoopKind};

pub fn reduce_simple_loops(program: &mut Program) {
    super::rewrite_loops(program, |span| match analysis::classify(span) {
        Some((LoopKind::Simple, info)) => {
            let step = analysis::counter_step(&info)?;

            let mut block = Vec::new();
            for (&offset, &change) in &info.delta {
                if offset == 0 {
                    continue;
                }
                block.push(Instruction::Incr {
                    target: offset,
                    value: (-step).wrapping_mul(change),
                    refs: vec![0],
                });
            }
            block.push(Instruction::SetConst {
                target: 0,
                value: 0,
            });
            Some(block)
        }
        _ => None,
    });
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::interpreter::Interpreter;
    use crate::parser;
    use crate::source::SourceFile;

    fn parse_str(src: &str) -> Program {
        parser::parse(&SourceFile::from_raw_parts("t.b".into(), src.as_bytes().to_vec()))
            .unwrap()
    }

    fn cells_after(program: &Program, range: std::ops::Range<isize>) -> Vec<u8> {
        let mut interp = Interpreter::new(program, Cursor::new(Vec::new()), Vec::new());
        interp.run().unwrap();
        range.map(|offset| interp.cell(offset)).collect()
    }

    #[test]
    fn clear_loop_becomes_a_set() {
        let mut program = parse_str("+++++[-]");
        reduce_simple_loops(&mut program);

        assert_eq!(
            program.instructions(),
            &[
                Instruction::Incr {
                    target: 0,
                    value: 5,
                    refs: vec![],
                },
                Instruction::SetConst {
                    target: 0,
                    value: 0,
                },
                Instruction::Halt,
            ]
        );
        assert_eq!(cells_after(&program, 0..1), vec![0]);
    }

    #[test]
    fn move_loop_becomes_multiply_accumulate() {
        // cell0 = 5, cell1 = 3
        let mut program = parse_str("+++++>+++<[->+<]");
        let unoptimised = cells_after(&program, 0..2);
        assert_eq!(unoptimised, vec![0, 8]);

        reduce_simple_loops(&mut program);
        let code = program.instructions();
        let loop_start = 4; // after the four setup instructions
        assert_eq!(
            &code[loop_start..],
            &[
                Instruction::Incr {
                    target: 1,
                    value: 1,
                    refs: vec![0],
                },
                Instruction::SetConst {
                    target: 0,
                    value: 0,
                },
                Instruction::Halt,
            ]
        );
        assert_eq!(cells_after(&program, 0..2), unoptimised);
    }

    #[test]
    fn multi_cell_factors() {
        // [->+++>+++++<<] distributes 3x and 5x
        let mut program = parse_str("+++++++[->+++>+++++<<]");
        let unoptimised = cells_after(&program, 0..3);
        assert_eq!(unoptimised, vec![0, 21, 35]);

        reduce_simple_loops(&mut program);
        assert!(program.was_rewritten());
        assert_eq!(cells_after(&program, 0..3), unoptimised);
    }

    #[test]
    fn upward_counter_wraps_around_the_ring() {
        // counter steps +1, so it runs 256 - 5 = 251 times
        let mut program = parse_str("+++++[+>--<]");
        let unoptimised = cells_after(&program, 0..2);

        reduce_simple_loops(&mut program);
        assert!(program.was_rewritten());
        assert_eq!(cells_after(&program, 0..2), unoptimised);
    }

    #[test]
    fn leaves_other_loops_alone() {
        for src in ["[>]", "[-.]", "[-->+<]", "[->+]"] {
            let mut program = parse_str(src);
            let before = program.instructions().to_vec();
            reduce_simple_loops(&mut program);
            assert_eq!(program.instructions(), before, "{src}");
        }
    }

    #[test]
    fn rewrites_inner_loop_of_a_nest() {
        let mut program = parse_str("[->[-]<]");
        reduce_simple_loops(&mut program);

        // the outer loop survives, the inner `[-]` is now a set
        let sets = program
            .instructions()
            .iter()
            .filter(|inst| matches!(inst, Instruction::SetConst { .. }))
            .count();
        assert_eq!(sets, 1);
        assert!(program
            .instructions()
            .iter()
            .any(|inst| matches!(inst, Instruction::JumpIfZero { .. })));
    }
}
