//! Span summaries and loop classification used to pick rewrite candidates.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::Instruction;
use crate::Cell;

/// Net effect summary of an instruction span, with all cell offsets
/// relative to the cursor at span entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeInfo {
    /// Net cursor displacement.
    pub shift: i32,
    /// Net additive change per cell from constant increments only.
    /// Entries that cancel to zero are dropped.
    pub delta: BTreeMap<i32, i32>,
    /// For each cell written by a referencing increment or a set, the
    /// cells its new value reads.
    pub parent: BTreeMap<i32, BTreeSet<i32>>,
    /// The span performs I/O, scans, dumps, halts or touches lock state.
    pub complex: bool,
    /// The span contains jumps of its own.
    pub has_jumps: bool,
}

/// Summarises `code`, usually the inner body of a candidate loop.
pub fn summarise(code: &[Instruction]) -> CodeInfo {
    let mut info = CodeInfo::default();
    let mut cursor = 0i32;

    for inst in code {
        match inst {
            Instruction::NoOp => {}
            Instruction::TapeMove { delta } => cursor += delta,
            Instruction::Incr {
                target,
                value,
                refs,
            } => {
                if refs.is_empty() {
                    *info.delta.entry(cursor + target).or_insert(0) += value;
                } else {
                    info.parent
                        .entry(cursor + target)
                        .or_default()
                        .extend(refs.iter().map(|r| cursor + r));
                }
            }
            Instruction::SetConst { target, .. } => {
                info.parent.entry(cursor + target).or_default();
            }
            Instruction::Write
            | Instruction::Read
            | Instruction::Scan { .. }
            | Instruction::Debug
            | Instruction::Halt
            | Instruction::WriteLock { .. }
            | Instruction::WriteUnlock { .. } => info.complex = true,
            Instruction::JumpIfZero { .. } | Instruction::JumpIfNonzero { .. } => {
                info.has_jumps = true
            }
        }
    }

    info.shift = cursor;
    info.delta.retain(|_, change| *change != 0);
    info
}

/// Whether `code` is a bracketed loop with a nonempty body.
pub fn is_loop(code: &[Instruction]) -> bool {
    code.len() >= 3
        && matches!(code.first(), Some(Instruction::JumpIfZero { .. }))
        && matches!(code.last(), Some(Instruction::JumpIfNonzero { .. }))
}

/// What an innermost loop can be rewritten into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// The entry cell steps by one per iteration and everything else is a
    /// constant increment: replaceable by multiply-accumulate.
    Simple,
    /// Only moves the cursor by a constant stride: replaceable by a scan.
    Scan,
    /// Anything else; the linearisation pass may still handle it.
    Other,
}

/// The per-iteration step of the entry cell when it is one of the two
/// values a counting loop can use. In the byte ring `+1` also counts: the
/// cell then walks the ring upwards and still reaches zero.
pub fn counter_step(info: &CodeInfo) -> Option<i32> {
    match info.delta.get(&0).copied().unwrap_or(0) as Cell {
        1 => Some(1),
        Cell::MAX => Some(-1),
        _ => None,
    }
}

/// Classifies the loop spanned by `code` (bounding brackets included).
/// Returns `None` when the span is not an innermost loop.
pub fn classify(code: &[Instruction]) -> Option<(LoopKind, CodeInfo)> {
    if !is_loop(code) {
        return None;
    }
    let info = summarise(&code[1..code.len() - 1]);
    if info.has_jumps {
        return None;
    }

    let kind = if !info.complex
        && info.shift == 0
        && info.parent.is_empty()
        && counter_step(&info).is_some()
    {
        LoopKind::Simple
    } else if !info.complex && info.shift != 0 && info.delta.is_empty() && info.parent.is_empty()
    {
        LoopKind::Scan
    } else {
        LoopKind::Other
    };

    Some((kind, info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::source::SourceFile;

    fn instructions(src: &str) -> Vec<Instruction> {
        let program = parser::parse(&SourceFile::from_raw_parts(
            "t.b".into(),
            src.as_bytes().to_vec(),
        ))
        .unwrap();
        let mut code = program.instructions().to_vec();
        code.pop(); // drop the HALT so the span is just the loop
        code
    }

    fn kind(src: &str) -> Option<LoopKind> {
        classify(&instructions(src)).map(|(kind, _)| kind)
    }

    #[test]
    fn summary_tracks_shift_and_deltas() {
        let code = instructions(">>+<-<++");
        let info = summarise(&code);
        assert_eq!(info.shift, 0);
        assert_eq!(info.delta.get(&0), Some(&2));
        assert_eq!(info.delta.get(&1), Some(&-1));
        assert_eq!(info.delta.get(&2), Some(&1));
        assert!(!info.complex);
        assert!(!info.has_jumps);
    }

    #[test]
    fn cancelled_deltas_are_dropped() {
        let info = summarise(&instructions("+->><<"));
        assert!(info.delta.is_empty());
        assert_eq!(info.shift, 0);
    }

    #[test]
    fn io_marks_complex() {
        assert!(summarise(&instructions(".")).complex);
        assert!(summarise(&instructions(",")).complex);
        assert!(summarise(&instructions("$")).complex);
        assert!(!summarise(&instructions("+>-<")).complex);
    }

    #[test]
    fn classification() {
        assert_eq!(kind("[-]"), Some(LoopKind::Simple));
        assert_eq!(kind("[->+<]"), Some(LoopKind::Simple));
        assert_eq!(kind("[->+++>+++++<<]"), Some(LoopKind::Simple));
        // an upward-counting cell still reaches zero in the byte ring
        assert_eq!(kind("[+>--<]"), Some(LoopKind::Simple));

        assert_eq!(kind("[>]"), Some(LoopKind::Scan));
        assert_eq!(kind("[>>>]"), Some(LoopKind::Scan));
        assert_eq!(kind("[<<]"), Some(LoopKind::Scan));

        // the entry cell does not step by one
        assert_eq!(kind("[-->+<]"), Some(LoopKind::Other));
        // the entry cell is untouched
        assert_eq!(kind("[>+<]"), Some(LoopKind::Other));
        // net shift with changes is neither shape
        assert_eq!(kind("[->+]"), Some(LoopKind::Other));
        // I/O disqualifies both shapes
        assert_eq!(kind("[-.]"), Some(LoopKind::Other));
    }

    #[test]
    fn nested_loops_are_not_innermost() {
        assert_eq!(kind("[[-]]"), None);
        assert_eq!(kind("[->[-<+>]<]"), None);
    }

    #[test]
    fn non_loops_are_rejected() {
        assert!(classify(&instructions("+++")).is_none());
        assert!(classify(&instructions("[]")).is_none());
    }

    #[test]
    fn parents_record_dependencies() {
        let code = [
            Instruction::Incr {
                target: 2,
                value: 1,
                refs: vec![0, 1],
            },
            Instruction::SetConst {
                target: 3,
                value: 9,
            },
        ];
        let info = summarise(&code);
        assert_eq!(
            info.parent.get(&2),
            Some(&BTreeSet::from([0, 1]))
        );
        assert_eq!(info.parent.get(&3), Some(&BTreeSet::new()));
        assert!(info.delta.is_empty());
    }
}
