//! The intermediate representation: tagged instructions and the program
//! that owns them.

use std::fmt;

use crate::optimiser::analysis::{self, LoopKind};

/// One tape-machine instruction.
///
/// Jumps encode their partner as a signed relative delta, never a pointer,
/// so rewrites stay local: for every [`Instruction::JumpIfZero`] at index
/// `i` the matching [`Instruction::JumpIfNonzero`] sits at `i + delta`, and
/// the two deltas sum to zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Placeholder, never executed.
    NoOp,
    /// `ptr <- ptr + delta`.
    TapeMove { delta: i32 },
    /// `cell[ptr+target] += value * cell[ptr+r]` for every `r` in `refs`,
    /// in the wrapping byte ring. With empty `refs` this is a plain
    /// constant increment.
    Incr {
        target: i32,
        value: i32,
        refs: Vec<i32>,
    },
    /// `cell[ptr+target] = value`.
    SetConst { target: i32, value: i32 },
    /// Emit `cell[ptr]` as one byte on the output stream.
    Write,
    /// Read one byte from the input stream into `cell[ptr]`.
    /// On end of input the cell is left unchanged.
    Read,
    /// If `cell[ptr] == 0`, advance the instruction index by `delta`.
    JumpIfZero { delta: i32 },
    /// If `cell[ptr] != 0`, advance the instruction index by `delta`
    /// (always negative).
    JumpIfNonzero { delta: i32 },
    /// While `cell[ptr] != 0`, step the pointer by `stride`. The stride is
    /// never zero.
    Scan { stride: i32 },
    /// Begin deferring writes to `cell[ptr+target]` into a scratch slot.
    /// Reads keep seeing the tape.
    WriteLock { target: i32 },
    /// Commit the scratch slot back into `cell[ptr+target]`.
    WriteUnlock { target: i32 },
    /// Diagnostic tape dump (the `$` extension).
    Debug,
    /// Terminate. Every program ends with exactly one of these.
    Halt,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::NoOp => write!(f, "NO_OP"),
            Instruction::TapeMove { delta } => write!(f, "TAPE_M {delta:+}"),
            Instruction::Incr {
                target,
                value,
                refs,
            } => {
                write!(f, "INCR [{target}] += {value}")?;
                for r in refs {
                    write!(f, " * [{r}]")?;
                }
                Ok(())
            }
            Instruction::SetConst { target, value } => write!(f, "SET_C [{target}] = {value}"),
            Instruction::Write => write!(f, "WRITE"),
            Instruction::Read => write!(f, "READ"),
            Instruction::JumpIfZero { delta } => write!(f, "JUMP_C {delta:+}"),
            Instruction::JumpIfNonzero { delta } => write!(f, "JUMP_O {delta:+}"),
            Instruction::Scan { stride } => write!(f, "SCAN {stride:+}"),
            Instruction::WriteLock { target } => write!(f, "LOCK [{target}]"),
            Instruction::WriteUnlock { target } => write!(f, "UNLOCK [{target}]"),
            Instruction::Debug => write!(f, "DEBUG"),
            Instruction::Halt => write!(f, "HALT"),
        }
    }
}

/// A parsed program: the instruction vector plus the bookkeeping needed for
/// diagnostics.
///
/// Built once by the parser, then rewritten in place by the optimisation
/// passes; each pass swaps in a freshly built instruction buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    /// One entry per source byte: the byte itself where it lowered to an
    /// instruction, 0 where it was a comment.
    source: Vec<u8>,
    /// One entry per source byte: index of the instruction it contributed
    /// to (or of the previous instruction for comment bytes; -1 before the
    /// first instruction exists).
    src_to_ir: Vec<isize>,
    rewritten: bool,
}

impl Program {
    pub(crate) fn new(
        instructions: Vec<Instruction>,
        source: Vec<u8>,
        src_to_ir: Vec<isize>,
    ) -> Program {
        Program {
            instructions,
            source,
            src_to_ir,
            rewritten: false,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut [Instruction] {
        &mut self.instructions
    }

    /// Swaps in a rewritten instruction buffer. The source map is
    /// positional and goes stale at this point, which `rewritten` records.
    pub(crate) fn replace_instructions(&mut self, instructions: Vec<Instruction>) {
        self.instructions = instructions;
        self.rewritten = true;
    }

    /// Puts back a snapshot taken before a pass ran.
    pub(crate) fn restore(&mut self, instructions: Vec<Instruction>, rewritten: bool) {
        self.instructions = instructions;
        self.rewritten = rewritten;
    }

    pub fn was_rewritten(&self) -> bool {
        self.rewritten
    }

    /// Source byte offset of the instruction at `ir_index`: the first
    /// source position that maps at or past it.
    pub fn ir_to_source(&self, ir_index: usize) -> usize {
        self.src_to_ir
            .partition_point(|&mapped| mapped < ir_index as isize)
    }

    /// Renders the profile gathered by the interpreter: execution counts,
    /// then every innermost loop classified and sorted by hotness.
    ///
    /// The per-source-byte table is only printed while the source map is
    /// still valid, that is before any pass rewrote the program; rewritten
    /// programs list per-instruction counts instead.
    pub fn profile_report(&self, counts: &[u64]) -> String {
        use std::fmt::Write as _;

        assert_eq!(
            counts.len(),
            self.instructions.len(),
            "mismatch in length of counts and program"
        );

        let mut out = String::new();
        let _ = writeln!(out, "\n==============Profile Info==============");
        if self.rewritten {
            for (i, inst) in self.instructions.iter().enumerate() {
                let _ = writeln!(out, "{i:5} : {inst} : {}", counts[i]);
            }
        } else {
            for (i, &byte) in self.source.iter().enumerate() {
                if byte == 0 {
                    continue;
                }
                let ir = self.src_to_ir[i];
                let _ = writeln!(out, "{i:5} : {} : {}", byte as char, counts[ir as usize]);
            }
        }

        let mut simple = Vec::new();
        let mut scans = Vec::new();
        let mut other = Vec::new();
        for (i, inst) in self.instructions.iter().enumerate() {
            let Instruction::JumpIfZero { delta } = inst else {
                continue;
            };
            let end = i + *delta as usize;
            let Some((kind, _)) = analysis::classify(&self.instructions[i..=end]) else {
                continue;
            };
            match kind {
                LoopKind::Simple => simple.push((counts[i], i)),
                LoopKind::Scan => scans.push((counts[i], i)),
                LoopKind::Other => other.push((counts[i], i)),
            }
        }

        self.loop_section(&mut out, "==============Simple Loops==============", simple);
        self.loop_section(&mut out, "===============Scan Loops===============", scans);
        self.loop_section(&mut out, "============Not Simple Loops============", other);

        out
    }

    fn loop_section(&self, out: &mut String, header: &str, mut loops: Vec<(u64, usize)>) {
        use std::fmt::Write as _;

        if loops.is_empty() {
            return;
        }
        loops.sort_by(|a, b| b.cmp(a));

        let _ = writeln!(out, "\n{header}");
        for (count, ir_index) in loops {
            let _ = writeln!(
                out,
                "{ir_index:5} : {} : {count}",
                self.loop_text(ir_index)
            );
        }
    }

    /// Human-readable text of the innermost loop opening at `ir_index`:
    /// its source slice when the map is still valid, its instruction span
    /// otherwise.
    fn loop_text(&self, ir_index: usize) -> String {
        if !self.rewritten {
            let begin = self.ir_to_source(ir_index);
            let mut text = String::new();
            for &byte in &self.source[begin..] {
                if byte != 0 {
                    text.push(byte as char);
                }
                if byte == b']' {
                    break;
                }
            }
            return text;
        }

        let Instruction::JumpIfZero { delta } = &self.instructions[ir_index] else {
            return String::new();
        };
        let end = ir_index + *delta as usize;
        let parts: Vec<String> = self.instructions[ir_index..=end]
            .iter()
            .map(|inst| inst.to_string())
            .collect();
        parts.join("; ")
    }
}

impl fmt::Display for Program {
    /// The instruction listing, one instruction per line. This is what
    /// `-o` writes out.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, inst) in self.instructions.iter().enumerate() {
            writeln!(f, "{i:5}\t{inst}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(Instruction::TapeMove { delta: 3 }.to_string(), "TAPE_M +3");
        assert_eq!(
            Instruction::Incr {
                target: 1,
                value: -2,
                refs: vec![0, 4],
            }
            .to_string(),
            "INCR [1] += -2 * [0] * [4]"
        );
        assert_eq!(
            Instruction::SetConst {
                target: 0,
                value: 0,
            }
            .to_string(),
            "SET_C [0] = 0"
        );
        assert_eq!(
            Instruction::JumpIfNonzero { delta: -5 }.to_string(),
            "JUMP_O -5"
        );
        assert_eq!(Instruction::Scan { stride: -2 }.to_string(), "SCAN -2");
    }

    #[test]
    fn profile_report_lists_counts_and_loops() {
        use std::io::Cursor;

        let source = crate::source::SourceFile::from_raw_parts(
            "t.b".into(),
            b"+++[-]>[>]".to_vec(),
        );
        let program = crate::parser::parse(&source).unwrap();
        let mut interp =
            crate::interpreter::Interpreter::new(&program, Cursor::new(Vec::new()), Vec::new());
        interp.run().unwrap();

        let report = program.profile_report(interp.counts());
        assert!(report.contains("Profile Info"));
        assert!(report.contains("Simple Loops"));
        assert!(report.contains("[-]"));
        assert!(report.contains("Scan Loops"));
        assert!(report.contains("[>]"));
        // the per-byte table lists the first '+' with its single execution
        assert!(report.contains("    0 : + : 1"));
    }

    #[test]
    fn rewritten_programs_report_per_instruction() {
        use std::io::Cursor;

        let source =
            crate::source::SourceFile::from_raw_parts("t.b".into(), b"+++[-]".to_vec());
        let mut program = crate::parser::parse(&source).unwrap();
        crate::optimiser::optimise(&mut program, crate::optimiser::Passes::default());
        assert!(program.was_rewritten());

        let mut interp =
            crate::interpreter::Interpreter::new(&program, Cursor::new(Vec::new()), Vec::new());
        interp.run().unwrap();

        let report = program.profile_report(interp.counts());
        assert!(report.contains("SET_C [0] = 0"));
    }

    #[test]
    fn ir_to_source_finds_contributing_byte() {
        // source "a+[-]" lowers to INCR, JUMP_C, INCR, JUMP_O, HALT
        let program = crate::parser::parse(&crate::source::SourceFile::from_raw_parts(
            "t.b".into(),
            b"a+[-]".to_vec(),
        ))
        .unwrap();

        assert_eq!(program.ir_to_source(0), 1); // the '+'
        assert_eq!(program.ir_to_source(1), 2); // the '['
        assert_eq!(program.ir_to_source(2), 3); // the '-'
        assert_eq!(program.ir_to_source(3), 4); // the ']'
    }
}
