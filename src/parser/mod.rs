//! Streaming parser that lowers source bytes to instructions, with
//! run-length peephole fusion and bracket pairing done on the fly.

use crate::error::Error;
use crate::ir::{Instruction, Program};
use crate::source::SourceFile;

/// The tentative instruction a source byte lowers to, or `None` for a
/// comment byte.
fn tentative(byte: u8) -> Option<Instruction> {
    match byte {
        b'>' => Some(Instruction::TapeMove { delta: 1 }),
        b'<' => Some(Instruction::TapeMove { delta: -1 }),
        b'+' => Some(Instruction::Incr {
            target: 0,
            value: 1,
            refs: Vec::new(),
        }),
        b'-' => Some(Instruction::Incr {
            target: 0,
            value: -1,
            refs: Vec::new(),
        }),
        b'.' => Some(Instruction::Write),
        b',' => Some(Instruction::Read),
        b'[' => Some(Instruction::JumpIfZero { delta: 0 }),
        b']' => Some(Instruction::JumpIfNonzero { delta: 0 }),
        b'$' => Some(Instruction::Debug),
        _ => None,
    }
}

struct Parser {
    instructions: Vec<Instruction>,
    /// Sanitised copy of the source: the byte itself where significant,
    /// 0 where it was a comment.
    source: Vec<u8>,
    src_to_ir: Vec<isize>,
    /// Indices of the still-open `[`s.
    stack: Vec<usize>,
}

impl Parser {
    fn new() -> Parser {
        Parser {
            instructions: Vec::new(),
            source: Vec::new(),
            src_to_ir: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Pushes `inst`, fusing it into the previous instruction when both are
    /// tape moves or both are constant increments of the same cell. Jumps
    /// never fuse (the kinds differ), so fusion cannot cross a bracket.
    fn push_fused(&mut self, inst: Instruction) {
        if let Some(last) = self.instructions.last_mut() {
            match (last, &inst) {
                (
                    Instruction::TapeMove { delta: fused },
                    Instruction::TapeMove { delta },
                ) => {
                    *fused += delta;
                    return;
                }
                (
                    Instruction::Incr {
                        target: fused_target,
                        value: fused,
                        refs: fused_refs,
                    },
                    Instruction::Incr {
                        target,
                        value,
                        refs,
                    },
                ) if fused_refs.is_empty() && refs.is_empty() && fused_target == target => {
                    *fused += value;
                    return;
                }
                _ => {}
            }
        }

        self.instructions.push(inst);
    }

    fn accept(&mut self, offset: usize, byte: u8) -> Result<(), Error> {
        let Some(inst) = tentative(byte) else {
            self.source.push(0);
            self.src_to_ir.push(self.instructions.len() as isize - 1);
            return Ok(());
        };

        self.push_fused(inst);
        self.source.push(byte);
        self.src_to_ir.push(self.instructions.len() as isize - 1);

        match byte {
            b'[' => self.stack.push(self.instructions.len() - 1),
            b']' => {
                let closing = self.instructions.len() - 1;
                let Some(opening) = self.stack.pop() else {
                    return Err(Error::MismatchedCloser { offset });
                };

                let delta = (closing - opening) as i32;
                self.instructions[opening] = Instruction::JumpIfZero { delta };
                self.instructions[closing] = Instruction::JumpIfNonzero { delta: -delta };
            }
            _ => {}
        }

        Ok(())
    }

    fn finish(mut self) -> Result<Program, Error> {
        if let Some(&opening) = self.stack.first() {
            // report the first bracket that never got closed
            let offset = self
                .src_to_ir
                .partition_point(|&mapped| mapped < opening as isize);
            return Err(Error::MismatchedOpener { offset });
        }

        self.instructions.push(Instruction::Halt);
        Ok(Program::new(self.instructions, self.source, self.src_to_ir))
    }
}

/// Lowers a source file to a [`Program`], or reports the first mismatched
/// bracket with its source byte offset.
pub fn parse(source: &SourceFile) -> Result<Program, Error> {
    let mut parser = Parser::new();
    for (offset, &byte) in source.bytes().iter().enumerate() {
        parser.accept(offset, byte)?;
    }
    parser.finish()
}
