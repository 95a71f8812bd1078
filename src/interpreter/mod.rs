//! Reference interpreter for the instruction set.
//!
//! This is the authoritative semantics: optimisation passes are correct
//! exactly when the rewritten program is indistinguishable from the
//! original on this machine. It also collects per-instruction execution
//! counts, which back the `-p` profile report.

pub mod scan;

use std::collections::HashMap;
use std::io::{Read, Write};

use thiserror::Error;

use crate::ir::{Instruction, Program};
use crate::{Cell, START, TAPE_LENGTH};

/// An error raised by a malformed instruction stream at run time.
///
/// The language itself cannot produce these; only a buggy rewrite emitting
/// unbalanced lock pairs can, so they surface as internal errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// A `WriteLock` targeted a cell that already holds a scratch slot.
    #[error("cell {cell} is already locked")]
    AlreadyLocked { cell: i32 },
    /// A `WriteUnlock` targeted a cell that was never locked.
    #[error("cell {cell} is not locked")]
    NotLocked { cell: i32 },
}

/// A virtual machine over a fixed zeroed tape, with the data pointer
/// starting at the arena midpoint.
///
/// Accesses outside the arena are undefined; they are not detected and
/// will panic in the obvious way.
pub struct Interpreter<'a, R, W> {
    code: &'a [Instruction],
    tape: Vec<Cell>,
    pointer: usize,
    /// Scratch slots holding deferred writes, keyed by cell offset. The
    /// pointer cannot move between a lock and its unlock, so offsets are
    /// stable keys.
    locks: HashMap<i32, Cell>,
    counts: Vec<u64>,
    input: R,
    output: W,
}

impl<'a, R: Read, W: Write> Interpreter<'a, R, W> {
    pub fn new(program: &'a Program, input: R, output: W) -> Interpreter<'a, R, W> {
        Interpreter::over(program.instructions(), input, output)
    }

    /// Runs a bare instruction slice; used by tests that hand-craft blocks.
    pub fn over(code: &'a [Instruction], input: R, output: W) -> Interpreter<'a, R, W> {
        Interpreter {
            code,
            tape: vec![0; TAPE_LENGTH],
            pointer: START,
            locks: HashMap::new(),
            counts: vec![0; code.len()],
            input,
            output,
        }
    }

    fn cell_index(&self, offset: i32) -> usize {
        (self.pointer as isize + offset as isize) as usize
    }

    /// Writes `amount` into the cell at `offset`, honouring an active lock
    /// by writing the scratch slot instead.
    fn add_to_cell(&mut self, offset: i32, amount: Cell) {
        match self.locks.get_mut(&offset) {
            Some(slot) => *slot = slot.wrapping_add(amount),
            None => {
                let index = self.cell_index(offset);
                self.tape[index] = self.tape[index].wrapping_add(amount);
            }
        }
    }

    fn set_cell(&mut self, offset: i32, value: Cell) {
        match self.locks.get_mut(&offset) {
            Some(slot) => *slot = value,
            None => {
                let index = self.cell_index(offset);
                self.tape[index] = value;
            }
        }
    }

    /// Runs the program to its `Halt`.
    pub fn run(&mut self) -> Result<(), VmError> {
        let code = self.code;
        let mut ip = 0usize;

        while let Some(inst) = code.get(ip) {
            self.counts[ip] += 1;

            match inst {
                Instruction::NoOp => {}
                Instruction::TapeMove { delta } => {
                    self.pointer = (self.pointer as isize + *delta as isize) as usize;
                }
                Instruction::Incr {
                    target,
                    value,
                    refs,
                } => {
                    let mut amount = *value as Cell;
                    for r in refs {
                        amount = amount.wrapping_mul(self.tape[self.cell_index(*r)]);
                    }
                    self.add_to_cell(*target, amount);
                }
                Instruction::SetConst { target, value } => {
                    self.set_cell(*target, *value as Cell);
                }
                Instruction::Write => {
                    let byte = self.tape[self.pointer];
                    let _ = self.output.write_all(&[byte]);
                }
                Instruction::Read => {
                    let mut byte = [0u8; 1];
                    // on end of input the cell is left unchanged
                    if matches!(self.input.read(&mut byte), Ok(1)) {
                        self.tape[self.pointer] = byte[0];
                    }
                }
                Instruction::JumpIfZero { delta } => {
                    if self.tape[self.pointer] == 0 {
                        // lands on the partner, which re-tests and falls through
                        ip = (ip as isize + *delta as isize) as usize;
                        continue;
                    }
                }
                Instruction::JumpIfNonzero { delta } => {
                    if self.tape[self.pointer] != 0 {
                        ip = (ip as isize + *delta as isize) as usize;
                        continue;
                    }
                }
                Instruction::Scan { stride } => {
                    let displacement = scan::scan(&self.tape, self.pointer, *stride);
                    self.pointer = (self.pointer as isize + displacement) as usize;
                }
                Instruction::WriteLock { target } => {
                    if self.locks.contains_key(target) {
                        return Err(VmError::AlreadyLocked { cell: *target });
                    }
                    let value = self.tape[self.cell_index(*target)];
                    self.locks.insert(*target, value);
                }
                Instruction::WriteUnlock { target } => {
                    let Some(value) = self.locks.remove(target) else {
                        return Err(VmError::NotLocked { cell: *target });
                    };
                    let index = self.cell_index(*target);
                    self.tape[index] = value;
                }
                Instruction::Debug => self.dump_tape(),
                Instruction::Halt => break,
            }

            ip += 1;
        }

        let _ = self.output.flush();
        Ok(())
    }

    /// The `$` dump: pointer position and the occupied stretch of tape,
    /// both relative to the start cell.
    fn dump_tape(&mut self) {
        let _ = writeln!(
            self.output,
            "index = {}",
            self.pointer as isize - START as isize
        );

        let first = self.tape.iter().position(|&cell| cell != 0);
        let last = self.tape.iter().rposition(|&cell| cell != 0);
        let (Some(first), Some(last)) = (first, last) else {
            return;
        };
        for index in first..=last {
            let _ = write!(self.output, "{}\t", self.tape[index]);
        }
        let _ = writeln!(self.output);
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn tape(&self) -> &[Cell] {
        &self.tape
    }

    /// Reads the cell at `offset` from the start position; test helper.
    pub fn cell(&self, offset: isize) -> Cell {
        self.tape[(START as isize + offset) as usize]
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }
}
