//! Optimising ahead-of-time compiler core and interpreter for the minimal
//! eight-character tape-machine language (`> < + - . , [ ]`, plus the
//! non-standard `$` debug dump).
//!
//! Source text is lowered to a compact instruction list by [`parser::parse`],
//! progressively rewritten by the loop-level passes in [`optimiser`], and
//! executed by the reference [`interpreter`]. The interpreter is the
//! authoritative semantics: every rewrite must be observationally equivalent
//! to running the unoptimised instructions on it.

/// The cell type, aka what each slot on the tape holds.
/// All cell arithmetic wraps.
pub type Cell = u8;

/// Number of cells in the tape arena.
pub const TAPE_LENGTH: usize = 1_000_000;
/// Index the data pointer starts at.
pub const START: usize = TAPE_LENGTH / 2;

pub mod clap_cli;
pub mod error;
pub mod interpreter;
pub mod ir;
pub mod matrix;
pub mod optimiser;
pub mod parser;
pub mod source;
mod utils;

pub use error::Error;
pub use ir::{Instruction, Program};

/// Parses `source` and runs the requested optimisation passes over it.
pub fn compile(
    source: &source::SourceFile,
    passes: optimiser::Passes,
) -> Result<Program, Error> {
    let mut program = parser::parse(source)?;
    optimiser::optimise(&mut program, passes);
    Ok(program)
}
