//! Solves linear loops symbolically and replaces them with a block that
//! applies the whole loop's effect in one step.
//!
//! The approach is experimental mathematics made rigorous by checks: run
//! the loop body on random cell values with exact integer arithmetic, fit
//! a polynomial model over a bounded set of monomial terms by Gaussian
//! elimination over rationals, verify the loop counter obeys the
//! decrement-by-one law, then fit the same model to the whole loop and
//! emit the solved per-cell updates. Every update reads pre-block state,
//! which the lock/unlock instructions guarantee. Any failed check leaves
//! the loop untouched; this pass never corrupts a program.

use std::collections::{BTreeMap, BTreeSet};

use num::{BigInt, BigRational, ToPrimitive, Zero};

use crate::ir::{Instruction, Program};
use crate::matrix::{self, Elimination, Matrix};
use crate::optimiser::analysis;
use crate::utils::XorShift;

/// Iteration cap of the mock runner on probe inputs. Samples are drawn
/// from `[1, N²]` with at most [`TERM_LIMIT`] terms, so a loop that obeys
/// the decrement law stays well under this.
const MOCK_ITERATION_LIMIT: usize = 512;
/// Fit attempts before an underdetermined system makes the pass give up
/// on the loop.
const RESAMPLE_LIMIT: usize = 4;
/// Largest term count the solver will fit.
const TERM_LIMIT: usize = 20;
/// Base seed of the sampling generator; mixed with the loop position so
/// every loop sees its own deterministic stream.
const SAMPLE_SEED: u64 = 0x5eed_0b5e;

/// A monomial over cell offsets: a sorted multiset of factors. The empty
/// term is the constant 1.
type Term = Vec<i32>;

pub fn linearise_loops(program: &mut Program) {
    let mut position = 0u64;
    super::rewrite_loops(program, |span| {
        position += 1;
        solve(span, SAMPLE_SEED ^ (position << 16))
    });
}

/// Attempts to replace the loop `span` (brackets included) with a solved
/// block. `None` declines and keeps the loop.
fn solve(span: &[Instruction], seed: u64) -> Option<Vec<Instruction>> {
    if !analysis::is_loop(span) {
        return None;
    }
    let body = &span[1..span.len() - 1];
    let extraction = extract(body)?;
    let mut rng = XorShift::new(seed);

    // model one body execution and insist the counter steps down by one;
    // everything else about termination follows from that
    let body_model = fit(&extraction, &mut rng, |entry| run_body(body, entry))?;
    if !counter_decrements(&extraction, &body_model) {
        return None;
    }

    // now model the loop run to completion
    let loop_model = fit(&extraction, &mut rng, |entry| run_loop(body, entry))?;

    emit(&extraction, &loop_model)
}

/// The variables (cells touched, plus the entry cell) and monomial terms a
/// loop body spans. Fails when the body is empty, moves the cursor on net,
/// or contains anything beyond moves, increments and sets.
struct Extraction {
    /// Sorted cell offsets.
    vars: Vec<i32>,
    /// Sorted terms; always contains the empty term and every variable's
    /// identity.
    terms: Vec<Term>,
}

fn extract(body: &[Instruction]) -> Option<Extraction> {
    if body.is_empty() {
        return None;
    }

    let mut vars: BTreeSet<i32> = BTreeSet::from([0]);
    let mut terms: BTreeSet<Term> = BTreeSet::from([Vec::new()]);
    let mut cursor = 0i32;

    for inst in body {
        match inst {
            Instruction::NoOp => {}
            Instruction::TapeMove { delta } => cursor += delta,
            Instruction::Incr { target, refs, .. } => {
                vars.insert(cursor + target);
                if !refs.is_empty() {
                    let mut term: Term = refs.iter().map(|r| cursor + r).collect();
                    term.sort_unstable();
                    vars.extend(term.iter().copied());

                    let mut with_counter = term.clone();
                    with_counter.push(0);
                    with_counter.sort_unstable();

                    terms.insert(term);
                    terms.insert(with_counter);
                }
            }
            Instruction::SetConst { target, .. } => {
                vars.insert(cursor + target);
            }
            _ => return None,
        }
    }

    if cursor != 0 {
        return None;
    }

    // identity monomials, then powers of the counter up to the highest
    // degree any recorded term reaches
    for &v in &vars {
        terms.insert(vec![v]);
    }
    let max_degree = terms.iter().map(Vec::len).max().unwrap_or(1);
    for degree in 2..=max_degree {
        terms.insert(vec![0; degree]);
    }

    if terms.len() > TERM_LIMIT {
        return None;
    }

    Some(Extraction {
        vars: vars.into_iter().collect(),
        terms: terms.into_iter().collect(),
    })
}

/// A probe tape: cell offset to exact integer value, absent meaning zero.
type MockTape = BTreeMap<i32, BigInt>;

/// Executes `body` once over exact integers. Pure in the entry state.
fn run_body(body: &[Instruction], entry: &MockTape) -> Option<MockTape> {
    let mut tape = entry.clone();
    let mut cursor = 0i32;

    for inst in body {
        match inst {
            Instruction::NoOp => {}
            Instruction::TapeMove { delta } => cursor += delta,
            Instruction::Incr {
                target,
                value,
                refs,
            } => {
                let mut amount = BigInt::from(*value);
                for r in refs {
                    match tape.get(&(cursor + r)) {
                        Some(v) => amount *= v,
                        None => amount = BigInt::zero(),
                    }
                }
                *tape.entry(cursor + target).or_default() += amount;
            }
            Instruction::SetConst { target, value } => {
                tape.insert(cursor + target, BigInt::from(*value));
            }
            _ => return None,
        }
    }

    Some(tape)
}

/// Executes the bracketed loop over exact integers: runs `body` until the
/// entry cell is zero, giving up past the iteration cap.
fn run_loop(body: &[Instruction], entry: &MockTape) -> Option<MockTape> {
    let mut tape = entry.clone();
    for _ in 0..MOCK_ITERATION_LIMIT {
        if tape.get(&0).map_or(true, BigInt::is_zero) {
            return Some(tape);
        }
        tape = run_body(body, &tape)?;
    }
    if tape.get(&0).map_or(true, BigInt::is_zero) {
        Some(tape)
    } else {
        None
    }
}

/// Fits post-state cell values as rational polynomials over the terms.
///
/// Builds an `(N+1) x N` sample matrix (one extra row as a consistency
/// check) against an `(N+1) x M` matrix of post-state values from the
/// runner, and eliminates. Underdetermined systems get fresh samples a
/// bounded number of times; inconsistent ones mean the loop is not in the
/// model's span at all.
///
/// The result is an `N x M` matrix: entry `(t, v)` is the coefficient of
/// term `t` in the post-state polynomial of variable `v`.
fn fit(
    extraction: &Extraction,
    rng: &mut XorShift,
    runner: impl Fn(&MockTape) -> Option<MockTape>,
) -> Option<Matrix> {
    let terms = extraction.terms.len();
    let samples = terms + 1;

    for attempt in 0..RESAMPLE_LIMIT {
        // starts at [1, N²]; every retry doubles the spread so colliding
        // samples cannot keep a small system underdetermined. Capped so
        // the counter sample never outruns the mock iteration limit.
        let high = ((terms * terms) as i64) << attempt;
        let high = high.min(MOCK_ITERATION_LIMIT as i64 - 12);
        let mut a = Matrix::zero(samples, terms);
        let mut b = Matrix::zero(samples, extraction.vars.len());

        for row in 0..samples {
            let entry: MockTape = extraction
                .vars
                .iter()
                .map(|&v| (v, BigInt::from(rng.in_range(1, high))))
                .collect();

            for (col, term) in extraction.terms.iter().enumerate() {
                let value = term
                    .iter()
                    .fold(BigInt::from(1), |acc, factor| acc * &entry[factor]);
                a[(row, col)] = BigRational::from_integer(value);
            }

            let exit = runner(&entry)?;
            for (col, v) in extraction.vars.iter().enumerate() {
                let value = exit.get(v).cloned().unwrap_or_default();
                b[(row, col)] = BigRational::from_integer(value);
            }
        }

        match matrix::eliminate(a, b) {
            Elimination::Unique(solution) => return Some(solution),
            Elimination::Underdetermined => continue,
            Elimination::Inconsistent => return None,
        }
    }

    None
}

/// Whether the fitted body model sends the entry cell to exactly
/// `cell[0] - 1`: coefficient one on the counter, minus one on the
/// constant, zero elsewhere. Without this law the iteration count is not
/// the entry value and the loop cannot be solved.
fn counter_decrements(extraction: &Extraction, model: &Matrix) -> bool {
    let counter_col = extraction
        .vars
        .iter()
        .position(|&v| v == 0)
        .expect("the entry cell is always a variable");

    extraction.terms.iter().enumerate().all(|(row, term)| {
        let expected = if term.is_empty() {
            -1
        } else if term[..] == [0] {
            1
        } else {
            0
        };
        model[(row, counter_col)] == BigRational::from_integer(BigInt::from(expected))
    })
}

/// Converts the solved model into the replacement block, or declines when
/// a coefficient is fractional or out of `i32` range.
fn emit(extraction: &Extraction, model: &Matrix) -> Option<Vec<Instruction>> {
    // per variable, the increment polynomial relative to its prior value
    let mut increments: Vec<(i32, BTreeMap<Term, i32>)> = Vec::new();
    for (col, &var) in extraction.vars.iter().enumerate() {
        let mut poly: BTreeMap<Term, i64> = BTreeMap::new();
        for (row, term) in extraction.terms.iter().enumerate() {
            let coefficient = &model[(row, col)];
            if !coefficient.is_integer() {
                return None;
            }
            let coefficient = coefficient.to_integer().to_i32()?;
            if coefficient != 0 {
                poly.insert(term.clone(), i64::from(coefficient));
            }
        }

        // the solved polynomial is the cell's final value, but increments
        // add; subtract the identity to get the change
        *poly.entry(vec![var]).or_insert(0) -= 1;
        poly.retain(|_, coefficient| *coefficient != 0);

        let poly = poly
            .into_iter()
            .map(|(term, coefficient)| Some((term, i32::try_from(coefficient).ok()?)))
            .collect::<Option<BTreeMap<Term, i32>>>()?;
        increments.push((var, poly));
    }

    // the brackets can be elided when entering with a zero counter leaves
    // every cell untouched: all increments vanish at zero and only the
    // counter itself gets reset
    let mut needs_brackets = false;
    for (var, poly) in &increments {
        if is_reset(*var, poly) {
            if *var != 0 {
                needs_brackets = true;
            }
            continue;
        }
        if poly.keys().any(|term| !term.contains(&0)) {
            needs_brackets = true;
        }
    }

    let mut block = Vec::new();
    if needs_brackets {
        block.push(Instruction::JumpIfZero { delta: 0 });
    }
    for &(var, _) in &increments {
        block.push(Instruction::WriteLock { target: var });
    }
    for (var, poly) in &increments {
        if is_reset(*var, poly) {
            block.push(Instruction::SetConst {
                target: *var,
                value: 0,
            });
            continue;
        }
        for (term, &coefficient) in poly {
            block.push(Instruction::Incr {
                target: *var,
                value: coefficient,
                refs: term.clone(),
            });
        }
    }
    for &(var, _) in &increments {
        block.push(Instruction::WriteUnlock { target: var });
    }
    if needs_brackets {
        block.push(Instruction::JumpIfNonzero { delta: 0 });
    }

    Some(block)
}

/// An increment of exactly `-var`, i.e. the cell ends at zero.
fn is_reset(var: i32, poly: &BTreeMap<Term, i32>) -> bool {
    poly.len() == 1 && poly.get(&vec![var]) == Some(&-1)
}
