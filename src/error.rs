//! Error and diagnostic-report utilities.

use std::io;
use std::path::{Path, PathBuf};

use colored::Colorize;
use either::Either;
use thiserror::Error as ThisError;

use crate::source::SourceFile;

/// Number of bytes around an error offset shown for context in reports.
const CONTEXT_WINDOW: usize = 50;

/// Any error the pipeline surfaces to the user.
///
/// Parse and I/O errors abort the pipeline before any pass runs. Optimiser
/// refusals (oversized systems, fractional solutions and so on) are not
/// errors at all: they silently leave the loop unchanged.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A `[` was never closed.
    #[error("Mismatched loop start at char {offset}")]
    MismatchedOpener { offset: usize },
    /// A `]` without a matching opener.
    #[error("Mismatched loop end at char {offset}")]
    MismatchedCloser { offset: usize },
    /// The source file could not be read.
    #[error("Cannot read file: {path:?}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The output file could not be written.
    #[error("Cannot write file: {path:?}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A rewrite or a rewritten program violated an IR invariant.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Where the error points: a byte offset into the source, or a file as
    /// a whole.
    pub fn location(&self) -> Option<Either<usize, &Path>> {
        match self {
            Error::MismatchedOpener { offset } | Error::MismatchedCloser { offset } => {
                Some(Either::Left(*offset))
            }
            Error::Unreadable { path, .. } | Error::Unwritable { path, .. } => {
                Some(Either::Right(path))
            }
            Error::Internal(_) => None,
        }
    }

    /// Returns a fancy print-ready description of the error, with a window
    /// of surrounding source when the location is a byte offset.
    pub fn report(&self, source: Option<&SourceFile>) -> String {
        let mut out = String::new();
        out.push_str(&"Error:".red().bold().to_string());

        match self.location() {
            Some(Either::Left(offset)) => match source {
                Some(sf) => out.push_str(&format!(" at byte {offset} in {:?}\n", sf.path())),
                None => out.push_str(&format!(" at byte {offset}\n")),
            },
            Some(Either::Right(path)) => out.push_str(&format!(" in {path:?}\n")),
            None => out.push('\n'),
        }

        out.push_str(&format!(" → {}\n", self.to_string().underline().bold()));

        if let (Some(Either::Left(offset)), Some(sf)) = (self.location(), source) {
            let bytes = sf.bytes();
            if offset < bytes.len() {
                let pre = offset.saturating_sub(CONTEXT_WINDOW)..offset;
                let post = (offset + 1)..bytes.len().min(offset + 1 + CONTEXT_WINDOW);

                out.push_str(&"[...] ".black().to_string());
                out.push_str(&String::from_utf8_lossy(&bytes[pre]));
                out.push_str(
                    &String::from_utf8_lossy(&bytes[offset..=offset])
                        .red()
                        .underline()
                        .bold()
                        .to_string(),
                );
                out.push_str(&String::from_utf8_lossy(&bytes[post]));
                out.push_str(&" [...]".black().to_string());
            }
        }

        out
    }
}
