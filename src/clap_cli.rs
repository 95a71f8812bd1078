//! The cli parser defined via the clap crate and its tooling.

use std::path::PathBuf;

use clap::Parser;

/// Optimising compiler core and interpreter for the eight-character
/// tape-machine language.
#[derive(Parser)]
#[command(version, about, long_about = None)]
#[derive(Debug, PartialEq, Clone)]
pub struct CliArgs {
    /// Path to the source file
    pub file_path: PathBuf,

    /// Write the optimised instruction listing to this path
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Emit per-instruction execution counts and an inner-loop
    /// classification after the run
    #[arg(long, short, default_value_t = false)]
    pub profile: bool,

    /// Disables the simple-loop reduction pass
    #[arg(long = "no-simple-loop-optimize", default_value_t = false)]
    pub no_simple_loop_optimize: bool,

    /// Disables the scan-loop reduction pass
    #[arg(long = "no-scan-optimize", default_value_t = false)]
    pub no_scan_optimize: bool,

    /// Disables the loop linearisation pass
    #[arg(long = "no-linearize-loop-optimize", default_value_t = false)]
    pub no_linearize_loop_optimize: bool,
}

impl CliArgs {
    /// The pass set left enabled by the disabling flags.
    pub fn passes(&self) -> crate::optimiser::Passes {
        crate::optimiser::Passes {
            simple_loops: !self.no_simple_loop_optimize,
            scan_loops: !self.no_scan_optimize,
            linearise: !self.no_linearize_loop_optimize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_passes() {
        let args =
            CliArgs::try_parse_from(["bfopt", "prog.b", "--no-scan-optimize", "-p"]).unwrap();
        assert_eq!(args.file_path, PathBuf::from("prog.b"));
        assert!(args.profile);

        let passes = args.passes();
        assert!(passes.simple_loops);
        assert!(!passes.scan_loops);
        assert!(passes.linearise);
    }

    #[test]
    fn output_path_is_optional() {
        let args = CliArgs::try_parse_from(["bfopt", "prog.b"]).unwrap();
        assert_eq!(args.out, None);

        let args = CliArgs::try_parse_from(["bfopt", "prog.b", "-o", "listing.ir"]).unwrap();
        assert_eq!(args.out, Some(PathBuf::from("listing.ir")));
    }

    #[test]
    fn source_path_is_required() {
        assert!(CliArgs::try_parse_from(["bfopt"]).is_err());
    }
}
