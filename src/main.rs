use std::fs;
use std::io;
use std::process::ExitCode;

use clap::Parser as _;

use bfopt::clap_cli::CliArgs;
use bfopt::error::Error;
use bfopt::interpreter::Interpreter;
use bfopt::source::SourceFile;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let source = match SourceFile::from_file(&args.file_path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("{}", error.report(None));
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error.report(Some(&source)));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs, source: &SourceFile) -> Result<(), Error> {
    let program = bfopt::compile(source, args.passes())?;

    if let Some(path) = &args.out {
        fs::write(path, program.to_string()).map_err(|error| Error::Unwritable {
            path: path.clone(),
            source: error,
        })?;
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut interpreter = Interpreter::new(
        &program,
        stdin.lock(),
        io::BufWriter::new(stdout.lock()),
    );
    interpreter
        .run()
        .map_err(|error| Error::Internal(error.to_string()))?;

    if args.profile {
        print!("{}", program.profile_report(interpreter.counts()));
    }

    Ok(())
}
