//! The process entry point: reads a script from stdin, runs it to
//! completion, and maps the result to the process surface `spec.md` §6
//! describes (no command-line arguments, diagnostics to stderr, exit
//! status zero on success).
use std::io::Read;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut source = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut source) {
        eprintln!("sparkle: could not read script from stdin: {}", e);
        return ExitCode::FAILURE;
    }

    match sparkle::script::run(&source) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sparkle: {}", e);
            ExitCode::FAILURE
        }
    }
}
