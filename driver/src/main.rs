use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode as ProcessExit;

use clap::{Parser as ClapParser, Subcommand};
use veriop::run;
use veriop_session::{ExitCode, Options, Pipeline, Report};

/// SMT-based verification of peephole rewrite rules.
#[derive(Debug, ClapParser)]
#[command(name = "veriop", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lower a program or PDL pattern to an SMT-LIB script.
    Lower {
        /// Input file; stdin when absent.
        file: Option<PathBuf>,
        /// Handle only the func and comb dialects, with the plain integer
        /// type lowerer.
        #[arg(long)]
        circt: bool,
        /// Lower pairs and clean up before printing.
        #[arg(short = 'O', long)]
        opt: bool,
        /// Verify the module after every pass.
        #[arg(long)]
        verify_each: bool,
    },
    /// Combine two lowered programs into a refinement query.
    Tv {
        /// Path to the "before" program.
        before: PathBuf,
        /// Path to the "after" program.
        after: PathBuf,
        /// Lower pairs and clean up before printing.
        #[arg(short = 'O', long)]
        opt: bool,
    },
}

fn read_input(path: Option<&PathBuf>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn report_failure(report: Report) -> ProcessExit {
    eprintln!("error: {report}");
    ProcessExit::from(ExitCode::from_report(&report) as i32 as u8)
}

fn main() -> ProcessExit {
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Lower {
            file,
            circt,
            opt,
            verify_each,
        } => {
            let input = match read_input(file.as_ref()) {
                Ok(input) => input,
                Err(error) => {
                    eprintln!("error: {error}");
                    return ProcessExit::from(ExitCode::Failure as i32 as u8);
                }
            };
            let options = Options {
                pipeline: if *circt {
                    Pipeline::CombOnly
                } else {
                    Pipeline::Full
                },
                optimize: *opt,
                verify_each: *verify_each,
            };
            run::run_lower(&input, &options)
        }
        Command::Tv { before, after, opt } => {
            let inputs = read_input(Some(before)).and_then(|b| {
                read_input(Some(after)).map(|a| (b, a))
            });
            match inputs {
                Ok((before, after)) => run::run_tv(&before, &after, *opt),
                Err(error) => {
                    eprintln!("error: {error}");
                    return ProcessExit::from(ExitCode::Failure as i32 as u8);
                }
            }
        }
    };

    match result {
        Ok(script) => {
            print!("{script}");
            ProcessExit::SUCCESS
        }
        Err(report) => report_failure(report),
    }
}
