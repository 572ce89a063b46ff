use std::io::{self, Write};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use log::{debug, warn, LevelFilter};
use regex::Regex;
use regex_nfa_compiler::{compile, Automaton, CompileError};
use regex_nfa_util::is_operand;

const EXIT_SYNTAX: u8 = 1;
const EXIT_INTERNAL: u8 = 2;
const EXIT_MISMATCH: u8 = 3;
const EXIT_IO: u8 = 4;

/// Compile an infix regular expression into a canonical NFA
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Expression to compile, prompted for on stdin when omitted
    expression: Option<String>,

    /// Run the automaton on STRING and print whether it is accepted
    #[arg(short, long, value_name = "STRING")]
    accept: Vec<String>,

    /// Check every --accept verdict against the `regex` crate
    #[arg(long)]
    cross_check: bool,

    /// More logging, repeat for more detail (overridden by RUST_LOG)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn prompt() -> io::Result<String> {
    print!("Enter a regular expression: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

/// The same expression in `regex` crate syntax, anchored at both ends.
fn oracle_pattern(expression: &str) -> String {
    let body: String = expression
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            if is_operand(c) {
                regex::escape(&c.to_string())
            } else {
                c.to_string()
            }
        })
        .collect();
    format!("^(?:{body})$")
}

/// Prints a verdict per input. Returns the number of disagreements with the oracle.
fn run_inputs(automaton: &Automaton, inputs: &[String], oracle: Option<&Regex>) -> usize {
    let mut mismatches = 0;
    for input in inputs {
        let accepted = automaton.accepts(input);
        println!("{input:?}: {}", if accepted { "accept" } else { "reject" });

        if let Some(oracle) = oracle {
            let expected = oracle.is_match(input);
            if expected != accepted {
                eprintln!("Mismatch on {input:?}: regex crate says {expected}");
                mismatches += 1;
            }
        }
    }
    mismatches
}

fn status(mismatches: usize) -> u8 {
    if mismatches > 0 {
        EXIT_MISMATCH
    } else {
        0
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(level(args.verbose))
        .parse_default_env()
        .init();

    let expression = match args.expression {
        Some(expression) => expression,
        None => match prompt() {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::from(EXIT_IO);
            }
        },
    };
    debug!("compiling {expression:?}");

    let compiled = match compile(&expression) {
        Ok(compiled) => compiled,
        Err(e @ CompileError::Syntax(_)) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_SYNTAX);
        }
        Err(e @ CompileError::Internal(_)) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_INTERNAL);
        }
    };

    println!("Postfix: {}", compiled.postfix());
    print!("{}", compiled.automaton());

    let oracle = if args.cross_check {
        let pattern = oracle_pattern(&expression);
        match Regex::new(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("cannot cross-check, `{pattern}` is rejected by the regex crate: {e}");
                None
            }
        }
    } else {
        None
    };

    let mismatches = run_inputs(compiled.automaton(), &args.accept, oracle.as_ref());
    ExitCode::from(status(mismatches))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_pattern_escapes_operands() {
        assert_eq!(oracle_pattern("(a|b)* c"), "^(?:(a|b)*c)$");
        assert_eq!(oracle_pattern("$+"), "^(?:\\$+)$");
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level(0), LevelFilter::Warn);
        assert_eq!(level(2), LevelFilter::Debug);
        assert_eq!(level(9), LevelFilter::Trace);
    }

    #[test]
    fn counts_oracle_disagreements() {
        let compiled = compile("a*b").unwrap();
        let inputs = ["b".to_string(), "aab".to_string(), "a".to_string()];

        let agreeing = Regex::new(&oracle_pattern("a*b")).unwrap();
        assert_eq!(run_inputs(compiled.automaton(), &inputs, Some(&agreeing)), 0);

        let disagreeing = Regex::new("^a$").unwrap();
        assert_eq!(run_inputs(compiled.automaton(), &inputs, Some(&disagreeing)), 3);
    }

    #[test]
    fn mismatches_set_the_exit_status() {
        assert_eq!(status(0), 0);
        assert_eq!(status(1), EXIT_MISMATCH);
        assert_eq!(status(3), EXIT_MISMATCH);
    }
}
