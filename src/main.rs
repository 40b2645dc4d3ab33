mod cli;

use std::io::BufRead;
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use chomsky::error_handling::report;
use chomsky::generator::GeneratorOptions;
use chomsky::parser::load_grammar;
use chomsky::session::{Generated, GrammarContext};
use cli::{Cli, Command};

fn print_json<T: Serialize>(value: &T, pretty: bool) -> bool {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(text) => {
            println!("{}", text);
            true
        }
        Err(e) => {
            eprintln!("Could not render output: {}", e);
            false
        }
    }
}

fn check(context: &GrammarContext, strings: &[String]) -> bool {
    if !strings.is_empty() {
        return strings.iter().all(|input| print_json(&context.check(input), false));
    }

    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(input) => {
                if !print_json(&context.check(&input), false) {
                    return false;
                }
            }
            Err(e) => {
                eprintln!("Could not read stdin: {}", e);
                return false;
            }
        }
    }
    true
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let grammar = match load_grammar(cli.command.file(), cli.start.as_deref()) {
        Ok(grammar) => grammar,
        Err(errors) => {
            report(&errors);
            return ExitCode::FAILURE;
        }
    };
    let context = GrammarContext::from_validated(grammar);

    let ok = match &cli.command {
        Command::Cnf { .. } => print_json(context.cnf(), true),
        Command::Check { strings, .. } => check(&context, strings),
        Command::Generate {
            amount,
            seed,
            max_depth,
            ..
        } => {
            let defaults = GeneratorOptions::default();
            let options = GeneratorOptions {
                max_strings: amount.unwrap_or(defaults.max_strings),
                max_depth: max_depth.unwrap_or(defaults.max_depth),
                ..defaults
            };
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(*seed),
                None => StdRng::from_entropy(),
            };
            let generated = Generated {
                success: true,
                message: None,
                generated: context.generate(None, options, rng),
            };
            print_json(&generated, true)
        }
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
