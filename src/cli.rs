use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Start symbol (default: first in the file)
    #[arg(short, long, value_name = "SYMBOL", global = true)]
    pub start: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the Chomsky Normal Form of a grammar as JSON
    Cnf {
        /// File containing the grammar (.json or text)
        file: PathBuf,
    },

    /// Check whether strings belong to the language of a grammar
    Check {
        /// File containing the grammar (.json or text)
        file: PathBuf,

        /// Strings to check (default: one per line of stdin)
        strings: Vec<String>,
    },

    /// Generate random strings from a grammar
    Generate {
        /// File containing the grammar (.json or text)
        file: PathBuf,

        /// Amount of distinct strings to generate (default: 10)
        #[arg(short = 'n', long, value_name = "AMOUNT")]
        amount: Option<usize>,

        /// Seed for the random generator
        #[arg(long, value_name = "SEED")]
        seed: Option<u64>,

        /// Derivation depth after which a string is given up (default: 15)
        #[arg(long, value_name = "DEPTH")]
        max_depth: Option<usize>,
    },
}

impl Command {
    pub fn file(&self) -> &PathBuf {
        match self {
            Command::Cnf { file }
            | Command::Check { file, .. }
            | Command::Generate { file, .. } => file,
        }
    }
}
