use std::fmt::{Debug, Display};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

pub trait ErrorType: Display + PartialEq {}

// Where in a grammar file something went wrong. Line 0 stands for the whole
// file.
#[derive(Debug, PartialEq, Clone)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(file: &Path, line: usize) -> Self {
        Location {
            file: file.to_path_buf(),
            line,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{}:{}", self.file.display(), self.line)
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Error<T: ErrorType> {
    pub location: Location,
    pub error: T,
}

impl<T: ErrorType> Error<T> {
    pub fn at(file: &Path, line: usize, error: T) -> Self {
        Error {
            location: Location::new(file, line),
            error,
        }
    }

    // Same text as Display, without the terminal colours
    pub fn plain(&self) -> String {
        format!("[{}]  {}", self.location, self.error)
    }
}

impl<T: ErrorType> Display for Error<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\x1b[31;49;1m[{}]\x1b[39;49;1m  {}\x1b[0m", self.location, self.error)
    }
}

impl<T: ErrorType + Debug> std::error::Error for Error<T> {}

pub type Errors<T> = Vec<Error<T>>;

// Prints every error on its own line of stderr, coloured when stderr is a
// terminal
pub fn report<T: ErrorType>(errors: &Errors<T>) {
    let colour = std::io::stderr().is_terminal();
    for error in errors {
        if colour {
            eprintln!("{}", error);
        } else {
            eprintln!("{}", error.plain());
        }
    }
}
