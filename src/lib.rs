pub mod cnf;
pub mod cyk;
pub mod error_handling;
pub mod generator;
pub mod grammar;
pub mod parser;
pub mod session;
pub mod tree;
