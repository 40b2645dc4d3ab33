/*
    This module reads productions, in any of the accepted shapes, and turns
    them into validated grammars
*/

mod lexer;
mod verifier;

use std::fmt::Display;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error_handling::*;
use crate::grammar::*;
use lexer::Token;

// Everything that can be wrong with a set of productions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    #[error("Invalid start variable `{0}`, variables must start with an uppercase letter")]
    InvalidStartSymbol(String),
    #[error(
        "Invalid variable `{0}` on a left-hand side, \
         variables must start with an uppercase letter (e.g. S, NP, Det)"
    )]
    InvalidVariableName(String),
    #[error("Malformed production for `{lhs}`: {reason}")]
    MalformedProduction { lhs: String, reason: String },
    #[error("Undeclared variable `{variable}` used in rule `{lhs} -> {rule}`")]
    UndeclaredVariable {
        variable: String,
        lhs: String,
        rule: Rule,
    },
    #[error("No production rules defined, add at least one rule")]
    NoProductions,
    #[error(
        "Start variable `{0}` cannot generate any terminal string, \
         check for recursion without a base case"
    )]
    UnproductiveStart(String),
    #[error("Start variable `{0}` is not reachable after filtering")]
    UnreachableStart(String),
}

pub type Result<T> = std::result::Result<T, GrammarError>;

fn malformed(lhs: &str, reason: impl Display) -> GrammarError {
    GrammarError::MalformedProduction {
        lhs: lhs.to_string(),
        reason: reason.to_string(),
    }
}

// A grammar definition as handed over by a caller: the start variable plus
// its productions
#[derive(Debug, Clone, Deserialize)]
pub struct GrammarDefinition {
    pub start: String,
    pub productions: Productions,
}

// `{ "S": [["NP", "VP"], ["ε"]] }` or `[{ "lhs": "S", "rhs": "NP VP | ε" }]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Productions {
    Mapping(IndexMap<String, Rhs>),
    List(Vec<ProductionEntry>),
    Unsupported(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductionEntry {
    Entry { lhs: String, rhs: Rhs },
    Unsupported(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Rhs {
    // "A B | a b | ε"
    Text(String),
    // [["A", "B"], "a b", ["ε"]]
    Alternatives(Vec<Alternative>),
    Unsupported(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Alternative {
    Tokens(Vec<String>),
    Text(String),
    Unsupported(serde_json::Value),
}

// Renders a grammar back into the mapping form it can be read from
impl From<&Grammar> for Productions {
    fn from(grammar: &Grammar) -> Self {
        let mapping = grammar
            .iter()
            .map(|(variable, rules)| {
                let alternatives = rules
                    .iter()
                    .map(|rule| match rule {
                        Rule::Epsilon => Alternative::Tokens(vec![EPSILON.to_string()]),
                        Rule::Symbols(symbols) => Alternative::Tokens(
                            symbols.iter().map(|s| s.text().to_string()).collect(),
                        ),
                    })
                    .collect();
                (variable.to_string(), Rhs::Alternatives(alternatives))
            })
            .collect();
        Productions::Mapping(mapping)
    }
}

fn checked_lhs(lhs: &str) -> Result<&str> {
    let lhs = lhs.trim();
    if is_variable_name(lhs) {
        Ok(lhs)
    } else {
        Err(GrammarError::InvalidVariableName(lhs.to_string()))
    }
}

// Builds a rule out of already separated words. `ε` next to other symbols is
// the identity of concatenation and disappears.
fn rule_from_words<'a>(lhs: &str, words: impl IntoIterator<Item = &'a str>) -> Result<Rule> {
    let mut symbols = Vec::new();
    for word in words {
        let word = word.trim();
        if word.is_empty() || word == EPSILON {
            continue;
        }
        if word.contains(char::is_whitespace) {
            return Err(malformed(lhs, format!("symbol `{}` contains whitespace", word)));
        }
        symbols.push(Symbol::classify(word));
    }
    Ok(Rule::from_symbols(symbols))
}

// Parses "A B | a b | ε" into its rules. Only `|` and whitespace separate,
// so arrows are ordinary terminals here.
fn parse_rhs_text(lhs: &str, text: &str) -> Result<Vec<Rule>> {
    text.split('|')
        .map(|alternative| rule_from_words(lhs, alternative.split_whitespace()))
        .collect()
}

// One rule per entry, a string entry being the whitespace separated symbols
// of a single rule
fn parse_alternatives(lhs: &str, alternatives: &[Alternative]) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for alternative in alternatives {
        match alternative {
            Alternative::Tokens(tokens) => {
                rules.push(rule_from_words(lhs, tokens.iter().map(String::as_str))?)
            }
            Alternative::Text(text) => rules.push(rule_from_words(lhs, text.split_whitespace())?),
            Alternative::Unsupported(value) => {
                return Err(malformed(lhs, format!("unsupported right-hand side entry {}", value)))
            }
        }
    }
    Ok(rules)
}

// In the list form a flat list of strings is the symbols of a single rule,
// while a list of lists holds one rule per inner list
fn parse_entry_rhs(lhs: &str, rhs: &Rhs) -> Result<Vec<Rule>> {
    match rhs {
        Rhs::Text(text) => parse_rhs_text(lhs, text),
        Rhs::Alternatives(alternatives) => {
            let all_tokens = alternatives.iter().all(|a| matches!(a, Alternative::Tokens(_)));
            if all_tokens && !alternatives.is_empty() {
                parse_alternatives(lhs, alternatives)
            } else if alternatives.iter().all(|a| matches!(a, Alternative::Text(_))) {
                let words = alternatives.iter().filter_map(|a| match a {
                    Alternative::Text(word) => Some(word.as_str()),
                    _ => None,
                });
                Ok(vec![rule_from_words(lhs, words)?])
            } else {
                Err(malformed(lhs, "right-hand side mixes symbols and rules"))
            }
        }
        Rhs::Unsupported(value) => {
            Err(malformed(lhs, format!("unsupported right-hand side {}", value)))
        }
    }
}

fn parse_mapping_rhs(lhs: &str, rhs: &Rhs) -> Result<Vec<Rule>> {
    match rhs {
        Rhs::Alternatives(alternatives) => parse_alternatives(lhs, alternatives),
        Rhs::Text(text) => Err(malformed(
            lhs,
            format!("right-hand side must be a list, found {:?}", text),
        )),
        Rhs::Unsupported(value) => Err(malformed(
            lhs,
            format!("right-hand side must be a list, found {}", value),
        )),
    }
}

// Turns the raw productions into a grammar, without any semantic checks.
// Variables which end up with no rules are left out.
pub fn read_productions(productions: &Productions) -> Result<Grammar> {
    let mut grammar = Grammar::new();

    match productions {
        Productions::Mapping(mapping) => {
            for (lhs, rhs) in mapping {
                let lhs = checked_lhs(lhs)?;
                let rules = grammar.declare(lhs);
                rules.extend(parse_mapping_rhs(lhs, rhs)?);
            }
        }
        Productions::List(entries) => {
            for entry in entries {
                let (lhs, rhs) = match entry {
                    ProductionEntry::Entry { lhs, rhs } => (checked_lhs(lhs)?, rhs),
                    ProductionEntry::Unsupported(value) => {
                        return Err(malformed(
                            &value.to_string(),
                            "each production must be an object with `lhs` and `rhs`",
                        ))
                    }
                };
                let rules = grammar.declare(lhs);
                rules.extend(parse_entry_rhs(lhs, rhs)?);
            }
        }
        Productions::Unsupported(value) => {
            return Err(malformed(
                &value.to_string(),
                "productions must be a mapping or a list of `lhs`/`rhs` entries",
            ))
        }
    }

    Ok(grammar.without_empty())
}

// Reads the productions and keeps only the variables that are useful and
// reachable from `start`
pub fn validate(start: &str, productions: &Productions) -> Result<ValidatedGrammar> {
    let start = start.trim();
    if !is_variable_name(start) {
        return Err(GrammarError::InvalidStartSymbol(start.to_string()));
    }

    let grammar = read_productions(productions)?;
    if grammar.rule_count() == 0 {
        return Err(GrammarError::NoProductions);
    }

    verifier::verify_declarations(&grammar)?;

    let useful = verifier::useful_variables(&grammar);
    if !useful.contains(start) {
        return Err(GrammarError::UnproductiveStart(start.to_string()));
    }
    let grammar = verifier::keep_useful(&grammar, &useful);

    let reachable = verifier::reachable_variables(&grammar, start);
    if !reachable.contains(start) {
        return Err(GrammarError::UnreachableStart(start.to_string()));
    }
    let grammar = verifier::keep_reachable(&grammar, &reachable);
    if !grammar.contains(start) {
        return Err(GrammarError::UnreachableStart(start.to_string()));
    }

    debug!(
        start,
        variables = grammar.len(),
        rules = grammar.rule_count(),
        "validated grammar"
    );
    Ok(ValidatedGrammar::new(start.to_string(), grammar))
}

pub fn validate_definition(definition: &GrammarDefinition) -> Result<ValidatedGrammar> {
    validate(&definition.start, &definition.productions)
}

#[derive(Debug, Error)]
pub enum LoadErrorType {
    // A line which should contain a production does not
    #[error("Expected `->` after the variable")]
    MissingArrow,
    // A production has more than one arrow
    #[error("Unexpected `->` encountered")]
    UnexpectedArrow,
    // The line starts with something other than a variable
    #[error("Tried to define something other than a variable")]
    MissingVariable,
    #[error("Invalid JSON grammar: {0}")]
    Json(serde_json::Error),
    #[error("{0}")]
    Grammar(GrammarError),
    #[error("File error: {0}")]
    FileError(std::io::Error),
}

impl ErrorType for LoadErrorType {}

impl PartialEq for LoadErrorType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LoadErrorType::FileError(a), LoadErrorType::FileError(b)) => a.kind() == b.kind(),
            (LoadErrorType::Grammar(a), LoadErrorType::Grammar(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

pub type LoadError = Error<LoadErrorType>;
pub type LoadErrors = Errors<LoadErrorType>;
pub type LineResult<T> = std::result::Result<T, LoadErrorType>;
pub type FileResult<T> = std::result::Result<T, LoadErrors>;

// `Lhs -> rhs`, returning the variable and the right-hand side as text
fn parse_line(tokens: &[Token]) -> LineResult<(String, String)> {
    let lhs = match tokens.first() {
        Some(Token::Word(word)) if is_variable_name(word) => word.clone(),
        Some(_) => return Err(LoadErrorType::MissingVariable),
        None => return Err(LoadErrorType::MissingArrow),
    };

    if tokens.get(1) != Some(&Token::Arrow) {
        return Err(LoadErrorType::MissingArrow);
    }

    let rhs = &tokens[2..];
    if rhs.contains(&Token::Arrow) {
        return Err(LoadErrorType::UnexpectedArrow);
    }

    Ok((lhs, lexer::render_tokens(rhs)))
}

fn is_rule_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with(';') && !line.starts_with('#')
}

// Reads the line oriented format, one `Lhs -> alt | alt` per line. The start
// variable is the first one defined.
pub fn parse_text(source: &str, path: &Path) -> FileResult<GrammarDefinition> {
    let parsed_lines = source
        .lines()
        .enumerate()
        .filter(|(_, line)| is_rule_line(line))
        .map(|(num, line)| {
            parse_line(&lexer::lex_line(line)).map_err(|error| LoadError::at(path, num + 1, error))
        });

    let (entries, errors): (Vec<_>, Vec<_>) = parsed_lines.partition_result();
    if !errors.is_empty() {
        return Err(errors);
    }

    let start = entries.first().map(|(lhs, _)| lhs.clone()).unwrap_or_default();
    let productions = entries
        .into_iter()
        .map(|(lhs, rhs)| ProductionEntry::Entry {
            lhs,
            rhs: Rhs::Text(rhs),
        })
        .collect_vec();

    Ok(GrammarDefinition {
        start,
        productions: Productions::List(productions),
    })
}

// Loads a grammar definition from a `.json` file ({"start", "productions"})
// or from the text format
pub fn load_file(path: &PathBuf) -> FileResult<GrammarDefinition> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| vec![LoadError::at(path, 0, LoadErrorType::FileError(e))])?;

    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&source).map_err(|e| {
            let line = e.line();
            vec![LoadError::at(path, line, LoadErrorType::Json(e))]
        })
    } else {
        parse_text(&source, path)
    }
}

// Loads and validates a grammar file, `start` replacing the file's own start
pub fn load_grammar(path: &PathBuf, start: Option<&str>) -> FileResult<ValidatedGrammar> {
    let mut definition = load_file(path)?;
    if let Some(start) = start {
        definition.start = start.to_string();
    }
    validate_definition(&definition)
        .map_err(|e| vec![LoadError::at(path, 0, LoadErrorType::Grammar(e))])
}
