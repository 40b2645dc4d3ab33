/*
    This module is for storing and inspecting grammars
*/

use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

pub const EPSILON: &str = "ε";

// The base unit in a grammar rule. Which variant a piece of text becomes is
// decided once, when the grammar is read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(String),
    Variable(String),
}

// Variable names start with an uppercase letter, continue with letters, digits
// or underscores and may end in a single apostrophe (S, NP, X1, S')
pub fn is_variable_name(text: &str) -> bool {
    let body = text.strip_suffix('\'').unwrap_or(text);
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

impl Symbol {
    pub fn classify(text: &str) -> Symbol {
        if is_variable_name(text) {
            Symbol::Variable(text.to_string())
        } else {
            Symbol::Terminal(text.to_string())
        }
    }

    pub fn variable(name: &str) -> Symbol {
        Symbol::Variable(name.to_string())
    }

    pub fn terminal(text: &str) -> Symbol {
        Symbol::Terminal(text.to_string())
    }

    pub fn text(&self) -> &str {
        match self {
            Symbol::Terminal(text) | Symbol::Variable(text) => text,
        }
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Symbol::Variable(name) => Some(name),
            Symbol::Terminal(_) => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Symbol::Variable(_))
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.text())
    }
}

// One alternative of a variable. `Symbols` is never empty, an empty sequence
// is always represented as `Epsilon`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rule {
    Epsilon,
    Symbols(Vec<Symbol>),
}

impl Rule {
    pub fn from_symbols(symbols: Vec<Symbol>) -> Rule {
        if symbols.is_empty() {
            Rule::Epsilon
        } else {
            Rule::Symbols(symbols)
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        match self {
            Rule::Epsilon => &[],
            Rule::Symbols(symbols) => symbols,
        }
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self, Rule::Epsilon)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.symbols().iter().filter_map(Symbol::as_variable)
    }

    // `A -> B`
    pub fn unit_target(&self) -> Option<&str> {
        match self.symbols() {
            [Symbol::Variable(target)] => Some(target),
            _ => None,
        }
    }

    // `A -> a`
    pub fn single_terminal(&self) -> Option<&str> {
        match self.symbols() {
            [Symbol::Terminal(text)] => Some(text),
            _ => None,
        }
    }

    // `A -> B C`
    pub fn variable_pair(&self) -> Option<(&str, &str)> {
        match self.symbols() {
            [Symbol::Variable(left), Symbol::Variable(right)] => Some((left, right)),
            _ => None,
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Epsilon => write!(f, "{}", EPSILON),
            Rule::Symbols(symbols) => write!(f, "{}", symbols.iter().join(" ")),
        }
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rule::Epsilon => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(EPSILON)?;
                seq.end()
            }
            Rule::Symbols(symbols) => symbols.serialize(serializer),
        }
    }
}

// The alternatives of a variable, in declaration order and without repeats
pub type Rules = IndexSet<Rule>;

// Variables mapped to their rules. Declaration order is kept since it decides
// which derivation wins for ambiguous input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Grammar {
    rules: IndexMap<String, Rules>,
}

impl Grammar {
    pub fn new() -> Self {
        Grammar::default()
    }

    // Makes sure `variable` is a key, even with no rules
    pub fn declare(&mut self, variable: &str) -> &mut Rules {
        self.rules.entry(variable.to_string()).or_default()
    }

    // Returns false if the rule was already there
    pub fn add_rule(&mut self, variable: &str, rule: Rule) -> bool {
        self.declare(variable).insert(rule)
    }

    pub fn rules(&self, variable: &str) -> Option<&Rules> {
        self.rules.get(variable)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.rules.contains_key(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rules)> {
        self.rules.iter().map(|(variable, rules)| (variable.as_str(), rules))
    }

    // Every (variable, rule) pair in declaration order
    pub fn productions(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.iter()
            .flat_map(|(variable, rules)| rules.iter().map(move |rule| (variable, rule)))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(IndexSet::len).sum()
    }

    // Drops every variable that ended up without rules
    pub fn without_empty(mut self) -> Self {
        self.rules.retain(|_, rules| !rules.is_empty());
        self
    }
}

impl Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (variable, rules) in self.iter() {
            writeln!(f, "{} -> {}", variable, rules.iter().join(" | "))?;
        }
        Ok(())
    }
}

// A grammar in which every variable is useful and reachable from `start`.
// Only the validator in `parser` builds these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedGrammar {
    start: String,
    grammar: Grammar,
}

impl ValidatedGrammar {
    pub(crate) fn new(start: String, grammar: Grammar) -> Self {
        ValidatedGrammar { start, grammar }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }
}
