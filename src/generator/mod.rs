/*
    This module generates sentences
*/

use std::collections::HashSet;

use rand::seq::IteratorRandom;
use rand::Rng;
use tracing::trace;

use crate::grammar::*;

// Stands in for a derivation that went deeper than allowed
pub const TRUNCATED: &str = "[...]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    // Distinct strings to produce at most
    pub max_strings: usize,
    pub max_attempts: usize,
    pub max_depth: usize,
    // Longer sentences are thrown away
    pub max_tokens: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            max_strings: 10,
            max_attempts: 50,
            max_depth: 15,
            max_tokens: 40,
        }
    }
}

fn expand_variable<'g, R: Rng + ?Sized>(
    name: &str,
    grammar: &'g Grammar,
    depth: usize,
    max_depth: usize,
    rng: &mut R,
    sentence: &mut Vec<&'g str>,
) -> bool {
    if depth > max_depth {
        return false;
    }
    let Some(rule) = grammar.rules(name).and_then(|rules| rules.iter().choose(&mut *rng)) else {
        return true;
    };

    rule.symbols().iter().all(|symbol| match symbol {
        Symbol::Terminal(_) if depth + 1 > max_depth => false,
        Symbol::Terminal(text) => {
            sentence.push(text);
            true
        }
        Symbol::Variable(next) => {
            expand_variable(next, grammar, depth + 1, max_depth, rng, sentence)
        }
    })
}

// Expands `start` by picking rules at random. None when the derivation ran
// past `max_depth`.
pub fn sample<'g, R: Rng + ?Sized>(
    grammar: &'g Grammar,
    start: &str,
    max_depth: usize,
    rng: &mut R,
) -> Option<Vec<&'g str>> {
    let mut sentence = Vec::new();
    expand_variable(start, grammar, 0, max_depth, rng, &mut sentence).then_some(sentence)
}

// Renders a sample the way it is reported, ε being the empty string
pub fn render(sample: Option<Vec<&str>>) -> String {
    match sample {
        Some(tokens) => tokens.join(" "),
        None => TRUNCATED.to_string(),
    }
}

// Distinct sentences, drawn lazily until enough were found or the attempts
// ran out
pub struct Samples<'g, R> {
    grammar: &'g Grammar,
    start: String,
    options: GeneratorOptions,
    rng: R,
    seen: HashSet<String>,
    attempts: usize,
    fallback_done: bool,
}

impl<'g, R: Rng> Samples<'g, R> {
    fn draw(&mut self) -> Option<Vec<&'g str>> {
        sample(self.grammar, &self.start, self.options.max_depth, &mut self.rng)
    }
}

impl<'g, R: Rng> Iterator for Samples<'g, R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.attempts < self.options.max_attempts
            && self.seen.len() < self.options.max_strings
        {
            self.attempts += 1;

            let Some(tokens) = self.draw() else {
                trace!(attempt = self.attempts, "derivation truncated");
                continue;
            };
            if tokens.len() > self.options.max_tokens {
                trace!(attempt = self.attempts, tokens = tokens.len(), "sentence too long");
                continue;
            }

            let sentence = tokens.join(" ");
            if self.seen.insert(sentence.clone()) {
                return Some(sentence);
            }
        }

        // Nothing came out at all: one last try, keeping only ε
        if self.seen.is_empty() && !self.fallback_done && self.options.max_strings > 0 {
            self.fallback_done = true;
            if self.draw().is_some_and(|tokens| tokens.is_empty()) {
                self.seen.insert(String::new());
                return Some(String::new());
            }
        }

        None
    }
}

pub fn samples<R: Rng>(
    grammar: &ValidatedGrammar,
    options: GeneratorOptions,
    rng: R,
) -> Samples<'_, R> {
    samples_from(grammar, grammar.start(), options, rng)
}

// Generates sentences in the given grammar starting with the given variable
pub fn samples_from<'g, R: Rng>(
    grammar: &'g ValidatedGrammar,
    start: &str,
    options: GeneratorOptions,
    rng: R,
) -> Samples<'g, R> {
    Samples {
        grammar: grammar.grammar(),
        start: start.to_string(),
        options,
        rng,
        seen: HashSet::new(),
        attempts: 0,
        fallback_done: false,
    }
}

pub fn generate<R: Rng>(
    grammar: &ValidatedGrammar,
    options: GeneratorOptions,
    rng: R,
) -> Vec<String> {
    samples(grammar, options, rng).collect()
}
