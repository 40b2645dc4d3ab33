use std::collections::HashSet;

use tracing::debug;

use super::{GrammarError, Result};
use crate::grammar::{Grammar, Rule};

fn get_rule_undeclared_variables<'a>(
    lhs: &'a str,
    rule: &'a Rule,
    grammar: &'a Grammar,
) -> impl Iterator<Item = GrammarError> + 'a {
    rule.variables()
        .filter(|variable| !grammar.contains(variable))
        .map(move |variable| GrammarError::UndeclaredVariable {
            variable: variable.to_string(),
            lhs: lhs.to_string(),
            rule: rule.clone(),
        })
}

// Every variable used on a right-hand side must have rules of its own
pub fn verify_declarations(grammar: &Grammar) -> Result<()> {
    let mut errors = grammar
        .productions()
        .flat_map(|(lhs, rule)| get_rule_undeclared_variables(lhs, rule, grammar));

    match errors.next() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

// Least fixed point of "a variable is useful if one of its rules only uses
// useful variables". Terminals and ε never block a rule.
pub fn useful_variables(grammar: &Grammar) -> HashSet<&str> {
    let mut useful = HashSet::new();

    let mut changed = true;
    while changed {
        changed = false;
        for (variable, rules) in grammar.iter() {
            if useful.contains(variable) {
                continue;
            }
            if rules.iter().any(|rule| rule.variables().all(|v| useful.contains(v))) {
                useful.insert(variable);
                changed = true;
            }
        }
    }

    useful
}

pub fn keep_useful(grammar: &Grammar, useful: &HashSet<&str>) -> Grammar {
    let mut kept = Grammar::new();

    for (variable, rules) in grammar.iter().filter(|(v, _)| useful.contains(v)) {
        for rule in rules {
            if rule.variables().all(|v| useful.contains(v)) {
                kept.add_rule(variable, rule.clone());
            } else {
                debug!(variable, %rule, "dropping rule with a useless variable");
            }
        }
    }

    kept
}

// Depth first walk over variable references starting at `start`
pub fn reachable_variables<'a>(grammar: &'a Grammar, start: &'a str) -> HashSet<&'a str> {
    let mut reachable = HashSet::from([start]);
    let mut stack = vec![start];

    while let Some(variable) = stack.pop() {
        for rule in grammar.rules(variable).into_iter().flatten() {
            for next in rule.variables() {
                if grammar.contains(next) && reachable.insert(next) {
                    stack.push(next);
                }
            }
        }
    }

    reachable
}

// Declaration order is kept, not discovery order
pub fn keep_reachable(grammar: &Grammar, reachable: &HashSet<&str>) -> Grammar {
    let mut kept = Grammar::new();

    for (variable, rules) in grammar.iter() {
        if reachable.contains(variable) {
            kept.declare(variable).extend(rules.iter().cloned());
        } else {
            debug!(variable, "dropping unreachable variable");
        }
    }

    kept
}
