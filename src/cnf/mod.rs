/*
    This module rewrites validated grammars into Chomsky Normal Form
*/

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use crate::grammar::*;

// What the rewrite introduced, kept so parse trees can be mapped back onto
// the grammar the user wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    term_map: IndexMap<String, String>,
    nonterm_map: IndexMap<String, String>,
    // Variables standing for the tail of a binarized rule
    #[serde(skip)]
    chain_variables: IndexSet<String>,
    // For a CNF rule of a variable, the variables whose unit rules were
    // skipped to bring it there, outermost first
    #[serde(skip)]
    unit_chains: HashMap<String, HashMap<Rule, Vec<String>>>,
    #[serde(skip)]
    synthetic_start: Option<String>,
}

impl SymbolTable {
    pub fn term_map(&self) -> &IndexMap<String, String> {
        &self.term_map
    }

    pub fn nonterm_map(&self) -> &IndexMap<String, String> {
        &self.nonterm_map
    }

    // The terminal a wrapper variable stands for
    pub fn wrapped_terminal(&self, variable: &str) -> Option<&str> {
        self.nonterm_map.get(variable).map(String::as_str)
    }

    pub fn is_chain(&self, variable: &str) -> bool {
        self.chain_variables.contains(variable)
    }

    pub fn chain_variables(&self) -> impl Iterator<Item = &str> {
        self.chain_variables.iter().map(String::as_str)
    }

    pub fn unit_chain(&self, variable: &str, rule: &Rule) -> &[String] {
        self.unit_chains
            .get(variable)
            .and_then(|rules| rules.get(rule))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn synthetic_start(&self) -> Option<&str> {
        self.synthetic_start.as_deref()
    }

    fn wrap(&mut self, terminal: &str, names: &mut NameSupply) -> String {
        if let Some(wrapper) = self.term_map.get(terminal) {
            return wrapper.clone();
        }
        let wrapper = names.fresh();
        self.term_map.insert(terminal.to_string(), wrapper.clone());
        self.nonterm_map.insert(wrapper.clone(), terminal.to_string());
        wrapper
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CnfGrammar {
    grammar: Grammar,
    start: String,
    #[serde(flatten)]
    symbols: SymbolTable,
}

impl CnfGrammar {
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    // Only a synthetic start variable can carry an ε rule
    pub fn accepts_empty(&self) -> bool {
        self.grammar
            .rules(&self.start)
            .is_some_and(|rules| rules.contains(&Rule::Epsilon))
    }
}

// Hands out variable names that clash with nothing seen so far
struct NameSupply {
    known: HashSet<String>,
    counter: usize,
}

impl NameSupply {
    fn new(grammar: &Grammar) -> Self {
        let known = grammar
            .productions()
            .flat_map(|(_, rule)| rule.variables())
            .chain(grammar.variables())
            .map(str::to_string)
            .collect();
        NameSupply { known, counter: 0 }
    }

    fn fresh(&mut self) -> String {
        loop {
            self.counter += 1;
            let name = format!("X{}", self.counter);
            if self.known.insert(name.clone()) {
                return name;
            }
        }
    }

    fn fresh_start(&mut self, start: &str) -> String {
        let mut name = format!("{}'", start);
        while !self.known.insert(name.clone()) {
            name.push('\'');
        }
        name
    }
}

// Least fixed point of "A has a rule made only of nullable variables", ε
// being the empty such rule
fn nullable_variables(grammar: &Grammar) -> HashSet<&str> {
    let mut nullable = HashSet::new();

    let mut changed = true;
    while changed {
        changed = false;
        for (variable, rules) in grammar.iter() {
            if nullable.contains(variable) {
                continue;
            }
            let derives_empty = rules.iter().any(|rule| {
                rule.is_epsilon()
                    || rule
                        .symbols()
                        .iter()
                        .all(|s| s.as_variable().is_some_and(|v| nullable.contains(v)))
            });
            if derives_empty {
                nullable.insert(variable);
                changed = true;
            }
        }
    }

    nullable
}

// Every way of keeping or dropping the nullable variables of a rule, the
// variant keeping a symbol listed before the one dropping it
fn nullable_variants(symbols: &[Symbol], nullable: &HashSet<&str>) -> Vec<Vec<Symbol>> {
    let mut variants = vec![Vec::new()];

    for symbol in symbols {
        let droppable = symbol.as_variable().is_some_and(|v| nullable.contains(v));
        variants = variants
            .into_iter()
            .flat_map(|variant| {
                let mut kept = variant.clone();
                kept.push(symbol.clone());
                if droppable {
                    vec![kept, variant]
                } else {
                    vec![kept]
                }
            })
            .collect();
    }

    variants
}

fn eliminate_epsilon(grammar: &Grammar, nullable: &HashSet<&str>) -> Grammar {
    let mut result = Grammar::new();

    for (variable, rules) in grammar.iter() {
        let kept = result.declare(variable);
        for rule in rules.iter().filter(|rule| !rule.is_epsilon()) {
            for variant in nullable_variants(rule.symbols(), nullable) {
                if !variant.is_empty() {
                    kept.insert(Rule::Symbols(variant));
                }
            }
        }
    }

    result
}

// A variable left without rules derives nothing, and neither does any rule
// using it. Drops both until nothing changes.
fn drop_dangling(mut grammar: Grammar) -> Grammar {
    loop {
        grammar = grammar.without_empty();

        let mut kept = Grammar::new();
        let mut dropped = 0;
        for (variable, rule) in grammar.productions() {
            if rule.variables().all(|v| grammar.contains(v)) {
                kept.add_rule(variable, rule.clone());
            } else {
                debug!(variable, rule = %rule, "dropping rule with an empty variable");
                dropped += 1;
            }
        }

        if dropped == 0 {
            return kept;
        }
        grammar = kept;
    }
}

// Rules of each variable, each remembering the unit chain that led to it
type TracedRules = IndexMap<String, IndexMap<Rule, Vec<String>>>;

// Replaces every `A -> B` with the non-unit rules of everything A reaches
// through unit rules. `A -> A` disappears on the way.
fn eliminate_units(grammar: &Grammar) -> TracedRules {
    let mut result = TracedRules::new();

    for variable in grammar.variables() {
        let traced = result.entry(variable.to_string()).or_default();

        // breadth first, so a variable's own rules come before borrowed ones
        let mut paths: IndexMap<&str, Vec<String>> = IndexMap::new();
        paths.insert(variable, Vec::new());
        let mut next = 0;

        while let Some((current, path)) = paths.get_index(next).map(|(v, p)| (*v, p.clone())) {
            next += 1;
            for rule in grammar.rules(current).into_iter().flatten() {
                match rule.unit_target() {
                    Some(target) => {
                        if grammar.contains(target) && !paths.contains_key(target) {
                            let mut longer = path.clone();
                            longer.push(target.to_string());
                            paths.insert(target, longer);
                        }
                    }
                    None => {
                        traced.entry(rule.clone()).or_insert_with(|| path.clone());
                    }
                }
            }
        }
    }

    result
}

// Terminals sharing a rule with anything else are replaced by wrapper
// variables
fn lift_terminals(
    rules: TracedRules,
    symbols: &mut SymbolTable,
    names: &mut NameSupply,
) -> TracedRules {
    let mut result = TracedRules::new();

    for (variable, traced) in rules {
        let lifted = result.entry(variable).or_default();
        for (rule, path) in traced {
            let rule = match rule {
                Rule::Symbols(body) if body.len() > 1 => Rule::Symbols(
                    body.into_iter()
                        .map(|symbol| match symbol {
                            Symbol::Terminal(text) => Symbol::Variable(symbols.wrap(&text, names)),
                            other => other,
                        })
                        .collect(),
                ),
                rule => rule,
            };
            lifted.entry(rule).or_insert(path);
        }
    }

    result
}

fn record_unit_chain(symbols: &mut SymbolTable, variable: &str, rule: &Rule, path: &[String]) {
    if !path.is_empty() {
        symbols
            .unit_chains
            .entry(variable.to_string())
            .or_default()
            .insert(rule.clone(), path.to_vec());
    }
}

// Peels rules longer than two from the left, each peel introducing a chain
// variable for the rest of the rule
fn binarize(rules: TracedRules, symbols: &mut SymbolTable, names: &mut NameSupply) -> Grammar {
    let mut result = Grammar::new();

    for (variable, traced) in rules {
        result.declare(&variable);
        for (rule, path) in traced {
            let mut chain: VecDeque<Symbol> = match rule {
                Rule::Symbols(body) if body.len() > 2 => body.into(),
                rule => {
                    record_unit_chain(symbols, &variable, &rule, &path);
                    result.add_rule(&variable, rule);
                    continue;
                }
            };

            let mut current = variable.clone();
            while chain.len() > 2 {
                let Some(head) = chain.pop_front() else { break };
                let rest = names.fresh();
                let peeled = Rule::Symbols(vec![head, Symbol::Variable(rest.clone())]);
                if current == variable {
                    record_unit_chain(symbols, &variable, &peeled, &path);
                }
                result.add_rule(&current, peeled);
                symbols.chain_variables.insert(rest.clone());
                current = rest;
            }

            let last = Rule::Symbols(chain.into_iter().collect());
            if current == variable {
                record_unit_chain(symbols, &variable, &last, &path);
            }
            result.add_rule(&current, last);
        }
    }

    result
}

pub fn convert(validated: &ValidatedGrammar) -> CnfGrammar {
    let grammar = validated.grammar();
    let mut names = NameSupply::new(grammar);
    let mut symbols = SymbolTable::default();

    let nullable = nullable_variables(grammar);
    debug!(nullable = ?nullable.iter().sorted().collect_vec(), "nullable variables");

    let mut rewritten = eliminate_epsilon(grammar, &nullable);

    let mut start = validated.start().to_string();
    if nullable.contains(start.as_str()) {
        let fresh = names.fresh_start(&start);
        rewritten.add_rule(&fresh, Rule::Symbols(vec![Symbol::Variable(start.clone())]));
        rewritten.add_rule(&fresh, Rule::Epsilon);
        debug!(original = %start, start = %fresh, "start variable is nullable");
        symbols.synthetic_start = Some(fresh.clone());
        start = fresh;
    }

    let rewritten = drop_dangling(rewritten);

    let traced = eliminate_units(&rewritten);
    let lifted = lift_terminals(traced, &mut symbols, &mut names);
    let mut result = binarize(lifted, &mut symbols, &mut names);

    for (wrapper, terminal) in &symbols.nonterm_map {
        result.add_rule(wrapper, Rule::Symbols(vec![Symbol::Terminal(terminal.clone())]));
    }
    let result = result.without_empty();

    debug!(
        variables = result.len(),
        rules = result.rule_count(),
        wrappers = symbols.nonterm_map.len(),
        chains = symbols.chain_variables.len(),
        "converted grammar to CNF"
    );

    CnfGrammar {
        grammar: result,
        start,
        symbols,
    }
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::parser::{validate, Productions};

    fn validated(start: &str, productions: serde_json::Value) -> ValidatedGrammar {
        let productions: Productions = serde_json::from_value(productions).unwrap();
        validate(start, &productions).unwrap()
    }

    fn english() -> ValidatedGrammar {
        validated(
            "S",
            json!([
                {"lhs": "S", "rhs": "NP VP"},
                {"lhs": "NP", "rhs": "Det N | N"},
                {"lhs": "VP", "rhs": "V NP | V"},
                {"lhs": "Det", "rhs": "the | a"},
                {"lhs": "N", "rhs": "dog | cat"},
                {"lhs": "V", "rhs": "runs | chased"},
            ]),
        )
    }

    fn assert_cnf_shape(cnf: &CnfGrammar, original: &ValidatedGrammar) {
        for (variable, rule) in cnf.grammar().productions() {
            match rule {
                Rule::Epsilon => {
                    assert_eq!(variable, cnf.start());
                    assert_eq!(cnf.symbols().synthetic_start(), Some(variable));
                }
                _ => assert!(
                    rule.single_terminal().is_some() || rule.variable_pair().is_some(),
                    "{} -> {} is not in CNF",
                    variable,
                    rule
                ),
            }
        }

        let original_nullable = nullable_variables(original.grammar()).contains(original.start());
        assert_eq!(cnf.accepts_empty(), original_nullable);
        assert_eq!(cnf.symbols().synthetic_start().is_some(), original_nullable);

        for (terminal, wrapper) in cnf.symbols().term_map() {
            assert_eq!(cnf.symbols().wrapped_terminal(wrapper), Some(terminal.as_str()));
            assert!(!original.grammar().contains(wrapper));
        }
        for chain in cnf.symbols().chain_variables() {
            assert!(!original.grammar().contains(chain));
            assert!(cnf.symbols().wrapped_terminal(chain).is_none());
        }
    }

    #[test]
    fn nullable_fixed_point() {
        let grammar = validated(
            "S",
            json!({"S": [["A", "B"], ["s"]], "A": [["ε"], ["a"]], "B": [["A", "A"]], "C": [["c"]]}),
        );
        let nullable = nullable_variables(grammar.grammar());

        assert_eq!(nullable.into_iter().sorted().collect_vec(), vec!["A", "B", "S"]);
    }

    #[test]
    fn variants_keep_before_drop() {
        let nullable = HashSet::from(["A"]);
        let symbols = vec![Symbol::variable("A"), Symbol::terminal("b"), Symbol::variable("A")];
        let rendered = nullable_variants(&symbols, &nullable)
            .into_iter()
            .map(|variant| variant.iter().join(" "))
            .collect_vec();

        assert_eq!(rendered, vec!["A b A", "A b", "b A", "b"]);
    }

    #[test]
    fn english_needs_no_lifting() {
        let original = english();
        let cnf = convert(&original);

        assert_cnf_shape(&cnf, &original);
        assert_eq!(cnf.start(), "S");
        assert!(cnf.symbols().term_map().is_empty());
        assert_eq!(
            cnf.grammar().to_string(),
            "S -> NP VP\n\
             NP -> Det N | dog | cat\n\
             VP -> V NP | runs | chased\n\
             Det -> the | a\n\
             N -> dog | cat\n\
             V -> runs | chased\n"
        );

        let runs = Rule::Symbols(vec![Symbol::terminal("runs")]);
        assert_eq!(cnf.symbols().unit_chain("VP", &runs), &["V".to_string()]);
        assert!(cnf.symbols().unit_chain("V", &runs).is_empty());
    }

    #[test]
    fn nullable_start_gets_a_fresh_start() {
        let original = validated("S", json!({"S": [["a", "S", "b"], ["ε"]]}));
        let cnf = convert(&original);

        assert_cnf_shape(&cnf, &original);
        assert_eq!(cnf.start(), "S'");
        assert_eq!(
            cnf.grammar().to_string(),
            "S -> X1 X3 | X1 X2\n\
             X3 -> S X2\n\
             S' -> ε | X1 X4 | X1 X2\n\
             X4 -> S X2\n\
             X1 -> a\n\
             X2 -> b\n"
        );
        assert_eq!(
            serde_json::to_value(&cnf).unwrap()["term_map"],
            json!({"a": "X1", "b": "X2"})
        );
        assert_eq!(cnf.symbols().chain_variables().collect_vec(), vec!["X3", "X4"]);
    }

    #[test]
    fn epsilon_only_grammar() {
        let original = validated("S", json!({"S": [["ε"]]}));
        let cnf = convert(&original);

        assert_cnf_shape(&cnf, &original);
        assert_eq!(cnf.grammar().to_string(), "S' -> ε\n");
    }

    #[test]
    fn empty_variables_leave_no_rules_behind() {
        let originals = vec![
            validated("S", json!({"S": [["A", "b"]], "A": [["ε"]]})),
            validated(
                "S",
                json!({"S": [["a", "A", "b", "c"], ["d"]], "A": [["B"]], "B": [["ε"]]}),
            ),
            validated("S", json!({"S": [["A", "A"]], "A": [["ε"]]})),
        ];
        let answers = vec![
            "S -> b\n",
            "S -> X1 X4 | d\n\
             X4 -> X2 X3\n\
             X1 -> a\n\
             X2 -> b\n\
             X3 -> c\n",
            "S' -> ε\n",
        ];

        for (original, answer) in zip(originals, answers) {
            let cnf = convert(&original);

            assert_cnf_shape(&cnf, &original);
            assert_eq!(cnf.grammar().to_string(), answer);
            for (variable, rule) in cnf.grammar().productions() {
                for used in rule.variables() {
                    assert!(cnf.grammar().contains(used), "{} -> {}", variable, rule);
                }
            }
        }
    }

    #[test]
    fn fresh_names_avoid_existing_ones() {
        let original = validated(
            "S",
            json!({"S": [["S'", "x"], ["ε"]], "S'": [["X1"]], "X1": [["y"]]}),
        );
        let cnf = convert(&original);

        assert_cnf_shape(&cnf, &original);
        assert_eq!(cnf.start(), "S''");
        assert_eq!(cnf.symbols().term_map().get("x"), Some(&"X2".to_string()));
    }

    #[test]
    fn long_rules_are_chained() {
        let original = validated(
            "S",
            json!({"S": [["A", "b", "C", "D"]], "A": [["a"]], "C": [["c"]], "D": [["d"]]}),
        );
        let cnf = convert(&original);

        assert_cnf_shape(&cnf, &original);
        assert_eq!(
            cnf.grammar().to_string(),
            "S -> A X2\n\
             X2 -> X1 X3\n\
             X3 -> C D\n\
             A -> a\n\
             C -> c\n\
             D -> d\n\
             X1 -> b\n"
        );
        assert_eq!(cnf.symbols().chain_variables().collect_vec(), vec!["X2", "X3"]);
    }

    #[test]
    fn unit_chains_are_resolved_transitively() {
        let original = validated(
            "A",
            json!({"A": [["B"], ["A"]], "B": [["C"], ["b", "b"]], "C": [["c"], ["A"]]}),
        );
        let cnf = convert(&original);

        assert_cnf_shape(&cnf, &original);
        assert_eq!(
            cnf.grammar().rules("A").unwrap().iter().map(Rule::to_string).collect_vec(),
            vec!["X1 X1", "c"]
        );

        let c = Rule::Symbols(vec![Symbol::terminal("c")]);
        assert_eq!(cnf.symbols().unit_chain("A", &c), &["B".to_string(), "C".to_string()]);
    }
}
