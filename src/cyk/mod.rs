/*
    This module decides membership with the CYK algorithm, keeping enough
    backpointers to rebuild one derivation
*/

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug, trace};

use crate::cnf::CnfGrammar;

// How a variable was recognized over a span
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    // `A -> token`
    Terminal(String),
    // `A -> B C` with B over [i, k] and C over [k + 1, j]
    Split { k: usize, left: String, right: String },
}

// The variables recognized over one span, each with the first derivation
// found for it
pub type Cell = IndexMap<String, Evidence>;

// Upper triangle of spans, `cells[i][j - i]` holding span [i, j]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    cells: Vec<Vec<Cell>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, i: usize, j: usize) -> Option<&Cell> {
        self.cells.get(i)?.get(j.checked_sub(i)?)
    }

    // The cell covering the whole input
    pub fn top(&self) -> Option<&Cell> {
        self.cell(0, self.len().checked_sub(1)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub table: Table,
    pub success: bool,
}

pub fn tokenize(input: &str) -> Vec<&str> {
    input.split_whitespace().collect()
}

// Runs CYK over a non-empty token sequence. The empty input is never
// accepted here, callers check `CnfGrammar::accepts_empty` for it.
pub fn recognize<S: AsRef<str>>(cnf: &CnfGrammar, tokens: &[S]) -> Recognition {
    let n = tokens.len();
    if n == 0 {
        return Recognition {
            table: Table::default(),
            success: false,
        };
    }

    let grammar = cnf.grammar();
    let binary_rules = grammar
        .productions()
        .filter_map(|(a, rule)| rule.variable_pair().map(|(b, c)| (a, b, c)))
        .collect_vec();

    let mut cells: Vec<Vec<Cell>> = (0..n).map(|i| vec![Cell::new(); n - i]).collect();

    for (i, token) in tokens.iter().enumerate() {
        let token: &str = token.as_ref();
        for (variable, rule) in grammar.productions() {
            if rule.single_terminal() == Some(token) {
                cells[i][0]
                    .entry(variable.to_string())
                    .or_insert_with(|| Evidence::Terminal(token.to_string()));
            }
        }
    }

    for length in 2..=n {
        for i in 0..=n - length {
            let j = i + length - 1;
            let mut cell = Cell::new();

            for k in i..j {
                let left = &cells[i][k - i];
                let right = &cells[k + 1][j - k - 1];
                if left.is_empty() || right.is_empty() {
                    continue;
                }
                for &(a, b, c) in &binary_rules {
                    if left.contains_key(b) && right.contains_key(c) && !cell.contains_key(a) {
                        cell.insert(
                            a.to_string(),
                            Evidence::Split {
                                k,
                                left: b.to_string(),
                                right: c.to_string(),
                            },
                        );
                    }
                }
            }

            trace!(i, j, variables = ?cell.keys().collect_vec(), "filled span");
            cells[i][length - 1] = cell;
        }
    }

    let success = cells[0][n - 1].contains_key(cnf.start());
    debug!(tokens = n, success, "ran CYK");

    Recognition {
        table: Table { cells },
        success,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::iter::zip;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::cnf::convert;
    use crate::grammar::{Symbol, ValidatedGrammar};
    use crate::parser::{validate, Productions};
    use crate::tree::{reconstruct, simplify};

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

    // Every terminal string of length at most `max_len` derivable from the
    // start variable, computed directly on the original grammar
    fn language(grammar: &ValidatedGrammar, max_len: usize) -> BTreeSet<Vec<String>> {
        let mut derived: HashMap<&str, BTreeSet<Vec<String>>> = HashMap::new();

        let mut changed = true;
        while changed {
            changed = false;
            for (variable, rule) in grammar.grammar().productions() {
                let mut partial = BTreeSet::from([Vec::new()]);
                for symbol in rule.symbols() {
                    let options = match symbol {
                        Symbol::Terminal(text) => vec![vec![text.clone()]],
                        Symbol::Variable(name) => derived
                            .get(name.as_str())
                            .map(|set| set.iter().cloned().collect_vec())
                            .unwrap_or_default(),
                    };
                    partial = partial
                        .iter()
                        .cartesian_product(options.iter())
                        .map(|(prefix, suffix)| prefix.iter().chain(suffix).cloned().collect_vec())
                        .filter(|sentence| sentence.len() <= max_len)
                        .collect();
                }
                let known = derived.entry(variable).or_default();
                for sentence in partial {
                    changed |= known.insert(sentence);
                }
            }
        }

        derived.remove(grammar.start()).unwrap_or_default()
    }

    fn sentences(alphabet: &[&str], max_len: usize) -> Vec<Vec<String>> {
        (1..=max_len)
            .flat_map(|len| {
                std::iter::repeat(alphabet.iter().map(|t| t.to_string()))
                    .take(len)
                    .multi_cartesian_product()
            })
            .collect()
    }

    #[test]
    fn recognize_english() {
        let cnf = convert(&english());
        let inputs = vec![
            "the dog runs",
            "dog runs",
            "a cat chased the dog",
            "cat chased dog",
            "dog the runs",
            "the dog",
            "the dog runs fast",
        ];
        let answers = vec![true, true, true, true, false, false, false];

        for (input, answer) in zip(inputs, answers) {
            assert_eq!(recognize(&cnf, &tokenize(input)).success, answer, "{}", input);
        }
    }

    #[test]
    fn table_holds_backpointers() {
        let cnf = convert(&english());
        let table = recognize(&cnf, &["the", "dog", "runs"]).table;

        assert_eq!(table.len(), 3);
        assert_eq!(
            table.cell(0, 0).unwrap().get("Det"),
            Some(&Evidence::Terminal("the".to_string()))
        );
        assert_eq!(table.cell(1, 1).unwrap().keys().collect_vec(), vec!["NP", "N"]);
        assert_eq!(
            table.top().unwrap().get("S"),
            Some(&Evidence::Split {
                k: 1,
                left: "NP".to_string(),
                right: "VP".to_string()
            })
        );
        assert!(table.cell(2, 1).is_none());
        assert!(table.cell(3, 3).is_none());
    }

    #[test]
    fn empty_input_is_rejected() {
        let cnf = convert(&validated("S", json!({"S": [["ε"], ["a"]]})));
        let recognition = recognize::<&str>(&cnf, &[]);

        assert!(!recognition.success);
        assert!(recognition.table.is_empty());
        assert!(recognition.table.top().is_none());
        assert!(cnf.accepts_empty());
    }

    #[test]
    fn lowest_split_wins() {
        let cnf = convert(&validated("S", json!({"S": [["S", "S"], ["a"]]})));
        let recognition = recognize(&cnf, &["a", "a", "a"]);

        assert!(recognition.success);
        assert_eq!(
            recognition.table.top().unwrap().get("S"),
            Some(&Evidence::Split {
                k: 0,
                left: "S".to_string(),
                right: "S".to_string()
            })
        );
    }

    #[test]
    fn language_is_preserved() {
        let grammars = vec![
            (english(), vec!["the", "dog", "runs", "chased"], 4),
            (validated("S", json!({"S": [["a", "S", "b"], ["ε"]]})), vec!["a", "b"], 6),
            (
                validated(
                    "S",
                    json!({
                        "S": [["A", "B", "A"], ["c"]],
                        "A": [["a", "A"], ["ε"]],
                        "B": [["S"], ["b"], ["A"]],
                    }),
                ),
                vec!["a", "b", "c"],
                4,
            ),
            (
                validated(
                    "E",
                    json!([
                        {"lhs": "E", "rhs": "E + T | T"},
                        {"lhs": "T", "rhs": "T * F | F"},
                        {"lhs": "F", "rhs": "( E ) | x"},
                    ]),
                ),
                vec!["x", "+", "*", "(", ")"],
                5,
            ),
            (
                validated(
                    "S",
                    json!({
                        "S": [["A"], ["S", "S"]],
                        "A": [["B"], ["a", "a", "a"]],
                        "B": [["S"], ["b"]],
                    }),
                ),
                vec!["a", "b"],
                4,
            ),
            (
                validated(
                    "S",
                    json!({"S": [["a", "A", "b", "c"], ["d"]], "A": [["B"]], "B": [["ε"]]}),
                ),
                vec!["a", "b", "c", "d"],
                4,
            ),
        ];

        for (grammar, alphabet, max_len) in grammars {
            let cnf = convert(&grammar);
            let symbols = cnf.symbols();
            let expected = language(&grammar, max_len);

            assert_eq!(cnf.accepts_empty(), expected.contains(&Vec::new()));
            for sentence in sentences(&alphabet, max_len) {
                let recognition = recognize(&cnf, &sentence);
                assert_eq!(
                    recognition.success,
                    expected.contains(&sentence),
                    "{:?} with {}",
                    sentence,
                    grammar.grammar()
                );
                if !recognition.success {
                    continue;
                }

                let last = sentence.len() - 1;
                let tree = reconstruct(&recognition.table, 0, last, cnf.start(), symbols);
                assert_eq!(tree.name, grammar.start(), "{:?}", sentence);
                assert_eq!(tree.sentence(), sentence.join(" "), "{:?}", sentence);
                assert_eq!(simplify(&tree, symbols), tree, "{:?}", sentence);
            }
        }
    }
}
