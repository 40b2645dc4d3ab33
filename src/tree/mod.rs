/*
    This module rebuilds parse trees from CYK backpointers and strips the
    structure the CNF rewrite introduced
*/

use serde::Serialize;
use tracing::warn;

use crate::cnf::SymbolTable;
use crate::cyk::{Evidence, Table};
use crate::grammar::{Rule, Symbol};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseTree {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ParseTree>,
}

impl ParseTree {
    pub fn leaf(name: impl Into<String>) -> Self {
        ParseTree {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn node(name: impl Into<String>, children: Vec<ParseTree>) -> Self {
        ParseTree {
            name: name.into(),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    // Leaf labels from left to right
    pub fn leaves(&self) -> Vec<&str> {
        if self.is_leaf() {
            return vec![self.name.as_str()];
        }
        self.children.iter().flat_map(ParseTree::leaves).collect()
    }

    pub fn sentence(&self) -> String {
        self.leaves().join(" ")
    }
}

// Builds the node for `variable` around `children`, putting back the unit
// rules the rewrite skipped. A synthetic start is replaced by the start it
// stands for.
fn wrap_units(
    variable: &str,
    rule: &Rule,
    children: Vec<ParseTree>,
    symbols: &SymbolTable,
) -> ParseTree {
    let chain = symbols.unit_chain(variable, rule);

    let mut names: Vec<&str> = chain.iter().map(String::as_str).collect();
    if symbols.synthetic_start() != Some(variable) || names.is_empty() {
        names.insert(0, variable);
    }

    let Some((innermost, outer)) = names.split_last() else {
        return ParseTree::node(variable, children);
    };
    outer
        .iter()
        .rev()
        .fold(ParseTree::node(*innermost, children), |tree, name| {
            ParseTree::node(*name, vec![tree])
        })
}

// Children of a node, chain variables replaced by what they stand for
fn attach(children: &mut Vec<ParseTree>, child: ParseTree, symbols: &SymbolTable) {
    if symbols.is_chain(&child.name) {
        children.extend(child.children);
    } else {
        children.push(child);
    }
}

// Rebuilds the tree of `variable` over span [i, j]
pub fn reconstruct(
    table: &Table,
    i: usize,
    j: usize,
    variable: &str,
    symbols: &SymbolTable,
) -> ParseTree {
    let Some(evidence) = table.cell(i, j).and_then(|cell| cell.get(variable)) else {
        warn!(variable, i, j, "no derivation recorded for variable");
        return ParseTree::leaf(format!("ERROR:{}", variable));
    };

    match evidence {
        Evidence::Terminal(terminal) => {
            if let Some(wrapped) = symbols.wrapped_terminal(variable) {
                return ParseTree::leaf(wrapped);
            }
            let rule = Rule::Symbols(vec![Symbol::Terminal(terminal.clone())]);
            wrap_units(variable, &rule, vec![ParseTree::leaf(terminal.as_str())], symbols)
        }
        Evidence::Split { k, left, right } => {
            let mut children = Vec::new();
            attach(&mut children, reconstruct(table, i, *k, left, symbols), symbols);
            attach(&mut children, reconstruct(table, k + 1, j, right, symbols), symbols);

            let rule = Rule::Symbols(vec![
                Symbol::Variable(left.clone()),
                Symbol::Variable(right.clone()),
            ]);
            wrap_units(variable, &rule, children, symbols)
        }
    }
}

// Flattens synthetic variables out of any tree: chain variables are spliced
// into their parent and wrapper nodes collapse into their terminal.
// Applying it twice changes nothing.
pub fn simplify(tree: &ParseTree, symbols: &SymbolTable) -> ParseTree {
    let mut children = Vec::with_capacity(tree.children.len());

    for child in tree.children.iter().map(|child| simplify(child, symbols)) {
        if child.children.len() == 1 && symbols.wrapped_terminal(&child.name).is_some() {
            children.extend(child.children);
        } else {
            attach(&mut children, child, symbols);
        }
    }

    ParseTree::node(tree.name.as_str(), children)
}
