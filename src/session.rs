/*
    This module holds the grammar a caller is working with and answers
    membership and generation requests against it
*/

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::cnf::{convert, CnfGrammar};
use crate::cyk::{recognize, tokenize};
use crate::generator::{samples_from, GeneratorOptions};
use crate::grammar::{ValidatedGrammar, EPSILON};
use crate::parser::{validate_definition, GrammarDefinition};
use crate::tree::{reconstruct, simplify, ParseTree};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub success: bool,
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<ParseTree>,
}

impl Verdict {
    fn accepted(message: &str, tree: ParseTree) -> Self {
        Verdict {
            success: true,
            valid: true,
            message: message.to_string(),
            tree: Some(tree),
        }
    }

    fn rejected(message: &str) -> Self {
        Verdict {
            success: true,
            valid: false,
            message: message.to_string(),
            tree: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<CnfGrammar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generated {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub generated: Vec<String>,
}

// A validated grammar together with its normal form. Never changes once
// built.
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarContext {
    validated: ValidatedGrammar,
    cnf: CnfGrammar,
}

impl GrammarContext {
    pub fn from_validated(validated: ValidatedGrammar) -> Self {
        let cnf = convert(&validated);
        GrammarContext { validated, cnf }
    }

    pub fn define(definition: &GrammarDefinition) -> crate::parser::Result<Self> {
        validate_definition(definition).map(GrammarContext::from_validated)
    }

    pub fn validated(&self) -> &ValidatedGrammar {
        &self.validated
    }

    pub fn cnf(&self) -> &CnfGrammar {
        &self.cnf
    }

    // Decides whether `input`, split on whitespace, is in the language and
    // builds its parse tree when it is
    pub fn check(&self, input: &str) -> Verdict {
        let tokens = tokenize(input);

        if tokens.is_empty() {
            return if self.cnf.accepts_empty() {
                Verdict::accepted("ε (empty string) is derivable.", ParseTree::leaf(EPSILON))
            } else {
                Verdict::rejected("Empty string is NOT derivable.")
            };
        }

        let recognition = recognize(&self.cnf, &tokens);
        debug!(input, accepted = recognition.success, "checked string");
        if !recognition.success {
            return Verdict::rejected("String is NOT derivable.");
        }

        let symbols = self.cnf.symbols();
        let tree = reconstruct(&recognition.table, 0, tokens.len() - 1, self.cnf.start(), symbols);
        Verdict::accepted("String is derivable.", simplify(&tree, symbols))
    }

    pub fn generate<R: Rng>(
        &self,
        start: Option<&str>,
        options: GeneratorOptions,
        rng: R,
    ) -> Vec<String> {
        let start = start.unwrap_or(self.validated.start());
        samples_from(&self.validated, start, options, rng).collect()
    }
}

// The grammar currently in use, if any. A definition that fails leaves the
// previous one in place.
#[derive(Debug, Clone, Default)]
pub struct Session {
    context: Option<Arc<GrammarContext>>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn context(&self) -> Option<Arc<GrammarContext>> {
        self.context.clone()
    }

    pub fn define(&mut self, definition: &GrammarDefinition) -> Definition {
        match GrammarContext::define(definition) {
            Ok(context) => {
                info!(start = context.validated.start(), "grammar defined");
                let cnf = context.cnf.clone();
                self.context = Some(Arc::new(context));
                Definition {
                    success: true,
                    message: "Grammar successfully parsed and converted to CNF.".to_string(),
                    cnf: Some(cnf),
                }
            }
            Err(error) => {
                debug!(%error, "grammar rejected");
                Definition {
                    success: false,
                    message: format!("Grammar Error: {}", error),
                    cnf: None,
                }
            }
        }
    }

    pub fn validate(&self, input: &str) -> Verdict {
        match &self.context {
            Some(context) => context.check(input),
            None => Verdict {
                success: false,
                valid: false,
                message: "Please set a grammar first.".to_string(),
                tree: None,
            },
        }
    }

    pub fn generate<R: Rng>(&self, options: GeneratorOptions, rng: R) -> Generated {
        match &self.context {
            Some(context) => Generated {
                success: true,
                message: None,
                generated: context.generate(None, options, rng),
            },
            None => Generated {
                success: false,
                message: Some("Grammar is not set.".to_string()),
                generated: Vec::new(),
            },
        }
    }
}
