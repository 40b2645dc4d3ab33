use itertools::{Itertools, PeekingNext};

use crate::grammar::EPSILON;

#[derive(PartialEq, Debug, Clone)]
pub enum Token {
    Arrow,
    Or,
    Epsilon,
    Word(String),
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && c != '|' && c != '→'
}

// Reads one whitespace delimited word. An ASCII arrow glued to its neighbours
// ("S->a") still comes out as its own token.
pub fn lex_word(line: &mut impl PeekingNext<Item = char>) -> Vec<Token> {
    let text: String = line.peeking_take_while(|&c| is_word_char(c)).collect();

    let pieces = text.split("->").map(|piece| match piece {
        "" => None,
        EPSILON => Some(Token::Epsilon),
        _ => Some(Token::Word(piece.to_string())),
    });

    Itertools::intersperse(pieces, Some(Token::Arrow))
        .flatten()
        .collect()
}

pub fn lex_line(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();

    let mut line_chars = line.chars().peekable();

    while let Some(&c) = line_chars.peek() {
        if c == '|' {
            line_chars.next();
            tokens.push(Token::Or);
        } else if c == '→' {
            line_chars.next();
            tokens.push(Token::Arrow);
        } else if c.is_whitespace() {
            line_chars.next();
        } else {
            tokens.extend(lex_word(&mut line_chars));
        }
    }

    tokens
}

// Writes tokens back as right-hand side text
pub fn render_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| match t {
            Token::Arrow => "->",
            Token::Or => "|",
            Token::Epsilon => EPSILON,
            Token::Word(word) => word.as_str(),
        })
        .join(" ")
}
