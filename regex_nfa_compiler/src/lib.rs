use derive_getters::Getters;
use log::debug;

use crate::regex::{normalize, render, shunting_yard, tokenize, validate};

pub mod automata;
pub mod error;
pub mod regex;

pub use automata::{Automaton, Builder, Label, StateId, Transition};
pub use error::{CompileError, InternalError, SyntaxError};
pub use regex::{Postfix, Token, TokenKind};

/// Output of a full compilation.
#[derive(Debug, Clone, Getters)]
pub struct Compiled {
    postfix: Postfix,
    /// Canonical form: initial state 0, final states on the highest ids.
    automaton: Automaton,
}

/// Validates an infix expression and converts it to postfix.
pub fn to_postfix(expression: &str) -> Result<Postfix, SyntaxError> {
    let tokens = tokenize(expression);
    validate(&tokens)?;

    let tokens = normalize(&tokens);
    debug!("normalized: {}", render(&tokens));

    let postfix = shunting_yard(&tokens);
    debug!("postfix: {postfix}");
    Ok(postfix)
}

/// Builds the canonical automaton for a postfix sequence.
pub fn to_automaton(postfix: &Postfix) -> Result<Automaton, InternalError> {
    let automaton = Builder::new().build(postfix)?;
    debug!(
        "built {} states, {} transitions",
        automaton.states().len(),
        automaton.transitions().len()
    );
    automaton.canonicalize()
}

pub fn compile(expression: &str) -> Result<Compiled, CompileError> {
    let postfix = to_postfix(expression)?;
    let automaton = to_automaton(&postfix)?;
    Ok(Compiled { postfix, automaton })
}
