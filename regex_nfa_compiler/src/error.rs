use thiserror::Error;

use crate::automata::StateId;

/// A malformed expression. Offsets count characters of the raw input,
/// whitespace included.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("empty expression")]
    Empty,
    #[error("`.` is a reserved character, error at position: {position}")]
    ReservedCharacter { position: usize },
    #[error("two or more consecutive `|`, error at position: {position}")]
    ConsecutiveUnion { position: usize },
    #[error("`{operator}` cannot start an expression, error at position: {position}")]
    LeadingOperator { operator: char, position: usize },
    #[error("`{operator}` cannot end an expression, error at position: {position}")]
    TrailingOperator { operator: char, position: usize },
    #[error("empty parentheses, error at position: {position}")]
    EmptyGroup { position: usize },
    #[error("`{operator}` cannot follow `(`, error at position: {position}")]
    OperatorAfterGroupOpen { operator: char, position: usize },
    #[error("`{operator}` is missing its right operand before `)`, error at position: {position}")]
    OperatorBeforeGroupClose { operator: char, position: usize },
    #[error("`{operator}` has no operand after `|`, error at position: {position}")]
    OperatorAfterUnion { operator: char, position: usize },
    #[error("`)` closes a parenthesis that was never opened, error at position: {position}")]
    UnmatchedGroupClose { position: usize },
    #[error("parenthesis opened at position {position} is never closed")]
    UnclosedGroup { position: usize },
}

impl SyntaxError {
    pub fn position(&self) -> usize {
        match self {
            SyntaxError::Empty => 0,
            SyntaxError::ReservedCharacter { position }
            | SyntaxError::ConsecutiveUnion { position }
            | SyntaxError::LeadingOperator { position, .. }
            | SyntaxError::TrailingOperator { position, .. }
            | SyntaxError::EmptyGroup { position }
            | SyntaxError::OperatorAfterGroupOpen { position, .. }
            | SyntaxError::OperatorBeforeGroupClose { position, .. }
            | SyntaxError::OperatorAfterUnion { position, .. }
            | SyntaxError::UnmatchedGroupClose { position }
            | SyntaxError::UnclosedGroup { position } => *position,
        }
    }
}

/// A broken invariant inside the compiler. Input that passed validation never
/// produces one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error(
        "`{operator}` at position {position} needs {needed} operand(s) \
         but the construction stack holds {found}"
    )]
    MissingOperands {
        operator: char,
        position: usize,
        needed: usize,
        found: usize,
    },
    #[error("construction stack holds {0} automata after the last token, expected exactly one")]
    UnreducedStack(usize),
    #[error("`{symbol}` at position {position} has no meaning in a postfix sequence")]
    UnexpectedToken { symbol: char, position: usize },
    #[error("state {0} is declared more than once")]
    DuplicateState(StateId),
    #[error("state {0} is referenced but never declared")]
    DanglingState(StateId),
    #[error("automaton has no final state")]
    NoFinalState,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("invalid input: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
}

impl CompileError {
    pub fn is_internal(&self) -> bool {
        matches!(self, CompileError::Internal(_))
    }
}
