use std::fmt::{Display, Formatter};

use derive_getters::Getters;
use itertools::Itertools;
use nom::bytes::complete::take_while;
use nom::character::complete::anychar;
use nom::error::Error;
use nom::IResult;
use regex_nfa_util::{is_reserved, Operator, GROUP_CLOSE, GROUP_OPEN};

use crate::error::SyntaxError;

type NResult<'a, T> = IResult<&'a str, T>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Operand(char),
    Operator(Operator),
    GroupOpen,
    GroupClose,
}

impl TokenKind {
    pub fn from_char(c: char) -> TokenKind {
        match c {
            GROUP_OPEN => TokenKind::GroupOpen,
            GROUP_CLOSE => TokenKind::GroupClose,
            c => match Operator::from_char(c) {
                Some(op) => TokenKind::Operator(op),
                None => TokenKind::Operand(c),
            },
        }
    }

    pub fn symbol(self) -> char {
        match self {
            TokenKind::Operand(c) => c,
            TokenKind::Operator(op) => op.symbol(),
            TokenKind::GroupOpen => GROUP_OPEN,
            TokenKind::GroupClose => GROUP_CLOSE,
        }
    }

    /// Can the token close an operand, so that a following operand is concatenated to it?
    fn ends_operand(self) -> bool {
        match self {
            TokenKind::Operand(_) | TokenKind::GroupClose => true,
            TokenKind::Operator(op) => op.is_unary(),
            TokenKind::GroupOpen => false,
        }
    }

    fn starts_operand(self) -> bool {
        matches!(self, TokenKind::Operand(_) | TokenKind::GroupOpen)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Getters)]
pub struct Token {
    kind: TokenKind,
    /// Character offset in the raw expression.
    position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, position: usize) -> Self {
        Self { kind, position }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind.symbol())
    }
}

/// Tokens in reverse-Polish order. Built once by [`shunting_yard`], read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Postfix {
    tokens: Vec<Token>,
}

impl Postfix {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Display for Postfix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tokens.iter().join(""))
    }
}

pub(crate) fn render(tokens: &[Token]) -> String {
    tokens.iter().join("")
}

fn whitespace(input: &str) -> NResult<'_, &str> {
    take_while(char::is_whitespace)(input)
}

/// Splits an expression into tokens, dropping whitespace.
pub fn tokenize(expression: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rm = expression;
    let mut position = 0;
    loop {
        let Ok((r, skipped)) = whitespace(rm) else {
            break;
        };
        position += skipped.chars().count();

        // Fails only at end of input
        let Ok((r, c)) = anychar::<_, Error<_>>(r) else {
            break;
        };
        tokens.push(Token::new(TokenKind::from_char(c), position));
        position += 1;
        rm = r;
    }
    tokens
}

/// Checks a tokenized expression, stopping at the first problem found.
///
/// Expects tokens straight from [`tokenize`], before [`normalize`] has inserted
/// any concatenation markers.
pub fn validate(tokens: &[Token]) -> Result<(), SyntaxError> {
    if tokens.is_empty() {
        return Err(SyntaxError::Empty);
    }

    if let Some(t) = tokens.iter().find(|t| is_reserved(t.kind.symbol())) {
        return Err(SyntaxError::ReservedCharacter { position: t.position });
    }

    let mut open_groups = Vec::new();
    let mut previous = None;
    for &token in tokens {
        check_adjacent(previous, token)?;

        match token.kind {
            TokenKind::GroupOpen => open_groups.push(token.position),
            TokenKind::GroupClose => {
                if open_groups.pop().is_none() {
                    return Err(SyntaxError::UnmatchedGroupClose { position: token.position });
                }
            }
            _ => {}
        }
        previous = Some(token);
    }

    if let Some(last) = previous {
        if let TokenKind::Operator(op) = last.kind {
            if op.is_binary() {
                return Err(SyntaxError::TrailingOperator {
                    operator: op.symbol(),
                    position: last.position,
                });
            }
        }
    }

    match open_groups.last() {
        Some(&position) => Err(SyntaxError::UnclosedGroup { position }),
        None => Ok(()),
    }
}

fn check_adjacent(previous: Option<Token>, token: Token) -> Result<(), SyntaxError> {
    use TokenKind::{GroupClose, GroupOpen, Operator as Op};

    let Some(previous) = previous else {
        return match token.kind {
            Op(op) => Err(SyntaxError::LeadingOperator {
                operator: op.symbol(),
                position: token.position,
            }),
            _ => Ok(()),
        };
    };

    match (previous.kind, token.kind) {
        (Op(Operator::Union), Op(Operator::Union)) => Err(SyntaxError::ConsecutiveUnion {
            position: previous.position,
        }),
        (Op(Operator::Union), Op(op)) => Err(SyntaxError::OperatorAfterUnion {
            operator: op.symbol(),
            position: token.position,
        }),
        (GroupOpen, GroupClose) => Err(SyntaxError::EmptyGroup {
            position: previous.position,
        }),
        (GroupOpen, Op(op)) => Err(SyntaxError::OperatorAfterGroupOpen {
            operator: op.symbol(),
            position: token.position,
        }),
        (Op(op), GroupClose) if op.is_binary() => Err(SyntaxError::OperatorBeforeGroupClose {
            operator: op.symbol(),
            position: previous.position,
        }),
        _ => Ok(()),
    }
}

/// Makes implicit concatenation explicit: a marker goes between any token that
/// ends an operand (symbol, `)`, postfix operator) and one that starts an
/// operand (symbol, `(`). The marker takes the position of the token after it.
pub fn normalize(tokens: &[Token]) -> Vec<Token> {
    let Some(&first) = tokens.first() else {
        return Vec::new();
    };

    let mut normalized = Vec::with_capacity(tokens.len() * 2);
    normalized.push(first);
    for (previous, current) in tokens.iter().tuple_windows() {
        if previous.kind.ends_operand() && current.kind.starts_operand() {
            normalized.push(Token::new(
                TokenKind::Operator(Operator::Concat),
                current.position,
            ));
        }
        normalized.push(*current);
    }
    normalized
}

/// Infix to postfix. Equal precedence pops, so every binary operator is
/// left-associative. Input is assumed to be validated and normalized.
pub fn shunting_yard(tokens: &[Token]) -> Postfix {
    let mut output = Vec::with_capacity(tokens.len());
    let mut operators: Vec<Token> = Vec::new();

    for &token in tokens {
        match token.kind {
            TokenKind::Operand(_) => output.push(token),
            TokenKind::Operator(op) => {
                while let Some(&top) = operators.last() {
                    match top.kind {
                        TokenKind::Operator(top_op) if top_op.precedence() >= op.precedence() => {
                            output.push(top);
                            operators.pop();
                        }
                        _ => break,
                    }
                }
                operators.push(token);
            }
            TokenKind::GroupOpen => operators.push(token),
            TokenKind::GroupClose => {
                while let Some(top) = operators.pop() {
                    if top.kind == TokenKind::GroupOpen {
                        break;
                    }
                    output.push(top);
                }
            }
        }
    }

    while let Some(top) = operators.pop() {
        output.push(top);
    }

    Postfix { tokens: output }
}
