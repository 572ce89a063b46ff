use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};

use derive_getters::Getters;
use itertools::Itertools;
use log::trace;
use regex_nfa_util::{Operator, EPSILON};

use crate::error::InternalError;
use crate::regex::{Postfix, TokenKind};

pub type StateId = usize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Epsilon,
    Symbol(char),
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Epsilon => write!(f, "{EPSILON}"),
            Label::Symbol(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    pub from: StateId,
    pub label: Label,
    pub to: StateId,
}

impl Transition {
    pub const fn new(from: StateId, label: Label, to: StateId) -> Self {
        Self { from, label, to }
    }

    pub const fn epsilon(from: StateId, to: StateId) -> Self {
        Self::new(from, Label::Epsilon, to)
    }

    fn map(self, mut f: impl FnMut(StateId) -> StateId) -> Self {
        Self::new(f(self.from), self.label, f(self.to))
    }
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -{}-> {}", self.from, self.label, self.to)
    }
}

/// A nondeterministic finite automaton.
///
/// `states` keeps the order in which states were introduced; the
/// canonicalizer relies on it to number the inner states.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Automaton {
    states: Vec<StateId>,
    /// Input symbols. Epsilon is never part of the alphabet.
    alphabet: BTreeSet<char>,
    transitions: Vec<Transition>,
    initial: StateId,
    finals: Vec<StateId>,
}

impl Automaton {
    /// Assembles an automaton without checking it, see [`Automaton::check_well_formed`].
    pub fn from_parts(
        states: Vec<StateId>,
        alphabet: impl IntoIterator<Item = char>,
        transitions: Vec<Transition>,
        initial: StateId,
        finals: Vec<StateId>,
    ) -> Self {
        Self {
            states,
            alphabet: alphabet.into_iter().collect(),
            transitions,
            initial,
            finals,
        }
    }

    pub fn has_epsilon_moves(&self) -> bool {
        self.transitions.iter().any(|t| t.label == Label::Epsilon)
    }

    /// Every state is declared once, every referenced state is declared, and
    /// there is at least one final state.
    pub fn check_well_formed(&self) -> Result<(), InternalError> {
        let mut declared = HashSet::with_capacity(self.states.len());
        for &state in &self.states {
            if !declared.insert(state) {
                return Err(InternalError::DuplicateState(state));
            }
        }

        if self.finals.is_empty() {
            return Err(InternalError::NoFinalState);
        }
        let mut finals = HashSet::with_capacity(self.finals.len());
        for &state in &self.finals {
            if !finals.insert(state) {
                return Err(InternalError::DuplicateState(state));
            }
        }

        let referenced = self
            .transitions
            .iter()
            .flat_map(|t| [t.from, t.to])
            .chain(self.finals.iter().copied())
            .chain([self.initial]);
        for state in referenced {
            if !declared.contains(&state) {
                return Err(InternalError::DanglingState(state));
            }
        }
        Ok(())
    }

    /// Rewrites every state through `mapping`. States missing from the
    /// mapping are reported as dangling.
    fn try_map_states(
        &self,
        mapping: &HashMap<StateId, StateId>,
    ) -> Result<Automaton, InternalError> {
        let lookup = |state: StateId| {
            mapping
                .get(&state)
                .copied()
                .ok_or(InternalError::DanglingState(state))
        };

        let states = self
            .states
            .iter()
            .map(|&s| lookup(s))
            .collect::<Result<Vec<_>, _>>()?;
        let finals = self
            .finals
            .iter()
            .map(|&s| lookup(s))
            .collect::<Result<Vec<_>, _>>()?;
        let transitions = self
            .transitions
            .iter()
            .map(|t| -> Result<Transition, InternalError> {
                Ok(Transition::new(lookup(t.from)?, t.label, lookup(t.to)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Automaton {
            states,
            alphabet: self.alphabet.clone(),
            transitions,
            initial: lookup(self.initial)?,
            finals,
        })
    }

    /// Structural copy whose states are numbered `start, start + 1, ...` in
    /// state-list order.
    pub fn relabel(&self, start: StateId) -> Result<Automaton, InternalError> {
        let mapping = self
            .states
            .iter()
            .enumerate()
            .map(|(i, &state)| (state, start + i))
            .collect();
        self.try_map_states(&mapping)
    }

    /// Renumbers states so the initial state is 0 and the final states hold
    /// the highest ids, ascending in the order they are listed. Remaining
    /// states fill the ids in between in state-list order.
    ///
    /// An initial state that is also final keeps id 0.
    pub fn canonicalize(&self) -> Result<Automaton, InternalError> {
        self.check_well_formed()?;

        let finals = self
            .finals
            .iter()
            .copied()
            .filter(|&s| s != self.initial)
            .collect_vec();
        let inner = self
            .states
            .iter()
            .copied()
            .filter(|&s| s != self.initial && !finals.contains(&s));

        let mut mapping = HashMap::with_capacity(self.states.len());
        mapping.insert(self.initial, 0);
        for (i, state) in inner.chain(finals.iter().copied()).enumerate() {
            mapping.insert(state, i + 1);
        }

        let mut canonical = self.try_map_states(&mapping)?;
        canonical.states.sort_unstable();
        debug_assert_eq!(canonical.states.len(), self.states.len());
        Ok(canonical)
    }

    fn epsilon_closure(&self, mut closure: BTreeSet<StateId>) -> BTreeSet<StateId> {
        let mut pending = closure.iter().copied().collect_vec();
        while let Some(state) = pending.pop() {
            for t in &self.transitions {
                if t.from == state && t.label == Label::Epsilon && closure.insert(t.to) {
                    pending.push(t.to);
                }
            }
        }
        closure
    }

    /// Runs the automaton over `input`, following epsilon moves between symbols.
    pub fn accepts(&self, input: &str) -> bool {
        let mut current = self.epsilon_closure(BTreeSet::from([self.initial]));
        for c in input.chars() {
            if current.is_empty() {
                return false;
            }
            let next = self
                .transitions
                .iter()
                .filter(|t| t.label == Label::Symbol(c) && current.contains(&t.from))
                .map(|t| t.to)
                .collect();
            current = self.epsilon_closure(next);
        }
        self.finals.iter().any(|f| current.contains(f))
    }

    /// Is some final state reachable from the initial state, ignoring labels?
    pub fn has_accepting_path(&self) -> bool {
        let mut seen = HashSet::from([self.initial]);
        let mut pending = vec![self.initial];
        while let Some(state) = pending.pop() {
            if self.finals.contains(&state) {
                return true;
            }
            for t in self.transitions.iter().filter(|t| t.from == state) {
                if seen.insert(t.to) {
                    pending.push(t.to);
                }
            }
        }
        false
    }
}

impl Display for Automaton {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "states: {}", self.states.iter().join(" "))?;
        writeln!(f, "alphabet: {}", self.alphabet.iter().join(" "))?;
        writeln!(f, "initial: {}", self.initial)?;
        writeln!(f, "finals: {}", self.finals.iter().join(" "))?;
        for t in &self.transitions {
            writeln!(f, "{t}")?;
        }
        Ok(())
    }
}

/// Thompson's construction over a postfix sequence.
///
/// Owns the state counter and the stack of finished fragments. [`Builder::build`]
/// consumes the builder, so ids are never shared between two compilations.
#[derive(Debug, Default)]
pub struct Builder {
    next_state: StateId,
    stack: Vec<Automaton>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `count` consecutive ids above everything handed out so far.
    fn allocate(&mut self, count: usize) -> StateId {
        let first = self.next_state;
        self.next_state += count;
        first
    }

    fn fragment(&mut self, label: Label) -> Automaton {
        let initial = self.allocate(2);
        let last = initial + 1;
        let alphabet = match label {
            Label::Symbol(c) => BTreeSet::from([c]),
            Label::Epsilon => BTreeSet::new(),
        };
        Automaton {
            states: vec![initial, last],
            alphabet,
            transitions: vec![Transition::new(initial, label, last)],
            initial,
            finals: vec![last],
        }
    }

    pub fn operand(&mut self, symbol: char) -> Automaton {
        self.fragment(Label::Symbol(symbol))
    }

    /// Glues `right` after `left`. The final states of `left` are merged into
    /// the initial state of `right` and their ids are retired, so `left` must
    /// not accept the empty string through its initial state.
    pub fn concatenation(left: Automaton, right: Automaton) -> Result<Automaton, InternalError> {
        if left.finals.contains(&left.initial) {
            return Err(InternalError::DanglingState(left.initial));
        }
        let merge = |state: StateId| {
            if left.finals.contains(&state) {
                right.initial
            } else {
                state
            }
        };

        let states = left
            .states
            .iter()
            .copied()
            .filter(|s| !left.finals.contains(s))
            .chain(right.states.iter().copied())
            .collect();
        let transitions = left
            .transitions
            .iter()
            .map(|t| t.map(merge))
            .chain(right.transitions.iter().copied())
            .collect();
        let alphabet = left.alphabet.union(&right.alphabet).copied().collect();

        Ok(Automaton {
            states,
            alphabet,
            transitions,
            initial: left.initial,
            finals: right.finals,
        })
    }

    pub fn union(&mut self, left: Automaton, right: Automaton) -> Automaton {
        let initial = self.allocate(2);
        let last = initial + 1;

        let mut transitions = left.transitions;
        transitions.extend(right.transitions);
        transitions.push(Transition::epsilon(initial, left.initial));
        transitions.push(Transition::epsilon(initial, right.initial));
        transitions.extend(
            left.finals
                .iter()
                .chain(&right.finals)
                .map(|&f| Transition::epsilon(f, last)),
        );

        let mut states = left.states;
        states.extend(right.states);
        states.extend([initial, last]);

        let mut alphabet = left.alphabet;
        alphabet.extend(right.alphabet);

        Automaton {
            states,
            alphabet,
            transitions,
            initial,
            finals: vec![last],
        }
    }

    pub fn kleene_star(&mut self, inner: Automaton) -> Automaton {
        let initial = self.allocate(2);
        let last = initial + 1;

        let mut transitions = inner.transitions;
        transitions.push(Transition::epsilon(initial, inner.initial));
        transitions.extend(inner.finals.iter().map(|&f| Transition::epsilon(f, inner.initial)));
        transitions.extend(inner.finals.iter().map(|&f| Transition::epsilon(f, last)));
        transitions.push(Transition::epsilon(initial, last));

        let mut states = inner.states;
        states.extend([initial, last]);

        Automaton {
            states,
            alphabet: inner.alphabet,
            transitions,
            initial,
            finals: vec![last],
        }
    }

    /// `inner` or nothing: a union with a fragment that only moves on epsilon.
    pub fn optional(&mut self, inner: Automaton) -> Automaton {
        let empty = self.fragment(Label::Epsilon);
        self.union(inner, empty)
    }

    /// One copy of `inner` on fresh ids followed by the star of `inner`.
    pub fn positive_closure(&mut self, inner: Automaton) -> Result<Automaton, InternalError> {
        let start = self.allocate(inner.states.len());
        let once = inner.relabel(start)?;
        let more = self.kleene_star(inner);
        Self::concatenation(once, more)
    }

    fn pop_operand(
        &mut self,
        operator: Operator,
        position: usize,
    ) -> Result<Automaton, InternalError> {
        let found = self.stack.len();
        self.stack.pop().ok_or(InternalError::MissingOperands {
            operator: operator.symbol(),
            position,
            needed: operator.arity(),
            found,
        })
    }

    fn apply(&mut self, operator: Operator, position: usize) -> Result<Automaton, InternalError> {
        let found = self.stack.len();
        if found < operator.arity() {
            return Err(InternalError::MissingOperands {
                operator: operator.symbol(),
                position,
                needed: operator.arity(),
                found,
            });
        }

        let automaton = match operator {
            Operator::Union => {
                let right = self.pop_operand(operator, position)?;
                let left = self.pop_operand(operator, position)?;
                self.union(left, right)
            }
            Operator::Concat => {
                let right = self.pop_operand(operator, position)?;
                let left = self.pop_operand(operator, position)?;
                Self::concatenation(left, right)?
            }
            Operator::Star => {
                let inner = self.pop_operand(operator, position)?;
                self.kleene_star(inner)
            }
            Operator::Optional => {
                let inner = self.pop_operand(operator, position)?;
                self.optional(inner)
            }
            Operator::Plus => {
                let inner = self.pop_operand(operator, position)?;
                self.positive_closure(inner)?
            }
        };
        Ok(automaton)
    }

    pub fn build(mut self, postfix: &Postfix) -> Result<Automaton, InternalError> {
        for token in postfix.tokens() {
            let automaton = match *token.kind() {
                TokenKind::Operand(c) => self.operand(c),
                TokenKind::Operator(op) => self.apply(op, *token.position())?,
                kind @ (TokenKind::GroupOpen | TokenKind::GroupClose) => {
                    return Err(InternalError::UnexpectedToken {
                        symbol: kind.symbol(),
                        position: *token.position(),
                    });
                }
            };
            trace!(
                "`{}` at {}: {} states, {} transitions, next id {}",
                token,
                token.position(),
                automaton.states.len(),
                automaton.transitions.len(),
                self.next_state
            );
            self.stack.push(automaton);
        }

        let automaton = match (self.stack.pop(), self.stack.len()) {
            (Some(automaton), 0) => automaton,
            (last, rest) => {
                return Err(InternalError::UnreducedStack(rest + usize::from(last.is_some())))
            }
        };
        automaton.check_well_formed()?;
        Ok(automaton)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::{normalize, shunting_yard, tokenize};

    fn eps(from: StateId, to: StateId) -> Transition {
        Transition::epsilon(from, to)
    }

    fn sym(from: StateId, c: char, to: StateId) -> Transition {
        Transition::new(from, Label::Symbol(c), to)
    }

    fn build(expression: &str) -> Result<Automaton, InternalError> {
        Builder::new().build(&shunting_yard(&normalize(&tokenize(expression))))
    }

    #[test]
    fn operand_fragment() {
        let a = Builder::new().operand('a');
        assert_eq!(a.states(), &vec![0, 1]);
        assert_eq!(a.transitions(), &vec![sym(0, 'a', 1)]);
        assert_eq!(*a.initial(), 0);
        assert_eq!(a.finals(), &vec![1]);
        assert_eq!(a.alphabet(), &BTreeSet::from(['a']));
        assert!(!a.has_epsilon_moves());
    }

    #[test]
    fn concatenation_retires_left_final() {
        let mut builder = Builder::new();
        let a = builder.operand('a');
        let b = builder.operand('b');
        let ab = Builder::concatenation(a, b).unwrap();

        assert_eq!(ab.states(), &vec![0, 2, 3]);
        assert_eq!(ab.transitions(), &vec![sym(0, 'a', 2), sym(2, 'b', 3)]);
        assert_eq!(*ab.initial(), 0);
        assert_eq!(ab.finals(), &vec![3]);
        ab.check_well_formed().unwrap();
    }

    #[test]
    fn concatenation_refuses_initial_final_on_the_left() {
        let nullable =
            Automaton::from_parts(vec![4, 5], ['a'], vec![sym(4, 'a', 5)], 4, vec![4, 5]);
        let mut builder = Builder::new();
        let b = builder.operand('b');

        assert_eq!(
            Builder::concatenation(nullable, b),
            Err(InternalError::DanglingState(4))
        );
    }

    #[test]
    fn union_adds_glue_states() {
        let mut builder = Builder::new();
        let a = builder.operand('a');
        let b = builder.operand('b');
        let ab = builder.union(a, b);

        assert_eq!(ab.states(), &vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(*ab.initial(), 4);
        assert_eq!(ab.finals(), &vec![5]);
        assert!(ab.transitions().contains(&eps(4, 0)));
        assert!(ab.transitions().contains(&eps(4, 2)));
        assert!(ab.transitions().contains(&eps(1, 5)));
        assert!(ab.transitions().contains(&eps(3, 5)));
        assert!(ab.accepts("a"));
        assert!(ab.accepts("b"));
        assert!(!ab.accepts("ab"));
        assert!(!ab.accepts(""));
    }

    #[test]
    fn kleene_star_transitions() {
        let mut builder = Builder::new();
        let a = builder.operand('a');
        let star = builder.kleene_star(a);

        assert_eq!(
            star.transitions(),
            &vec![sym(0, 'a', 1), eps(2, 0), eps(1, 0), eps(1, 3), eps(2, 3)]
        );
        assert_eq!(*star.initial(), 2);
        assert_eq!(star.finals(), &vec![3]);
        for input in ["", "a", "aaaa"] {
            assert!(star.accepts(input), "{input:?}");
        }
        assert!(!star.accepts("b"));
    }

    #[test]
    fn optional_accepts_zero_or_one() {
        let mut builder = Builder::new();
        let a = builder.operand('a');
        let maybe = builder.optional(a);

        assert_eq!(maybe.states().len(), 6);
        assert!(maybe.has_epsilon_moves());
        assert!(maybe.alphabet().iter().eq(['a'].iter()));
        assert!(maybe.accepts(""));
        assert!(maybe.accepts("a"));
        assert!(!maybe.accepts("aa"));
    }

    #[test]
    fn positive_closure_uses_fresh_ids() {
        let mut builder = Builder::new();
        let a = builder.operand('a');
        let plus = builder.positive_closure(a).unwrap();

        plus.check_well_formed().unwrap();
        // copy of `a` on 2..=3, star glue on 4 and 5, copy's final 3 merged away
        assert_eq!(plus.states(), &vec![2, 0, 1, 4, 5]);
        assert_eq!(*plus.initial(), 2);
        assert_eq!(plus.finals(), &vec![5]);
        assert!(!plus.accepts(""));
        assert!(plus.accepts("a"));
        assert!(plus.accepts("aaa"));
        assert_eq!(builder.next_state, 6);
    }

    #[test]
    fn relabel_is_structural() {
        let a = build("a|b").unwrap();
        let moved = a.relabel(100).unwrap();

        assert_eq!(moved.states(), &(100..106).collect_vec());
        assert_eq!(*moved.initial(), 104);
        assert_eq!(moved.transitions().len(), a.transitions().len());
        for input in ["a", "b", "", "ab"] {
            assert_eq!(moved.accepts(input), a.accepts(input));
        }
    }

    #[test]
    fn canonical_numbering() {
        let nfa = Automaton::from_parts(
            vec![7, 3, 9, 5],
            ['x'],
            vec![sym(9, 'x', 3), eps(3, 7), eps(3, 5)],
            9,
            vec![7, 5],
        );
        let canonical = nfa.canonicalize().unwrap();

        assert_eq!(canonical.states(), &vec![0, 1, 2, 3]);
        assert_eq!(*canonical.initial(), 0);
        assert_eq!(canonical.finals(), &vec![2, 3]);
        assert_eq!(
            canonical.transitions(),
            &vec![sym(0, 'x', 1), eps(1, 2), eps(1, 3)]
        );
        assert_eq!(canonical.canonicalize().unwrap(), canonical);
    }

    #[test]
    fn canonical_initial_that_is_final() {
        let nfa = Automaton::from_parts(vec![4, 2], ['a'], vec![sym(4, 'a', 2)], 4, vec![4]);
        let canonical = nfa.canonicalize().unwrap();

        assert_eq!(*canonical.initial(), 0);
        assert_eq!(canonical.finals(), &vec![0]);
        assert_eq!(canonical.transitions(), &vec![sym(0, 'a', 1)]);
        assert!(canonical.accepts(""));
    }

    #[test]
    fn detects_malformed_automata() {
        let duplicate =
            Automaton::from_parts(vec![0, 1, 1], ['a'], vec![sym(0, 'a', 1)], 0, vec![1]);
        assert_eq!(duplicate.check_well_formed(), Err(InternalError::DuplicateState(1)));

        let dangling = Automaton::from_parts(vec![0, 1], ['a'], vec![sym(0, 'a', 2)], 0, vec![1]);
        assert_eq!(dangling.canonicalize(), Err(InternalError::DanglingState(2)));

        let no_final = Automaton::from_parts(vec![0, 1], ['a'], vec![sym(0, 'a', 1)], 0, vec![]);
        assert_eq!(no_final.check_well_formed(), Err(InternalError::NoFinalState));
    }

    #[test]
    fn unreduced_stack() {
        let postfix = shunting_yard(&tokenize("ab"));
        assert_eq!(
            Builder::new().build(&postfix),
            Err(InternalError::UnreducedStack(2))
        );
    }

    #[test]
    fn operator_without_operands() {
        let postfix = shunting_yard(&tokenize("|a"));
        assert_eq!(
            Builder::new().build(&postfix),
            Err(InternalError::MissingOperands {
                operator: '|',
                position: 0,
                needed: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn group_in_postfix() {
        let postfix = shunting_yard(&tokenize("(a"));
        assert_eq!(
            Builder::new().build(&postfix),
            Err(InternalError::UnexpectedToken { symbol: '(', position: 0 })
        );
    }

    #[test]
    fn display_lists_transitions() {
        let a = build("a").unwrap();
        assert_eq!(a.to_string(), "states: 0 1\nalphabet: a\ninitial: 0\nfinals: 1\n0 -a-> 1\n");
        assert_eq!(eps(3, 4).to_string(), "3 -ε-> 4");
    }
}
