pub const UNION: char = '|';
pub const CONCAT: char = '.';
pub const STAR: char = '*';
pub const PLUS: char = '+';
pub const OPTIONAL: char = '?';
pub const GROUP_OPEN: char = '(';
pub const GROUP_CLOSE: char = ')';

/// Symbol used when printing epsilon transitions. Never matched against input.
pub const EPSILON: char = 'ε';

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Union,
    Concat,
    Star,
    Plus,
    Optional,
}

impl Operator {
    #[inline(always)]
    pub const fn from_char(c: char) -> Option<Operator> {
        match c {
            UNION => Some(Operator::Union),
            CONCAT => Some(Operator::Concat),
            STAR => Some(Operator::Star),
            PLUS => Some(Operator::Plus),
            OPTIONAL => Some(Operator::Optional),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn symbol(self) -> char {
        match self {
            Operator::Union => UNION,
            Operator::Concat => CONCAT,
            Operator::Star => STAR,
            Operator::Plus => PLUS,
            Operator::Optional => OPTIONAL,
        }
    }

    /// Higher binds tighter. Postfix operators > concatenation > union.
    #[inline(always)]
    pub const fn precedence(self) -> u8 {
        match self {
            Operator::Union => 1,
            Operator::Concat => 2,
            Operator::Star | Operator::Plus | Operator::Optional => 3,
        }
    }

    #[inline(always)]
    pub const fn is_unary(self) -> bool {
        matches!(self, Operator::Star | Operator::Plus | Operator::Optional)
    }

    #[inline(always)]
    pub const fn is_binary(self) -> bool {
        !self.is_unary()
    }

    #[inline(always)]
    pub const fn arity(self) -> usize {
        if self.is_unary() { 1 } else { 2 }
    }
}

/// Characters a user may not write. `.` is the internal concatenation marker.
#[inline(always)]
pub const fn is_reserved(c: char) -> bool {
    c == CONCAT
}

#[inline(always)]
pub const fn is_group(c: char) -> bool {
    c == GROUP_OPEN || c == GROUP_CLOSE
}

/// Anything that is neither an operator nor a group delimiter is a literal symbol.
#[inline(always)]
pub const fn is_operand(c: char) -> bool {
    Operator::from_char(c).is_none() && !is_group(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_order() {
        assert!(Operator::Star.precedence() > Operator::Concat.precedence());
        assert!(Operator::Concat.precedence() > Operator::Union.precedence());
        assert_eq!(Operator::Plus.precedence(), Operator::Optional.precedence());
    }

    #[test]
    fn symbols_round_trip() {
        let all = [
            Operator::Union,
            Operator::Concat,
            Operator::Star,
            Operator::Plus,
            Operator::Optional,
        ];
        for op in all {
            assert_eq!(Operator::from_char(op.symbol()), Some(op));
        }
    }

    #[test]
    fn classification() {
        assert!(is_operand('a'));
        assert!(is_operand('ε'));
        assert!(!is_operand('('));
        assert!(!is_operand('*'));
        assert!(is_reserved('.'));
        assert_eq!(Operator::Union.arity(), 2);
        assert_eq!(Operator::Optional.arity(), 1);
    }
}
