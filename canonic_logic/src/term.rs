// Logic variables and terms.
//
// A `Var` is an index into the substitution arena; it is `Copy`, so goal
// closures capture indices rather than references to shared cells. `Store`
// hands out fresh indices before a search starts and tells the search how
// large an arena to allocate.

use num_rational::Rational64;
use std::fmt;

/// Handle to a logic variable. Only meaningful for the `Store` that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

/// Allocator for logic variables.
#[derive(Debug, Default, Clone)]
pub struct Store {
    next: u32,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new unbound variable.
    pub fn fresh(&mut self) -> Var {
        let var = Var(self.next);
        self.next += 1;
        var
    }

    /// Allocate `n` new unbound variables.
    pub fn fresh_n(&mut self, n: usize) -> Vec<Var> {
        (0..n).map(|_| self.fresh()).collect()
    }

    /// Number of variables allocated so far.
    pub fn len(&self) -> usize {
        self.next as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }
}

/// A term the engine can unify: a variable, an atom, or a list of terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(Var),
    Int(i64),
    Ratio(Rational64),
    List(Vec<Term>),
}

impl Term {
    pub fn as_var(&self) -> Option<Var> {
        match self {
            Term::Var(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Term::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_ratio(&self) -> Option<Rational64> {
        match self {
            Term::Ratio(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(items) => Some(items),
            _ => None,
        }
    }

    /// True if the term contains no variables at any depth.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Var(_) => false,
            Term::Int(_) | Term::Ratio(_) => true,
            Term::List(items) => items.iter().all(Term::is_ground),
        }
    }

    /// Build a list term from anything convertible to terms.
    pub fn list<T: Into<Term>>(items: impl IntoIterator<Item = T>) -> Term {
        Term::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Term::Var(v)
    }
}

impl From<&Var> for Term {
    fn from(v: &Var) -> Self {
        Term::Var(*v)
    }
}

impl From<i64> for Term {
    fn from(i: i64) -> Self {
        Term::Int(i)
    }
}

impl From<u8> for Term {
    fn from(i: u8) -> Self {
        Term::Int(i64::from(i))
    }
}

impl From<Rational64> for Term {
    fn from(r: Rational64) -> Self {
        Term::Ratio(r)
    }
}

impl From<Vec<Term>> for Term {
    fn from(items: Vec<Term>) -> Self {
        Term::List(items)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{v}"),
            Term::Int(i) => write!(f, "{i}"),
            Term::Ratio(r) => write!(f, "{r}"),
            Term::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vars_are_distinct() {
        let mut store = Store::new();
        let a = store.fresh();
        let b = store.fresh();
        assert_ne!(a, b);
        assert_eq!(store.fresh_n(3).len(), 3);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn groundness() {
        let mut store = Store::new();
        let v = store.fresh();
        assert!(Term::list([1i64, 2, 3]).is_ground());
        assert!(!Term::List(vec![Term::Int(1), Term::Var(v)]).is_ground());
        assert!(Term::Ratio(Rational64::new(1, 3)).is_ground());
    }

    #[test]
    fn display_nested_list() {
        let t = Term::List(vec![Term::Int(60), Term::Ratio(Rational64::new(1, 2))]);
        assert_eq!(t.to_string(), "[60, 1/2]");
    }
}
