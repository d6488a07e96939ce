// The substitution arena.
//
// One slot per allocated variable, `None` while unbound. Every binding is
// recorded on a trail so the search can undo back to any earlier choice
// point by truncating the trail. Bindings never overwrite: a variable is
// bound at most once between backtracks.

use crate::term::{Term, Var};

#[derive(Debug, Clone)]
pub struct Substitution {
    bindings: Vec<Option<Term>>,
    trail: Vec<Var>,
}

impl Substitution {
    /// An empty substitution sized for `vars` variables.
    pub fn new(vars: usize) -> Self {
        Substitution {
            bindings: vec![None; vars],
            trail: Vec::new(),
        }
    }

    /// Number of bindings made so far (the trail length).
    pub fn len(&self) -> usize {
        self.trail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }

    /// Undo every binding made after the trail had length `mark`.
    pub fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(var) = self.trail.pop() {
                self.bindings[var.index()] = None;
            }
        }
    }

    fn bind(&mut self, var: Var, value: Term) {
        debug_assert!(self.bindings[var.index()].is_none());
        self.bindings[var.index()] = Some(value);
        self.trail.push(var);
    }

    /// Follow variable bindings until reaching an unbound variable or a
    /// non-variable term. Does not descend into lists.
    pub fn walk<'a>(&'a self, mut term: &'a Term) -> &'a Term {
        while let Term::Var(v) = term {
            match &self.bindings[v.index()] {
                Some(next) => term = next,
                None => break,
            }
        }
        term
    }

    /// True if `var` resolves to something other than an unbound variable.
    pub fn is_bound(&self, var: Var) -> bool {
        !matches!(self.walk(&Term::Var(var)), Term::Var(_))
    }

    /// Make two terms equal, extending the substitution. Returns false on a
    /// clash; partial bindings from a failed list unification are left for
    /// the caller to undo.
    pub fn unify(&mut self, a: &Term, b: &Term) -> bool {
        let a = self.walk(a).clone();
        let b = self.walk(b).clone();
        match (a, b) {
            (Term::Var(x), Term::Var(y)) if x == y => true,
            (Term::Var(x), other) | (other, Term::Var(x)) => {
                self.bind(x, other);
                true
            }
            (Term::List(xs), Term::List(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(&ys).all(|(x, y)| self.unify(x, y))
            }
            (x, y) => x == y,
        }
    }

    /// Resolve a term completely, replacing every bound variable at any
    /// depth with its value. Unbound variables stay as `Term::Var`.
    pub fn reify(&self, term: &Term) -> Term {
        match self.walk(term) {
            Term::List(items) => Term::List(items.iter().map(|t| self.reify(t)).collect()),
            other => other.clone(),
        }
    }
}
