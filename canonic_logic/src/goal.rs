// Goal combinators.
//
// A `Goal` is an immutable description of a constraint; the search machine
// in search.rs interprets it against a substitution. Goals are reference
// counted so that choice points can hold on to untried alternatives and the
// pending agenda without copying goal trees.
//
// `Project` is the escape hatch from pure relations: once its variables are
// bound, the closure sees their values and returns the goal to continue
// with. That is how a constraint computes its alternatives from whatever a
// neighbouring variable turned out to be.

use crate::term::{Term, Var};
use std::fmt;
use std::rc::Rc;

/// Closure type for projections: receives the reified values of the
/// projected variables, in order.
pub type Projection = dyn Fn(&[Term]) -> Goal;

pub(crate) enum GoalKind {
    Succeed,
    Fail,
    Equal(Term, Term),
    All(Vec<Goal>),
    Any(Vec<Goal>),
    Project(Vec<Var>, Rc<Projection>),
}

/// A constraint over logic variables. Cheap to clone.
#[derive(Clone)]
pub struct Goal(Rc<GoalKind>);

impl Goal {
    pub(crate) fn kind(&self) -> &GoalKind {
        &self.0
    }

    fn new(kind: GoalKind) -> Self {
        Goal(Rc::new(kind))
    }

    /// True if this goal is the trivially failing goal.
    pub fn is_fail(&self) -> bool {
        matches!(self.kind(), GoalKind::Fail)
    }
}

impl fmt::Debug for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            GoalKind::Succeed => f.write_str("succeed"),
            GoalKind::Fail => f.write_str("fail"),
            GoalKind::Equal(a, b) => write!(f, "({a} == {b})"),
            GoalKind::All(goals) => f.debug_tuple("all").field(goals).finish(),
            GoalKind::Any(goals) => f.debug_tuple("any").field(goals).finish(),
            GoalKind::Project(vars, _) => write!(f, "project({vars:?})"),
        }
    }
}

/// The goal that always succeeds without binding anything.
pub fn succeed() -> Goal {
    Goal::new(GoalKind::Succeed)
}

/// The goal that always fails.
pub fn fail() -> Goal {
    Goal::new(GoalKind::Fail)
}

/// Succeeds iff the two terms unify.
pub fn equals(a: impl Into<Term>, b: impl Into<Term>) -> Goal {
    Goal::new(GoalKind::Equal(a.into(), b.into()))
}

/// Succeeds iff every sub-goal succeeds against the same threaded
/// substitution. An empty conjunction succeeds.
pub fn conjoin(goals: impl IntoIterator<Item = Goal>) -> Goal {
    let goals: Vec<Goal> = goals.into_iter().collect();
    match goals.len() {
        0 => succeed(),
        1 => goals.into_iter().next().unwrap_or_else(succeed),
        _ => Goal::new(GoalKind::All(goals)),
    }
}

/// Succeeds once for each sub-goal that succeeds, each explored as an
/// independent branch. An empty disjunction fails.
pub fn disjoin(goals: impl IntoIterator<Item = Goal>) -> Goal {
    let goals: Vec<Goal> = goals.into_iter().collect();
    match goals.len() {
        0 => fail(),
        1 => goals.into_iter().next().unwrap_or_else(fail),
        _ => Goal::new(GoalKind::Any(goals)),
    }
}

/// Continue with `f(value)` once `var` is bound.
///
/// If `var` is still unbound when the goal is reached, the search defers it
/// and retries after the rest of the conjunction has run. A projection that
/// can never see its variable bound fails the branch.
pub fn project(var: Var, f: impl Fn(&Term) -> Goal + 'static) -> Goal {
    project_all(vec![var], move |values| f(&values[0]))
}

/// Like `project`, over several variables at once. The closure receives the
/// reified values in the same order as `vars`.
pub fn project_all(vars: Vec<Var>, f: impl Fn(&[Term]) -> Goal + 'static) -> Goal {
    if vars.is_empty() {
        return f(&[]);
    }
    Goal::new(GoalKind::Project(vars, Rc::new(f)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Store;

    #[test]
    fn empty_combinators() {
        assert!(matches!(conjoin([]).kind(), GoalKind::Succeed));
        assert!(disjoin([]).is_fail());
    }

    #[test]
    fn singleton_combinators_unwrap() {
        let mut store = Store::new();
        let v = store.fresh();
        assert!(matches!(conjoin([equals(v, 1i64)]).kind(), GoalKind::Equal(..)));
        assert!(matches!(disjoin([equals(v, 1i64)]).kind(), GoalKind::Equal(..)));
    }

    #[test]
    fn debug_rendering() {
        let mut store = Store::new();
        let v = store.fresh();
        let g = disjoin([equals(v, 60i64), equals(v, 62i64)]);
        assert_eq!(format!("{g:?}"), "any([(_0 == 60), (_0 == 62)])");
    }
}
