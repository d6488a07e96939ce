// Bounded depth-first search over goals.
//
// The machine keeps three things per branch: the substitution (shared, with
// an undo trail), an agenda of pending goals, and a list of deferred
// projections. The agenda and the deferred list are persistent cons lists,
// so a choice point snapshots them in O(1).
//
// Evaluation rules:
// - Equal: unify or fail the branch.
// - All: push the sub-goals so they run left to right.
// - Any: take the first alternative now, push a choice point holding the
//   rest. With a shuffling RNG the alternatives are permuted first.
// - Project: if every projected variable is bound, run the closure and push
//   its goal; otherwise park the projection on the deferred list.
//
// When the agenda drains, parked projections are re-queued. If nothing was
// bound since the previous re-queue the branch is stuck and fails. When the
// agenda drains with nothing parked, the query variables are reified into an
// `Assignment`.
//
// Failure is never an error: it pops the newest choice point, truncates the
// trail to that point's mark and resumes with the next alternative.

use crate::goal::{Goal, GoalKind};
use crate::subst::Substitution;
use crate::term::{Store, Term, Var};
use canonic_prng::CanonRng;
use std::rc::Rc;

/// Persistent stack of goals.
#[derive(Clone, Default)]
struct Agenda(Option<Rc<Node>>);

struct Node {
    goal: Goal,
    next: Agenda,
}

impl Agenda {
    fn push(&self, goal: Goal) -> Agenda {
        Agenda(Some(Rc::new(Node {
            goal,
            next: self.clone(),
        })))
    }

    fn pop(&self) -> Option<(Goal, Agenda)> {
        self.0
            .as_ref()
            .map(|node| (node.goal.clone(), node.next.clone()))
    }

    fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Everything about a branch except the substitution.
#[derive(Clone, Default)]
struct Frame {
    agenda: Agenda,
    deferred: Agenda,
    /// Trail length when the deferred list was last re-queued.
    requeued_at: Option<usize>,
}

struct ChoicePoint {
    mark: usize,
    frame: Frame,
    /// Untried alternatives, next one last.
    alternatives: Vec<Goal>,
}

/// Values of the query variables for one solution, in query order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment(Vec<Term>);

impl Assignment {
    pub fn values(&self) -> &[Term] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Term> {
        self.0.get(index)
    }

    /// The value at `index` if it is an integer.
    pub fn int(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Term::as_int)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_values(self) -> Vec<Term> {
        self.0
    }
}

/// Result of a search run.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Solutions in discovery order, at most the requested bound.
    pub solutions: Vec<Assignment>,
    /// Goals evaluated, counting agenda drains.
    pub steps: u64,
    /// True if the step budget stopped the search early.
    pub budget_exhausted: bool,
}

/// Builder for a bounded search.
pub struct Search<'r> {
    vars: usize,
    bound: usize,
    max_steps: Option<u64>,
    rng: Option<&'r mut CanonRng>,
}

impl<'r> Search<'r> {
    /// A search over the variables allocated from `store`, returning at most
    /// one solution, with no step budget and no shuffling.
    pub fn new(store: &Store) -> Self {
        Search {
            vars: store.len(),
            bound: 1,
            max_steps: None,
            rng: None,
        }
    }

    /// Maximum number of solutions to collect.
    pub fn bound(mut self, bound: usize) -> Self {
        self.bound = bound;
        self
    }

    /// Stop after evaluating this many goals, keeping what was found.
    pub fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Explore the alternatives of every disjunction in a random order.
    pub fn shuffled(mut self, rng: &'r mut CanonRng) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn run(mut self, query: &[Var], goal: &Goal) -> Outcome {
        let mut subst = Substitution::new(self.vars);
        let mut stack: Vec<ChoicePoint> = Vec::new();
        let mut solutions = Vec::new();
        let mut steps: u64 = 0;
        let mut budget_exhausted = false;
        let mut frame = Frame {
            agenda: Agenda::default().push(goal.clone()),
            ..Frame::default()
        };

        if self.bound == 0 {
            return Outcome {
                solutions,
                steps,
                budget_exhausted,
            };
        }

        loop {
            steps += 1;
            if self.max_steps.is_some_and(|max| steps > max) {
                budget_exhausted = true;
                break;
            }

            let alive = match frame.agenda.pop() {
                Some((goal, rest)) => {
                    frame.agenda = rest;
                    self.step(&goal, &mut frame, &mut subst, &mut stack)
                }
                None if !frame.deferred.is_empty() => requeue(&mut frame, subst.len()),
                None => {
                    solutions.push(Assignment(
                        query.iter().map(|v| subst.reify(&Term::Var(*v))).collect(),
                    ));
                    if solutions.len() >= self.bound {
                        break;
                    }
                    false
                }
            };

            if !alive {
                match backtrack(&mut stack, &mut subst) {
                    Some(next) => frame = next,
                    None => break,
                }
            }
        }

        log::debug!(
            "search: {} solution(s) in {} steps{}",
            solutions.len(),
            steps,
            if budget_exhausted { " (budget exhausted)" } else { "" }
        );
        Outcome {
            solutions,
            steps,
            budget_exhausted,
        }
    }

    /// Evaluate one goal. Returns false if the branch failed.
    fn step(
        &mut self,
        goal: &Goal,
        frame: &mut Frame,
        subst: &mut Substitution,
        stack: &mut Vec<ChoicePoint>,
    ) -> bool {
        match goal.kind() {
            GoalKind::Succeed => true,
            GoalKind::Fail => false,
            GoalKind::Equal(a, b) => subst.unify(a, b),
            GoalKind::All(goals) => {
                for g in goals.iter().rev() {
                    frame.agenda = frame.agenda.push(g.clone());
                }
                true
            }
            GoalKind::Any(goals) => {
                let mut alternatives = goals.clone();
                if let Some(rng) = self.rng.as_deref_mut() {
                    rng.shuffle(&mut alternatives);
                }
                alternatives.reverse();
                let Some(first) = alternatives.pop() else {
                    return false;
                };
                if !alternatives.is_empty() {
                    stack.push(ChoicePoint {
                        mark: subst.len(),
                        frame: frame.clone(),
                        alternatives,
                    });
                }
                frame.agenda = frame.agenda.push(first);
                true
            }
            GoalKind::Project(vars, f) => {
                if vars.iter().all(|v| subst.is_bound(*v)) {
                    let values: Vec<Term> =
                        vars.iter().map(|v| subst.reify(&Term::Var(*v))).collect();
                    frame.agenda = frame.agenda.push(f(&values));
                } else {
                    frame.deferred = frame.deferred.push(goal.clone());
                }
                true
            }
        }
    }
}

/// Move parked projections back onto the agenda, oldest first. Fails if no
/// binding happened since the last re-queue.
fn requeue(frame: &mut Frame, trail_len: usize) -> bool {
    if frame.requeued_at == Some(trail_len) {
        return false;
    }
    let mut parked = std::mem::take(&mut frame.deferred);
    while let Some((goal, rest)) = parked.pop() {
        frame.agenda = frame.agenda.push(goal);
        parked = rest;
    }
    frame.requeued_at = Some(trail_len);
    true
}

/// Resume from the newest choice point, or `None` if the tree is exhausted.
fn backtrack(stack: &mut Vec<ChoicePoint>, subst: &mut Substitution) -> Option<Frame> {
    let point = stack.last_mut()?;
    subst.undo_to(point.mark);
    let goal = point.alternatives.pop()?;
    let mut frame = point.frame.clone();
    if point.alternatives.is_empty() {
        stack.pop();
    }
    frame.agenda = frame.agenda.push(goal);
    Some(frame)
}

/// Deterministic, unbudgeted search for up to `bound` solutions.
pub fn run(store: &Store, bound: usize, query: &[Var], goal: &Goal) -> Vec<Assignment> {
    Search::new(store).bound(bound).run(query, goal).solutions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{conjoin, disjoin, equals, fail, project, project_all, succeed};

    fn ints(solutions: &[Assignment], index: usize) -> Vec<i64> {
        solutions.iter().filter_map(|s| s.int(index)).collect()
    }

    #[test]
    fn equals_self_succeeds_unbound() {
        let mut store = Store::new();
        let x = store.fresh();
        let out = run(&store, 1, &[x], &equals(x, x));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(0), Some(&Term::Var(x)));
    }

    #[test]
    fn chained_equalities_unify_ends() {
        let mut store = Store::new();
        let (a, b, c) = (store.fresh(), store.fresh(), store.fresh());
        let goal = conjoin([equals(a, b), equals(b, c), equals(c, 9i64)]);
        let out = run(&store, 1, &[a], &goal);
        assert_eq!(ints(&out, 0), vec![9]);
    }

    #[test]
    fn disjunction_enumerates_in_order() {
        let mut store = Store::new();
        let x = store.fresh();
        let goal = disjoin((1..=3i64).map(|i| equals(x, i)));
        assert_eq!(ints(&run(&store, 10, &[x], &goal), 0), vec![1, 2, 3]);
    }

    #[test]
    fn bound_caps_solutions() {
        let mut store = Store::new();
        let x = store.fresh();
        let goal = disjoin((1..=5i64).map(|i| equals(x, i)));
        assert_eq!(run(&store, 2, &[x], &goal).len(), 2);
        assert!(run(&store, 0, &[x], &goal).is_empty());
    }

    #[test]
    fn conjunction_threads_substitution() {
        let mut store = Store::new();
        let x = store.fresh();
        let goal = conjoin([disjoin((1..=3i64).map(|i| equals(x, i))), equals(x, 2i64)]);
        assert_eq!(ints(&run(&store, 10, &[x], &goal), 0), vec![2]);
    }

    #[test]
    fn failed_list_unification_is_undone() {
        let mut store = Store::new();
        let x = store.fresh();
        let goal = disjoin([
            equals(Term::List(vec![x.into(), Term::Int(1)]), Term::list([2i64, 3])),
            equals(x, 4i64),
        ]);
        assert_eq!(ints(&run(&store, 10, &[x], &goal), 0), vec![4]);
    }

    #[test]
    fn fail_and_succeed() {
        let mut store = Store::new();
        let x = store.fresh();
        assert!(run(&store, 1, &[x], &fail()).is_empty());
        assert_eq!(run(&store, 1, &[x], &succeed()).len(), 1);
    }

    #[test]
    fn project_sees_bound_value() {
        let mut store = Store::new();
        let (x, y) = (store.fresh(), store.fresh());
        let goal = conjoin([
            equals(x, 5i64),
            project(x, move |v| match v.as_int() {
                Some(i) => equals(y, i + 1),
                None => fail(),
            }),
        ]);
        let out = run(&store, 1, &[y], &goal);
        assert_eq!(ints(&out, 0), vec![6]);
    }

    #[test]
    fn project_is_deferred_until_bound() {
        let mut store = Store::new();
        let (x, y) = (store.fresh(), store.fresh());
        let goal = conjoin([
            project(x, move |v| equals(y, v.as_int().unwrap_or(0) * 2)),
            equals(x, 21i64),
        ]);
        assert_eq!(ints(&run(&store, 1, &[y], &goal), 0), vec![42]);
    }

    #[test]
    fn project_on_never_bound_var_fails() {
        let mut store = Store::new();
        let x = store.fresh();
        let goal = project(x, |_| succeed());
        assert!(run(&store, 1, &[x], &goal).is_empty());
    }

    #[test]
    fn project_computes_alternatives() {
        let mut store = Store::new();
        let (x, y) = (store.fresh(), store.fresh());
        let goal = conjoin([
            disjoin((1..=5i64).map(|i| equals(x, i))),
            project(x, move |v| {
                let lo = v.as_int().unwrap_or(0);
                disjoin((lo + 1..=5).map(|i| equals(y, i)))
            }),
        ]);
        let out = run(&store, 100, &[x, y], &goal);
        // Pairs (x, y) with x < y <= 5.
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|s| s.int(0) < s.int(1)));
    }

    #[test]
    fn project_all_sees_every_value() {
        let mut store = Store::new();
        let (a, b, sum) = (store.fresh(), store.fresh(), store.fresh());
        let goal = conjoin([
            equals(a, 2i64),
            equals(b, 3i64),
            project_all(vec![a, b], move |vals| {
                let total: i64 = vals.iter().filter_map(Term::as_int).sum();
                equals(sum, total)
            }),
        ]);
        assert_eq!(ints(&run(&store, 1, &[sum], &goal), 0), vec![5]);
    }

    #[test]
    fn step_budget_stops_search() {
        let mut store = Store::new();
        let vars = store.fresh_n(10);
        let mut goals: Vec<Goal> = vars
            .iter()
            .map(|&v| disjoin((0..10i64).map(move |i| equals(v, i))))
            .collect();
        goals.push(fail());
        let outcome = Search::new(&store)
            .bound(1)
            .max_steps(1_000)
            .run(&vars, &conjoin(goals));
        assert!(outcome.budget_exhausted);
        assert!(outcome.solutions.is_empty());
    }

    #[test]
    fn shuffled_search_is_seeded_and_complete() {
        let mut store = Store::new();
        let x = store.fresh();
        let goal = disjoin((0..20i64).map(|i| equals(x, i)));

        let mut rng_a = CanonRng::new(5);
        let mut rng_b = CanonRng::new(5);
        let a = Search::new(&store).bound(50).shuffled(&mut rng_a).run(&[x], &goal);
        let b = Search::new(&store).bound(50).shuffled(&mut rng_b).run(&[x], &goal);
        assert_eq!(a.solutions, b.solutions);

        let mut found = ints(&a.solutions, 0);
        assert_ne!(found, (0..20).collect::<Vec<_>>(), "order should be permuted");
        found.sort_unstable();
        assert_eq!(found, (0..20).collect::<Vec<_>>());
    }
}
