// Canonic relational engine.
//
// A small logic-programming runtime in the miniKanren tradition: logic
// variables allocated from a `Store`, terms that unify structurally, and
// goals combined by conjunction, disjunction and value projection. Search is
// depth-first over an explicit choice-point stack, bounded both by the number
// of solutions requested and by a step budget.
//
// Architecture:
// - term.rs: `Var` handles and the `Term` tree (ints, rationals, lists)
// - subst.rs: the substitution arena with an undo trail (walk/unify/reify)
// - goal.rs: the `Goal` combinators (equals, conjoin, disjoin, project)
// - search.rs: the backtracking machine and the `Search` builder
//
// The engine knows nothing about music. The canon solvers in canonic_music
// build goals over pitch and duration terms and hand them to `Search`.

pub mod goal;
pub mod search;
pub mod subst;
pub mod term;

pub use goal::{Goal, conjoin, disjoin, equals, fail, project, project_all, succeed};
pub use search::{Assignment, Outcome, Search, run};
pub use subst::Substitution;
pub use term::{Store, Term, Var};
