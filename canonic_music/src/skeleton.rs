// Root-note skeleton solver (first pass).
//
// Allocates one logic variable per melody cell and builds a single
// conjunction:
//
// 1. Mirrored cells are unified with their owners, so they never branch.
// 2. Free cells follow in solving order (last to first). Each one is a
//    projection over the owners it relates to; once those are bound it
//    offers every candidate pitch that is within `max_jump` of, and
//    different from, each neighbour, and different from every owner heard
//    at the same time in another voice. An empty candidate set fails the
//    branch.
//
// Candidates are the chord tones of the cell's chord, or the scale's tonics
// for the closing cell (and, for mirrored forms, the opening cell), kept only
// where they also fit the chord under each cell that copies the owner. The
// search collects a pool of skeletons and one is picked at random.

use crate::context::Context;
use crate::error::{CanonError, SolvePass};
use crate::key::Pitch;
use crate::layout::CellLayout;
use canonic_logic::{Goal, Search, Store, Term, Var, conjoin, disjoin, equals, fail, project_all};
use canonic_prng::CanonRng;

/// Root pitch of every melody cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    beats_per_bar: usize,
    roots: Vec<Pitch>,
}

impl Skeleton {
    pub fn new(beats_per_bar: usize, roots: Vec<Pitch>) -> Self {
        Skeleton {
            beats_per_bar,
            roots,
        }
    }

    pub fn roots(&self) -> &[Pitch] {
        &self.roots
    }

    pub fn root(&self, cell: usize) -> Pitch {
        self.roots[cell]
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Roots grouped by bar.
    pub fn bars(&self) -> impl Iterator<Item = &[Pitch]> {
        self.roots.chunks(self.beats_per_bar.max(1))
    }
}

/// Narrowest pitch range, in semitones, a skeleton is searched over.
pub const MIN_RANGE: u8 = 12;

/// Run the skeleton pass and pick one solution uniformly from the pool.
///
/// A range narrower than an octave is reported unsatisfiable without
/// searching, and a layout that would put two voices on one mirrored note
/// is rejected before the goal is built.
pub fn solve(
    ctx: &Context,
    layout: &CellLayout,
    rng: &mut CanonRng,
) -> Result<Skeleton, CanonError> {
    layout.check_voices()?;
    let unsatisfiable = CanonError::Unsatisfiable {
        pass: SolvePass::Skeleton,
    };
    let span = ctx.config.high.saturating_sub(ctx.config.low);
    if span < MIN_RANGE {
        log::warn!(
            "skeleton: range {}..={} spans {span} semitones, less than an octave",
            ctx.config.low,
            ctx.config.high
        );
        return Err(unsatisfiable);
    }

    let mut store = Store::new();
    let roots = store.fresh_n(layout.len());
    let goal = skeleton_goal(ctx, layout, &roots);

    let limits = &ctx.config.search;
    let outcome = Search::new(&store)
        .bound(limits.skeleton_pool)
        .max_steps(limits.max_steps)
        .shuffled(rng)
        .run(&roots, &goal);
    if outcome.budget_exhausted {
        log::warn!(
            "skeleton search stopped after {} steps with {} solution(s)",
            outcome.steps,
            outcome.solutions.len()
        );
    }

    let chosen = rng.choose(&outcome.solutions).ok_or(unsatisfiable.clone())?;
    let pitches = chosen
        .values()
        .iter()
        .map(|t| t.as_int().and_then(|p| Pitch::try_from(p).ok()))
        .collect::<Option<Vec<Pitch>>>()
        .ok_or(unsatisfiable)?;

    log::info!(
        "skeleton: picked 1 of {} candidate(s) after {} steps",
        outcome.solutions.len(),
        outcome.steps
    );
    Ok(Skeleton::new(layout.beats_per_bar(), pitches))
}

/// The whole skeleton constraint set over `roots` (one var per cell).
pub fn skeleton_goal(ctx: &Context, layout: &CellLayout, roots: &[Var]) -> Goal {
    let mut goals: Vec<Goal> = layout
        .mirrors()
        .map(|(cell, owner)| equals(roots[cell], roots[owner]))
        .collect();
    for &cell in layout.solve_order() {
        goals.push(owner_goal(ctx, layout, roots, cell));
    }
    conjoin(goals)
}

/// Pitches `owner` may take: tonics or its chord tones, narrowed to the
/// chord tones under every cell that copies it. The first and last cells
/// are tonics whatever chord sits under them.
fn owner_candidates(ctx: &Context, layout: &CellLayout, owner: usize) -> Vec<Pitch> {
    let mut candidates = if layout.needs_tonic(owner) {
        ctx.tonics()
    } else {
        ctx.chord_pitches_at(owner)
    };
    let last = layout.len().saturating_sub(1);
    for copy in layout.copies_of(owner).filter(|&c| c != 0 && c != last) {
        let tones = ctx.chord_pitches_at(copy);
        candidates.retain(|p| tones.contains(p));
    }
    candidates
}

fn owner_goal(ctx: &Context, layout: &CellLayout, roots: &[Var], cell: usize) -> Goal {
    let candidates: Vec<i64> = owner_candidates(ctx, layout, cell)
        .into_iter()
        .map(i64::from)
        .collect();

    let near_count = layout.neighbours(cell).len();
    let reads: Vec<Var> = layout
        .neighbours(cell)
        .iter()
        .chain(layout.unavailable(cell))
        .map(|&owner| roots[owner])
        .collect();
    let max_jump = i64::from(ctx.config.max_jump);
    let root = roots[cell];

    project_all(reads, move |values| {
        let Some(values) = values.iter().map(Term::as_int).collect::<Option<Vec<i64>>>() else {
            return fail();
        };
        let (near, apart) = values.split_at(near_count.min(values.len()));
        disjoin(
            candidates
                .iter()
                .copied()
                .filter(|p| near.iter().all(|n| p != n && (p - n).abs() <= max_jump))
                .filter(|p| !apart.contains(p))
                .map(|p| equals(root, p)),
        )
    })
}
