// Melodic elaboration (second pass).
//
// Every beat of the skeleton is split into 1-4 notes. The arity is drawn
// up front from the configured probabilities; it fixes which rhythm
// patterns the beat may take (three notes can be long-short-short,
// short-short-long or a triplet, which stays a disjunction for the solver).
//
// Each cell gets a rhythm variable, a notes variable and one variable per
// note. The goal conjoins, in this order:
//
// 1. For every cell: the rhythm choice, `notes = [n0, n1, ...]`, and the
//    anchor. The first note is the root, except on the closing beat, whose
//    last note is the root.
// 2. For every cell with two or more notes, in melody order: a projection
//    that picks "walking" pitches for the remaining positions. Ordinary
//    beats walk from their root towards the next beat's root; the closing
//    beat walks from the previous beat's last note into its root.
//
// The walking projection also reads the rhythm and notes of every cell
// heard at the same time in another voice and drops any sequence that would
// sound a pitch already held there while the two notes overlap.

use crate::canon::Beat;
use crate::context::Context;
use crate::error::{CanonError, SolvePass};
use crate::key::{Pitch, Scale};
use crate::layout::CellLayout;
use crate::skeleton::Skeleton;
use canonic_logic::{Goal, Search, Store, Term, Var, conjoin, disjoin, equals, fail, project_all};
use canonic_prng::CanonRng;
use num_rational::Rational64;
use std::cmp::Ordering;

/// Scale steps a walk may overshoot either anchor by.
const OVERSHOOT: usize = 2;

struct CellVars {
    rhythm: Var,
    notes: Var,
    pitches: Vec<Var>,
}

/// Number of notes for a beat, given a uniform draw in [0, 1). The last
/// bucket takes whatever probability mass the first three leave.
pub fn choose_arity(probabilities: &[f64; 4], draw: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, p) in probabilities.iter().take(3).enumerate() {
        cumulative += p;
        if draw < cumulative {
            return i + 1;
        }
    }
    4
}

/// The rhythms a beat of `arity` notes may take. Each sums to one beat.
pub fn rhythm_patterns(arity: usize) -> Vec<Vec<Rational64>> {
    let r = Rational64::new;
    match arity {
        0 | 1 => vec![vec![r(1, 1)]],
        2 => vec![vec![r(1, 2), r(1, 2)]],
        3 => vec![
            vec![r(1, 4), r(1, 4), r(1, 2)],
            vec![r(1, 2), r(1, 4), r(1, 4)],
            vec![r(1, 3), r(1, 3), r(1, 3)],
        ],
        _ => vec![vec![r(1, 4); 4]],
    }
}

/// Pitch sequences of length `steps` that walk from `from` towards `to`.
///
/// Sequences move monotonically in the direction of travel (either way if
/// the anchors coincide) through a window extending two scale steps past
/// both anchors. When the gap is wider than the number of steps the walk
/// must make progress: indices are distinct and neither anchor is repeated.
pub fn walking_candidates(scale: &Scale, from: Pitch, to: Pitch, steps: usize) -> Vec<Vec<Pitch>> {
    let (Some(start), Some(end)) = (scale.nearest_index(from), scale.nearest_index(to)) else {
        return Vec::new();
    };
    if steps == 0 {
        return vec![Vec::new()];
    }

    let gap = start.abs_diff(end);
    let walk = Walk {
        lo: start.min(end).saturating_sub(OVERSHOOT),
        hi: (start.max(end) + OVERSHOOT).min(scale.len() - 1),
        start,
        end,
        steps,
        strict: gap > steps,
        ascending: true,
    };
    let directions: &[bool] = match end.cmp(&start) {
        Ordering::Greater => &[true],
        Ordering::Less => &[false],
        Ordering::Equal => &[true, false],
    };

    let mut found = Vec::new();
    for &ascending in directions {
        let walk = Walk { ascending, ..walk };
        walk.extend(&mut Vec::with_capacity(steps), &mut found);
    }
    found.sort_unstable();
    found.dedup();

    let pitches = scale.pitches();
    found
        .into_iter()
        .map(|seq| seq.into_iter().map(|i| pitches[i]).collect())
        .collect()
}

#[derive(Clone, Copy)]
struct Walk {
    lo: usize,
    hi: usize,
    start: usize,
    end: usize,
    steps: usize,
    strict: bool,
    ascending: bool,
}

impl Walk {
    fn extend(&self, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if prefix.len() == self.steps {
            out.push(prefix.clone());
            return;
        }
        for i in self.lo..=self.hi {
            if self.strict && (i == self.start || i == self.end) {
                continue;
            }
            let fits = match prefix.last() {
                None => true,
                Some(&prev) => match (self.ascending, self.strict) {
                    (true, true) => i > prev,
                    (true, false) => i >= prev,
                    (false, true) => i < prev,
                    (false, false) => i <= prev,
                },
            };
            if fits {
                prefix.push(i);
                self.extend(prefix, out);
                prefix.pop();
            }
        }
    }
}

/// Onset and release of each note of a rhythm, in beats.
fn spans(rhythm: &[Rational64]) -> Vec<(Rational64, Rational64)> {
    let mut at = Rational64::from_integer(0);
    rhythm
        .iter()
        .map(|&d| {
            let span = (at, at + d);
            at += d;
            span
        })
        .collect()
}

fn ratios(term: &Term) -> Option<Vec<Rational64>> {
    term.as_list()?.iter().map(Term::as_ratio).collect()
}

/// Run the elaboration pass over a solved skeleton.
pub fn elaborate(
    ctx: &Context,
    layout: &CellLayout,
    skeleton: &Skeleton,
    rng: &mut CanonRng,
) -> Result<Vec<Beat>, CanonError> {
    let arities: Vec<usize> = (0..layout.len())
        .map(|_| choose_arity(&ctx.config.probabilities, rng.next_f64()))
        .collect();

    let mut store = Store::new();
    let cells: Vec<CellVars> = arities
        .iter()
        .map(|&k| CellVars {
            rhythm: store.fresh(),
            notes: store.fresh(),
            pitches: store.fresh_n(k),
        })
        .collect();
    let goal = elaboration_goal(ctx, layout, skeleton, &cells);
    let query: Vec<Var> = cells.iter().flat_map(|c| [c.rhythm, c.notes]).collect();

    let limits = &ctx.config.search;
    let outcome = Search::new(&store)
        .bound(limits.elaboration_pool)
        .max_steps(limits.max_steps)
        .shuffled(rng)
        .run(&query, &goal);
    if outcome.budget_exhausted {
        log::warn!(
            "elaboration search stopped after {} steps with {} solution(s)",
            outcome.steps,
            outcome.solutions.len()
        );
    }

    let unsatisfiable = CanonError::Unsatisfiable {
        pass: SolvePass::Elaboration,
    };
    let chosen = rng.choose(&outcome.solutions).ok_or(unsatisfiable.clone())?;
    let values = chosen.values();
    let beats = (0..cells.len())
        .map(|cell| {
            let rhythm = ratios(&values[2 * cell])?;
            let notes = values[2 * cell + 1]
                .as_list()?
                .iter()
                .map(|t| t.as_int().and_then(|p| Pitch::try_from(p).ok()))
                .collect::<Option<Vec<Pitch>>>()?;
            Some(Beat {
                root: skeleton.root(cell),
                rhythm,
                notes,
            })
        })
        .collect::<Option<Vec<Beat>>>()
        .ok_or(unsatisfiable)?;

    log::info!(
        "elaboration: {} notes over {} beats after {} steps",
        beats.iter().map(|b| b.notes.len()).sum::<usize>(),
        beats.len(),
        outcome.steps
    );
    Ok(beats)
}

fn elaboration_goal(
    ctx: &Context,
    layout: &CellLayout,
    skeleton: &Skeleton,
    cells: &[CellVars],
) -> Goal {
    let last = cells.len().saturating_sub(1);
    let mut goals = Vec::new();

    for (index, cell) in cells.iter().enumerate() {
        let k = cell.pitches.len();
        goals.push(disjoin(
            rhythm_patterns(k)
                .into_iter()
                .map(|pattern| equals(cell.rhythm, Term::list(pattern))),
        ));
        goals.push(equals(cell.notes, Term::list(cell.pitches.iter())));
        let anchor = if index == last { k - 1 } else { 0 };
        goals.push(equals(cell.pitches[anchor], skeleton.root(index)));
    }

    for (index, cell) in cells.iter().enumerate() {
        if cell.pitches.len() >= 2 {
            goals.push(walking_goal(ctx, layout, skeleton, cells, index));
        }
    }
    conjoin(goals)
}

fn walking_goal(
    ctx: &Context,
    layout: &CellLayout,
    skeleton: &Skeleton,
    cells: &[CellVars],
    index: usize,
) -> Goal {
    let cell = &cells[index];
    let k = cell.pitches.len();
    let closing = index + 1 == cells.len() && index > 0;

    // Positions to fill, and the anchors the walk runs between. A closing
    // beat starts from the previous beat's last note, read at search time.
    let positions: Vec<usize> = if closing { (0..k - 1).collect() } else { (1..k).collect() };
    let targets = Term::list(positions.iter().map(|&p| cell.pitches[p]));
    let root = skeleton.root(index);
    let fixed_from = (!closing).then_some(root);
    let to = if closing { root } else { skeleton.root(index + 1) };

    let mut reads = vec![cell.rhythm];
    if closing {
        if let Some(&prev_last) = cells[index - 1].pitches.last() {
            reads.push(prev_last);
        }
    }
    let others = layout.simultaneous(index);
    for &other in others {
        reads.push(cells[other].rhythm);
        reads.push(cells[other].notes);
    }
    let lead = reads.len() - 2 * others.len();
    let scale = ctx.scale.clone();

    project_all(reads, move |values| {
        let Some(own) = ratios(&values[0]) else {
            return fail();
        };
        let from = match fixed_from {
            Some(p) => p,
            None => match values.get(1).and_then(Term::as_int).and_then(|p| Pitch::try_from(p).ok()) {
                Some(p) => p,
                None => return fail(),
            },
        };

        // Pitches already sounding in other voices while each position plays.
        let own_spans = spans(&own);
        let mut excluded: Vec<Vec<i64>> = vec![Vec::new(); k];
        for pair in values[lead..].chunks(2) {
            let (Some(rhythm), Some(notes)) = (ratios(&pair[0]), pair[1].as_list()) else {
                return fail();
            };
            for ((start, end), note) in spans(&rhythm).into_iter().zip(notes) {
                let Some(pitch) = note.as_int() else {
                    continue;
                };
                for (p, &(s, e)) in own_spans.iter().enumerate() {
                    if s < end && start < e {
                        excluded[p].push(pitch);
                    }
                }
            }
        }

        disjoin(
            walking_candidates(&scale, from, to, positions.len())
                .into_iter()
                .filter(|seq| {
                    seq.iter()
                        .zip(&positions)
                        .all(|(&pitch, &p)| !excluded[p].contains(&i64::from(pitch)))
                })
                .map(|seq| equals(targets.clone(), Term::list(seq))),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::key::{Key, concrete_scale};
    use crate::skeleton;
    use more_asserts::{assert_ge, assert_le};

    fn c_major() -> Scale {
        concrete_scale(&Key::c_major(), 60, 72)
    }

    #[test]
    fn arity_follows_cumulative_probabilities() {
        let p = [0.5, 0.25, 0.15, 0.1];
        assert_eq!(choose_arity(&p, 0.0), 1);
        assert_eq!(choose_arity(&p, 0.49), 1);
        assert_eq!(choose_arity(&p, 0.5), 2);
        assert_eq!(choose_arity(&p, 0.74), 2);
        assert_eq!(choose_arity(&p, 0.8), 3);
        assert_eq!(choose_arity(&p, 0.91), 4);
        assert_eq!(choose_arity(&[0.0, 0.0, 0.0, 1.0], 0.0), 4);
        assert_eq!(choose_arity(&[1.0, 0.0, 0.0, 0.0], 0.999), 1);
    }

    #[test]
    fn rhythm_patterns_fill_one_beat() {
        for arity in 1..=4 {
            for pattern in rhythm_patterns(arity) {
                assert_eq!(pattern.len(), arity);
                assert_eq!(pattern.iter().sum::<Rational64>(), Rational64::from_integer(1));
            }
        }
        assert_eq!(rhythm_patterns(3).len(), 3);
    }

    #[test]
    fn wide_gap_never_repeats_an_anchor() {
        // C to G is four steps; one passing note anywhere in the window
        // except the anchors themselves.
        assert_eq!(
            walking_candidates(&c_major(), 60, 67, 1),
            vec![vec![62], vec![64], vec![65], vec![69], vec![71]]
        );
    }

    #[test]
    fn octave_leap_has_passing_notes() {
        let walks = walking_candidates(&c_major(), 60, 72, 1);
        assert_eq!(walks.len(), 6);
        assert!(walks.iter().flatten().all(|&p| p != 60 && p != 72));
        let down = walking_candidates(&c_major(), 72, 60, 2);
        assert!(!down.is_empty());
        assert!(down.iter().all(|w| w[0] > w[1]));
    }

    #[test]
    fn descending_strict_walks() {
        let scale = c_major();
        let walks = walking_candidates(&scale, 67, 60, 3);
        // Three of D, E, F, A and B, highest first.
        assert_eq!(walks.len(), 10);
        for walk in &walks {
            assert_eq!(walk.len(), 3);
            assert!(walk.windows(2).all(|w| w[0] > w[1]), "{walk:?}");
            assert!(!walk.contains(&60) && !walk.contains(&67));
            assert_le!(scale.index_of(walk[0]).unwrap(), 6);
        }
    }

    #[test]
    fn small_gap_allows_repeats() {
        let walks = walking_candidates(&c_major(), 60, 62, 2);
        assert_eq!(walks.len(), 10);
        assert!(walks.contains(&vec![60, 60]));
        assert!(walks.iter().all(|w| w[0] <= w[1]));
    }

    #[test]
    fn equal_anchors_walk_either_way() {
        let walks = walking_candidates(&c_major(), 64, 64, 1);
        assert_eq!(walks, vec![vec![60], vec![62], vec![64], vec![65], vec![67]]);
    }

    #[test]
    fn walks_clamp_to_scale_edges() {
        let walks = walking_candidates(&c_major(), 72, 71, 1);
        assert!(walks.iter().flatten().all(|p| (60..=72).contains(p)));
        assert!(!walks.is_empty());
    }

    #[test]
    fn elaborated_beats_keep_their_anchors() {
        let config = Config::default();
        for seed in 0..4 {
            let mut rng = CanonRng::new(seed);
            let ctx = Context::new(&config, &mut rng).unwrap();
            let layout = CellLayout::for_context(&ctx);
            let skeleton = skeleton::solve(&ctx, &layout, &mut rng).unwrap();
            let beats = elaborate(&ctx, &layout, &skeleton, &mut rng).unwrap();
            assert_eq!(beats.len(), skeleton.len());

            let last = beats.len() - 1;
            for (i, beat) in beats.iter().enumerate() {
                assert_eq!(beat.rhythm.len(), beat.notes.len());
                assert_ge!(beat.notes.len(), 1);
                assert_eq!(beat.rhythm.iter().sum::<Rational64>(), Rational64::from_integer(1));
                assert!(beat.notes.iter().all(|&p| ctx.scale.index_of(p).is_some()));
                if i == last {
                    assert_eq!(beat.notes.last(), Some(&beat.root));
                } else {
                    assert_eq!(beat.notes[0], beat.root);
                }
            }
        }
    }

    #[test]
    fn single_note_beats_are_just_roots() {
        let config = Config {
            probabilities: [1.0, 0.0, 0.0, 0.0],
            ..Config::default()
        };
        let mut rng = CanonRng::new(1);
        let ctx = Context::new(&config, &mut rng).unwrap();
        let layout = CellLayout::for_context(&ctx);
        let skeleton = skeleton::solve(&ctx, &layout, &mut rng).unwrap();
        let beats = elaborate(&ctx, &layout, &skeleton, &mut rng).unwrap();
        for (beat, &root) in beats.iter().zip(skeleton.roots()) {
            assert_eq!(beat.notes, vec![root]);
            assert_eq!(beat.rhythm, vec![Rational64::from_integer(1)]);
        }
    }

    #[test]
    fn overlap_spans() {
        let r = Rational64::new;
        assert_eq!(
            spans(&[r(1, 4), r(1, 4), r(1, 2)]),
            vec![(r(0, 1), r(1, 4)), (r(1, 4), r(1, 2)), (r(1, 2), r(1, 1))]
        );
    }

    #[test]
    fn two_note_beats_survive_octave_leaps() {
        let config = Config {
            max_jump: 12,
            voices: 1,
            probabilities: [0.0, 1.0, 0.0, 0.0],
            ..Config::default()
        };
        for seed in 0..5 {
            let mut rng = CanonRng::new(seed);
            let ctx = Context::new(&config, &mut rng).unwrap();
            let layout = CellLayout::for_context(&ctx);
            let skeleton = skeleton::solve(&ctx, &layout, &mut rng).unwrap();
            let beats = elaborate(&ctx, &layout, &skeleton, &mut rng).unwrap();
            assert!(beats.iter().all(|b| b.notes.len() == 2));
        }
    }
}
