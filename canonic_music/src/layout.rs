// Cell layout: which beats are solved, which are copied, and who constrains
// whom.
//
// The melody is flattened into cells, `bar * beats_per_bar + beat`. Every
// cell has an owner. A free cell owns itself and gets its own logic
// variable choice; a mirrored cell is unified with the free cell it copies.
//
// - Round: every cell is free.
// - Palindrome: cell `i` mirrors cell `total - 1 - i`; the later half is
//   free. With an odd number of bars the middle bar is split, its second
//   half free and its first half mirrored.
// - Crab: the melody is cut into segments one progression long. Even
//   segments are free, odd segments are the bar-and-beat retrograde of the
//   segment before them. A short final segment mirrors the tail of the
//   previous one. A new free segment starts afresh: nothing ties its first
//   note to the retrograde that precedes it, whose last note is the
//   opening tonic.
//
// Free cells are solved from the end of the piece backwards. Each pairwise
// relation (consecutive cells; cells sounding together in different voices)
// is attached to whichever of the two owners is solved later, so every
// projection reads an owner that an earlier goal already bound. Two cells
// that sound together and share an owner can't be kept apart at all; such a
// layout is rejected before solving.

use crate::config::CanonForm;
use crate::context::Context;
use crate::error::CanonError;

#[derive(Debug, Clone)]
pub struct CellLayout {
    beats_per_bar: usize,
    owners: Vec<usize>,
    /// Free cells, in solving order.
    order: Vec<usize>,
    /// Owners each free cell must stay within a jump of (and differ from).
    neighbours: Vec<Vec<usize>>,
    /// Owners each free cell must merely differ from.
    unavailable: Vec<Vec<usize>>,
    /// Cells heard at the same time as each cell, in other voices.
    simultaneous: Vec<Vec<usize>>,
    needs_tonic: Vec<bool>,
}

impl CellLayout {
    /// `segment_bars` is the crab segment length; `cycle_bars` is the
    /// distance between voice entries.
    pub fn new(
        form: CanonForm,
        bars: usize,
        beats_per_bar: usize,
        segment_bars: usize,
        voices: usize,
        cycle_bars: usize,
    ) -> Self {
        let total = bars * beats_per_bar;
        let owners: Vec<usize> = (0..total)
            .map(|cell| owner_of(form, cell, total, beats_per_bar, segment_bars.max(1)))
            .collect();

        let stride = cycle_bars * beats_per_bar;
        let simultaneous: Vec<Vec<usize>> = (0..total)
            .map(|cell| {
                let mut cells = Vec::new();
                for k in 1..voices {
                    if let Some(before) = cell.checked_sub(k * stride) {
                        cells.push(before);
                    }
                    if cell + k * stride < total {
                        cells.push(cell + k * stride);
                    }
                }
                cells.sort_unstable();
                cells
            })
            .collect();

        let mut neighbours = vec![Vec::new(); total];
        let mut unavailable = vec![Vec::new(); total];
        let segment_cells = segment_bars.max(1) * beats_per_bar;
        for cell in 0..total.saturating_sub(1) {
            let next = cell + 1;
            let fresh_segment = next % segment_cells == 0 && (next / segment_cells) % 2 == 0;
            if form == CanonForm::Crab && fresh_segment {
                continue;
            }
            attach(&mut neighbours, owners[cell], owners[next]);
        }
        for cell in 0..total {
            for &other in simultaneous[cell].iter().filter(|&&other| other > cell) {
                attach(&mut unavailable, owners[cell], owners[other]);
            }
        }
        for (near, apart) in neighbours.iter_mut().zip(unavailable.iter_mut()) {
            near.sort_unstable();
            near.dedup();
            apart.sort_unstable();
            apart.dedup();
            apart.retain(|o| near.binary_search(o).is_err());
        }

        let mut needs_tonic = vec![false; total];
        if let Some(&last) = owners.last() {
            needs_tonic[last] = true;
        }
        if form.is_mirrored() {
            if let Some(&first) = owners.first() {
                needs_tonic[first] = true;
            }
        }

        let order = (0..total).rev().filter(|&c| owners[c] == c).collect();

        CellLayout {
            beats_per_bar,
            owners,
            order,
            neighbours,
            unavailable,
            simultaneous,
            needs_tonic,
        }
    }

    pub fn for_context(ctx: &Context) -> Self {
        let config = &ctx.config;
        CellLayout::new(
            config.form,
            config.bars,
            config.beats_per_bar,
            ctx.progression.bars(),
            config.voices,
            config.bars_per_chord_cycle,
        )
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn beats_per_bar(&self) -> usize {
        self.beats_per_bar
    }

    /// `(bar, beat)` of a cell.
    pub fn position(&self, cell: usize) -> (usize, usize) {
        (cell / self.beats_per_bar, cell % self.beats_per_bar)
    }

    pub fn owner(&self, cell: usize) -> usize {
        self.owners[cell]
    }

    pub fn is_free(&self, cell: usize) -> bool {
        self.owners[cell] == cell
    }

    /// Free cells from last to first.
    pub fn solve_order(&self) -> &[usize] {
        &self.order
    }

    /// `(cell, owner)` for every mirrored cell.
    pub fn mirrors(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter(|&(cell, &owner)| cell != owner)
            .map(|(cell, &owner)| (cell, owner))
    }

    /// Mirrored cells that copy `owner`.
    pub fn copies_of(&self, owner: usize) -> impl Iterator<Item = usize> + '_ {
        self.mirrors()
            .filter(move |&(_, o)| o == owner)
            .map(|(cell, _)| cell)
    }

    pub fn neighbours(&self, cell: usize) -> &[usize] {
        &self.neighbours[cell]
    }

    pub fn unavailable(&self, cell: usize) -> &[usize] {
        &self.unavailable[cell]
    }

    pub fn simultaneous(&self, cell: usize) -> &[usize] {
        &self.simultaneous[cell]
    }

    /// Fails when two cells heard together in different voices copy the
    /// same owner: both voices would be forced onto one root.
    pub fn check_voices(&self) -> Result<(), CanonError> {
        for (cell, others) in self.simultaneous.iter().enumerate() {
            let twin = others
                .iter()
                .find(|&&other| other > cell && self.owners[other] == self.owners[cell]);
            if let Some(&second) = twin {
                return Err(CanonError::VoicesInUnison {
                    first: cell,
                    second,
                });
            }
        }
        Ok(())
    }

    /// True if this owner must sit on the tonic.
    pub fn needs_tonic(&self, cell: usize) -> bool {
        self.needs_tonic[cell]
    }
}

fn owner_of(
    form: CanonForm,
    cell: usize,
    total: usize,
    beats_per_bar: usize,
    segment_bars: usize,
) -> usize {
    match form {
        CanonForm::Round => cell,
        CanonForm::Palindrome => cell.max(total - 1 - cell),
        CanonForm::Crab => {
            let (bar, beat) = (cell / beats_per_bar, cell % beats_per_bar);
            let segment = bar / segment_bars;
            if segment % 2 == 0 {
                return cell;
            }
            let offset = bar - segment * segment_bars;
            let source_bar = (segment - 1) * segment_bars + segment_bars - 1 - offset;
            source_bar * beats_per_bar + beats_per_bar - 1 - beat
        }
    }
}

/// Record a relation between two owners on the one solved later (the lower
/// index, since solving runs backwards).
fn attach(table: &mut [Vec<usize>], a: usize, b: usize) {
    if a != b {
        table[a.min(b)].push(a.max(b));
    }
}
