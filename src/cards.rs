use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;


// The six kinds of curios that circulate between the tabletop and the cabinets.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Enum, EnumIter, Serialize,
    Deserialize,
)]
pub enum CardKind {
    Books,
    Candles,
    Ferns,
    Figurines,
    Seashells,
    Teacups,
}

// 0-based (row, col). Rows and columns grow right-down for the tabletop and
// bottom-up for shelves; each grid documents its own orientation.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
pub struct CellPos {
    pub row: u8,
    pub col: u8,
}

impl CellPos {
    pub const fn new(row: u8, col: u8) -> Self { CellPos { row, col } }

    pub fn is_orthogonally_adjacent_to(self, other: CellPos) -> bool {
        let dr = self.row.abs_diff(other.row);
        let dc = self.col.abs_diff(other.col);
        dr + dc == 1
    }
}

pub const MIN_SELECTION: usize = 1;
pub const MAX_SELECTION: usize = 3;

// Canonical selection-shape rule: 1 cell is always fine, 2 cells must be
// orthogonal neighbors, 3 cells must form a contiguous straight line.
pub fn selection_shape_is_valid(positions: &[CellPos]) -> bool {
    match positions {
        [_] => true,
        [a, b] => a.is_orthogonally_adjacent_to(*b),
        [a, b, c] => {
            let mut sorted = [*a, *b, *c];
            sorted.sort();
            let [p, q, r] = sorted;
            let same_row = p.row == q.row && q.row == r.row;
            let same_col = p.col == q.col && q.col == r.col;
            if same_row {
                q.col == p.col + 1 && r.col == q.col + 1
            } else if same_col {
                q.row == p.row + 1 && r.row == q.row + 1
            } else {
                false
            }
        }
        _ => false,
    }
}
