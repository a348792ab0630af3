use serde::{Deserialize, Serialize};

use crate::cards::CardKind;


pub const SHELF_ROWS: u8 = 6;
pub const SHELF_COLS: u8 = 5;

// A player's personal cabinet. Row 0 is the bottom; cards stack bottom-up.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Shelf {
    cells: Vec<Option<CardKind>>, // row-major, SHELF_ROWS × SHELF_COLS
}

impl Shelf {
    pub fn new() -> Self {
        Shelf { cells: vec![None; SHELF_ROWS as usize * SHELF_COLS as usize] }
    }

    fn index(row: u8, col: u8) -> usize {
        assert!(row < SHELF_ROWS && col < SHELF_COLS);
        row as usize * SHELF_COLS as usize + col as usize
    }

    pub fn card_at(&self, row: u8, col: u8) -> Option<CardKind> {
        self.cells[Self::index(row, col)]
    }

    pub fn free_in_column(&self, col: u8) -> usize {
        (0..SHELF_ROWS).filter(|&row| self.card_at(row, col).is_none()).count()
    }

    // Inserts bottom-up in the given order. The caller checks capacity.
    pub fn insert_into_column(&mut self, col: u8, cards: &[CardKind]) {
        assert!(cards.len() <= self.free_in_column(col));
        let mut row = (0..SHELF_ROWS)
            .find(|&row| self.card_at(row, col).is_none())
            .unwrap();
        for &kind in cards {
            self.cells[Self::index(row, col)] = Some(kind);
            row += 1;
        }
    }

    pub fn is_full(&self) -> bool { self.cells.iter().all(|cell| cell.is_some()) }

    pub fn count_kind(&self, kind: CardKind) -> usize {
        self.cells.iter().filter(|&&cell| cell == Some(kind)).count()
    }

    // Maximal orthogonally-connected groups of same-kind cards, as
    // (kind, size) pairs.
    pub fn groups(&self) -> Vec<(CardKind, usize)> {
        let mut visited = vec![false; self.cells.len()];
        let mut groups = Vec::new();
        for row in 0..SHELF_ROWS {
            for col in 0..SHELF_COLS {
                let idx = Self::index(row, col);
                if visited[idx] {
                    continue;
                }
                let Some(kind) = self.cells[idx] else { continue };
                let mut size = 0;
                let mut stack = vec![(row, col)];
                visited[idx] = true;
                while let Some((r, c)) = stack.pop() {
                    size += 1;
                    let mut neighbors = Vec::new();
                    if r > 0 {
                        neighbors.push((r - 1, c));
                    }
                    if r + 1 < SHELF_ROWS {
                        neighbors.push((r + 1, c));
                    }
                    if c > 0 {
                        neighbors.push((r, c - 1));
                    }
                    if c + 1 < SHELF_COLS {
                        neighbors.push((r, c + 1));
                    }
                    for (nr, nc) in neighbors {
                        let nidx = Self::index(nr, nc);
                        if !visited[nidx] && self.cells[nidx] == Some(kind) {
                            visited[nidx] = true;
                            stack.push((nr, nc));
                        }
                    }
                }
                groups.push((kind, size));
            }
        }
        groups
    }
}
