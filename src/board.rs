use enum_map::{enum_map, EnumMap};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::cards::{CardKind, CellPos};


pub const TABLETOP_SIZE: u8 = 9;
pub const CARDS_PER_KIND: usize = 22;

// Minimum player count required for a cell to be part of the tabletop;
// 0 marks cells that are never usable.
#[rustfmt::skip]
const CELL_MIN_PLAYERS: [[u8; TABLETOP_SIZE as usize]; TABLETOP_SIZE as usize] = [
    [0, 0, 0, 3, 4, 0, 0, 0, 0],
    [0, 0, 0, 2, 2, 4, 0, 0, 0],
    [0, 0, 3, 2, 2, 2, 3, 0, 0],
    [0, 4, 2, 2, 2, 2, 2, 2, 3],
    [3, 2, 2, 2, 2, 2, 2, 2, 3],
    [3, 2, 2, 2, 2, 2, 2, 4, 0],
    [0, 0, 3, 2, 2, 2, 3, 0, 0],
    [0, 0, 0, 4, 2, 2, 0, 0, 0],
    [0, 0, 0, 0, 4, 3, 0, 0, 0],
];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardBag {
    counts: EnumMap<CardKind, usize>,
}

impl CardBag {
    pub fn full() -> Self {
        CardBag { counts: enum_map! { _ => CARDS_PER_KIND } }
    }
    pub fn empty() -> Self {
        CardBag { counts: enum_map! { _ => 0 } }
    }

    pub fn total(&self) -> usize { self.counts.values().sum() }
    pub fn is_empty(&self) -> bool { self.total() == 0 }

    pub fn draw(&mut self, rng: &mut impl Rng) -> Option<CardKind> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let mut roll = rng.random_range(0..total);
        for kind in CardKind::iter() {
            if roll < self.counts[kind] {
                self.counts[kind] -= 1;
                return Some(kind);
            }
            roll -= self.counts[kind];
        }
        unreachable!("roll within total card count");
    }

    pub fn put_back(&mut self, kind: CardKind) { self.counts[kind] += 1; }
}

// Card grid broadcast to clients. Unlike `Tabletop` it carries no bag, so it
// never leaks undrawn cards.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TabletopView {
    pub cells: Vec<Option<CardKind>>, // row-major, TABLETOP_SIZE × TABLETOP_SIZE
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tabletop {
    num_players: usize,
    cells: Vec<Option<CardKind>>, // row-major
    bag: CardBag,
}

impl Tabletop {
    pub fn new(num_players: usize, rng: &mut impl Rng) -> Self {
        let mut tabletop = Self::unfilled(num_players);
        tabletop.refill(rng);
        tabletop
    }

    // Starts with an empty grid and a full bag. Used to stage specific layouts.
    pub fn unfilled(num_players: usize) -> Self {
        assert!((2..=4).contains(&num_players));
        Tabletop {
            num_players,
            cells: vec![None; (TABLETOP_SIZE as usize).pow(2)],
            bag: CardBag::full(),
        }
    }

    pub fn num_players(&self) -> usize { self.num_players }
    pub fn bag(&self) -> &CardBag { &self.bag }
    pub fn drain_bag(&mut self) { self.bag = CardBag::empty(); }

    fn index(pos: CellPos) -> usize {
        assert!(pos.row < TABLETOP_SIZE && pos.col < TABLETOP_SIZE);
        pos.row as usize * TABLETOP_SIZE as usize + pos.col as usize
    }

    pub fn contains(pos: CellPos) -> bool {
        pos.row < TABLETOP_SIZE && pos.col < TABLETOP_SIZE
    }

    pub fn is_usable(&self, pos: CellPos) -> bool {
        let min = CELL_MIN_PLAYERS[pos.row as usize][pos.col as usize];
        min != 0 && (min as usize) <= self.num_players
    }

    pub fn card_at(&self, pos: CellPos) -> Option<CardKind> { self.cells[Self::index(pos)] }

    pub fn put(&mut self, pos: CellPos, kind: CardKind) {
        assert!(self.is_usable(pos));
        let cell = &mut self.cells[Self::index(pos)];
        assert!(cell.is_none());
        *cell = Some(kind);
    }

    fn orthogonal_neighbors(pos: CellPos) -> impl Iterator<Item = CellPos> {
        let (row, col) = (pos.row as i16, pos.col as i16);
        [(row - 1, col), (row + 1, col), (row, col - 1), (row, col + 1)]
            .into_iter()
            .filter_map(|(r, c)| {
                (r >= 0 && c >= 0).then(|| CellPos::new(r as u8, c as u8))
            })
            .filter(|p| Self::contains(*p))
    }

    // A card is pickable iff present and at least one orthogonal side is free
    // (board edge, unusable cell or empty cell).
    pub fn is_pickable(&self, pos: CellPos) -> bool {
        if !Self::contains(pos) || !self.is_usable(pos) || self.card_at(pos).is_none() {
            return false;
        }
        let occupied_sides = Self::orthogonal_neighbors(pos)
            .filter(|&p| self.is_usable(p) && self.card_at(p).is_some())
            .count();
        occupied_sides < 4
    }

    // Removes the cards in selection order. The caller validates pickability.
    pub fn take(&mut self, positions: &[CellPos]) -> Vec<CardKind> {
        positions
            .iter()
            .map(|&pos| {
                self.cells[Self::index(pos)]
                    .take()
                    .unwrap_or_else(|| panic!("taking card from empty cell {pos:?}"))
            })
            .collect()
    }

    // Refill happens only once no two orthogonally adjacent occupied cells
    // remain, i.e. every leftover card is isolated.
    pub fn needs_refill(&self) -> bool {
        for row in 0..TABLETOP_SIZE {
            for col in 0..TABLETOP_SIZE {
                let pos = CellPos::new(row, col);
                if self.card_at(pos).is_none() {
                    continue;
                }
                let has_occupied_neighbor = Self::orthogonal_neighbors(pos)
                    .any(|p| self.card_at(p).is_some());
                if has_occupied_neighbor {
                    return false;
                }
            }
        }
        true
    }

    pub fn refill(&mut self, rng: &mut impl Rng) {
        for row in 0..TABLETOP_SIZE {
            for col in 0..TABLETOP_SIZE {
                let pos = CellPos::new(row, col);
                if self.is_usable(pos) && self.card_at(pos).is_none() {
                    match self.bag.draw(rng) {
                        Some(kind) => self.cells[Self::index(pos)] = Some(kind),
                        None => return,
                    }
                }
            }
        }
    }

    pub fn view(&self) -> TabletopView { TabletopView { cells: self.cells.clone() } }
}
