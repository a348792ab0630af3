// Scoring collaborator: pure predicates and prize computations over shelf
// grids. The session controller only consumes the "shelf in, cockades out"
// contract defined here.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::cards::{CardKind, CellPos};
use crate::scores::Cockade;
use crate::shelf::{Shelf, SHELF_COLS, SHELF_ROWS};


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, Serialize, Deserialize)]
pub enum CommonObjectiveKind {
    FourCorners,
    EightOfAKind,
    DiagonalOfFive,
    TwoRainbowColumns,
    SixGroupsOfTwo,
    FourGroupsOfFour,
}

impl CommonObjectiveKind {
    pub fn name(self) -> &'static str {
        match self {
            CommonObjectiveKind::FourCorners => "Four Corners",
            CommonObjectiveKind::EightOfAKind => "Eight of a Kind",
            CommonObjectiveKind::DiagonalOfFive => "Diagonal of Five",
            CommonObjectiveKind::TwoRainbowColumns => "Two Rainbow Columns",
            CommonObjectiveKind::SixGroupsOfTwo => "Six Groups of Two",
            CommonObjectiveKind::FourGroupsOfFour => "Four Groups of Four",
        }
    }

    pub fn is_satisfied_by(self, shelf: &Shelf) -> bool {
        match self {
            CommonObjectiveKind::FourCorners => {
                let corners = [
                    shelf.card_at(0, 0),
                    shelf.card_at(0, SHELF_COLS - 1),
                    shelf.card_at(SHELF_ROWS - 1, 0),
                    shelf.card_at(SHELF_ROWS - 1, SHELF_COLS - 1),
                ];
                matches!(corners, [Some(a), Some(b), Some(c), Some(d)] if a == b && b == c && c == d)
            }
            CommonObjectiveKind::EightOfAKind => {
                CardKind::iter().any(|kind| shelf.count_kind(kind) >= 8)
            }
            CommonObjectiveKind::DiagonalOfFive => {
                (0..=SHELF_ROWS - SHELF_COLS).any(|base| {
                    let ascending = (0..SHELF_COLS)
                        .map(|i| shelf.card_at(base + i, i))
                        .collect::<Option<Vec<_>>>()
                        .is_some_and(|cards| cards.iter().all(|&k| k == cards[0]));
                    let descending = (0..SHELF_COLS)
                        .map(|i| shelf.card_at(base + i, SHELF_COLS - 1 - i))
                        .collect::<Option<Vec<_>>>()
                        .is_some_and(|cards| cards.iter().all(|&k| k == cards[0]));
                    ascending || descending
                })
            }
            CommonObjectiveKind::TwoRainbowColumns => {
                let rainbow_columns = (0..SHELF_COLS)
                    .filter(|&col| {
                        let cards: Option<Vec<_>> =
                            (0..SHELF_ROWS).map(|row| shelf.card_at(row, col)).collect();
                        cards.is_some_and(|mut cards| {
                            cards.sort();
                            cards.dedup();
                            cards.len() == SHELF_ROWS as usize
                        })
                    })
                    .count();
                rainbow_columns >= 2
            }
            CommonObjectiveKind::SixGroupsOfTwo => {
                shelf.groups().iter().filter(|&&(_, size)| size >= 2).count() >= 6
            }
            CommonObjectiveKind::FourGroupsOfFour => {
                shelf.groups().iter().filter(|&&(_, size)| size >= 4).count() >= 4
            }
        }
    }
}

// Point values awarded to successive completers, highest first. One step per
// potential completer, so the track never runs dry.
pub fn decay_track(num_players: usize) -> Vec<u32> {
    match num_players {
        2 => vec![8, 4],
        3 => vec![8, 6, 4],
        4 => vec![8, 6, 4, 2],
        _ => panic!("unsupported player count: {num_players}"),
    }
}

// One of the two shared objectives of a session, with its decaying point track
// and the players it has already paid out to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommonObjective {
    pub kind: CommonObjectiveKind,
    remaining: Vec<u32>,
    awarded_to: Vec<String>,
}

impl CommonObjective {
    pub fn new(kind: CommonObjectiveKind, num_players: usize) -> Self {
        CommonObjective { kind, remaining: decay_track(num_players), awarded_to: Vec::new() }
    }

    pub fn current_points(&self) -> u32 { self.remaining.first().copied().unwrap_or(0) }

    pub fn is_awarded_to(&self, username: &str) -> bool {
        self.awarded_to.iter().any(|u| u == username)
    }

    pub fn award(&mut self, username: &str) -> Cockade {
        assert!(!self.is_awarded_to(username));
        let points = if self.remaining.is_empty() { 0 } else { self.remaining.remove(0) };
        self.awarded_to.push(username.to_owned());
        Cockade::new(self.kind.name(), points)
    }
}

// Selection is without replacement; the catalog comfortably exceeds two.
pub fn choose_common_objectives(
    num_players: usize, rng: &mut impl Rng,
) -> Vec<CommonObjective> {
    let mut catalog: Vec<_> = CommonObjectiveKind::iter().collect();
    assert!(catalog.len() > 2);
    catalog.shuffle(rng);
    catalog
        .into_iter()
        .take(2)
        .map(|kind| CommonObjective::new(kind, num_players))
        .collect()
}


pub const PERSONAL_TARGETS: usize = 6;
pub const PERSONAL_DECK_SIZE: usize = 12;
// Points for 0..=6 matched targets.
pub const PERSONAL_POINTS: [u32; PERSONAL_TARGETS + 1] = [0, 1, 2, 4, 6, 9, 12];

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PersonalObjective {
    pub targets: Vec<(CellPos, CardKind)>, // shelf coordinates
}

impl PersonalObjective {
    pub fn matched_targets(&self, shelf: &Shelf) -> usize {
        self.targets
            .iter()
            .filter(|&&(pos, kind)| shelf.card_at(pos.row, pos.col) == Some(kind))
            .count()
    }

    pub fn is_complete(&self, shelf: &Shelf) -> bool {
        self.matched_targets(shelf) == self.targets.len()
    }

    pub fn points_for(&self, shelf: &Shelf) -> u32 {
        PERSONAL_POINTS[self.matched_targets(shelf)]
    }
}

// Deals a deck of distinct personal objective cards, each naming six distinct
// shelf cells with target kinds.
pub fn personal_objective_deck(rng: &mut impl Rng) -> Vec<PersonalObjective> {
    let mut all_cells: Vec<CellPos> = (0..SHELF_ROWS)
        .flat_map(|row| (0..SHELF_COLS).map(move |col| CellPos::new(row, col)))
        .collect();
    let kinds: Vec<CardKind> = CardKind::iter().collect();
    (0..PERSONAL_DECK_SIZE)
        .map(|_| {
            all_cells.shuffle(rng);
            let mut shuffled_kinds = kinds.clone();
            shuffled_kinds.shuffle(rng);
            let targets = all_cells
                .iter()
                .take(PERSONAL_TARGETS)
                .zip(shuffled_kinds)
                .map(|(&pos, kind)| (pos, kind))
                .collect();
            PersonalObjective { targets }
        })
        .collect()
}


// End-of-game prizes for contiguous same-kind groups.
fn group_points(size: usize) -> Option<u32> {
    match size {
        0..=2 => None,
        3 => Some(2),
        4 => Some(3),
        5 => Some(5),
        _ => Some(8),
    }
}

pub fn group_cockades(shelf: &Shelf) -> Vec<Cockade> {
    shelf
        .groups()
        .into_iter()
        .filter_map(|(kind, size)| {
            group_points(size)
                .map(|points| Cockade::new(format!("Group of {size} {kind:?}"), points))
        })
        .collect()
}

// End-of-game prize for partially matched personal objectives. Fully completed
// objectives pay out during the game instead.
pub fn personal_cockade(shelf: &Shelf, objective: &PersonalObjective) -> Option<Cockade> {
    let matched = objective.matched_targets(shelf);
    if matched == 0 {
        return None;
    }
    Some(Cockade::new("Personal Objective", PERSONAL_POINTS[matched]))
}
