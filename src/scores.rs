use serde::{Deserialize, Serialize};


// A named prize. Awarded once per (player, objective instance) and accumulated.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Cockade {
    pub name: String,
    pub points: u32,
}

impl Cockade {
    pub fn new(name: impl Into<String>, points: u32) -> Self {
        Cockade { name: name.into(), points }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct PlayerTally {
    pub cockades: Vec<Cockade>,
}

impl PlayerTally {
    pub fn award(&mut self, cockade: Cockade) { self.cockades.push(cockade); }
    pub fn total(&self) -> u32 { self.cockades.iter().map(|c| c.points).sum() }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScoreRow {
    pub username: String,
    pub total: u32,
    pub cockades: Vec<Cockade>,
    pub title: String,
}

// Final ranking, best first.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Scoreboard {
    pub rows: Vec<ScoreRow>,
}

const RANK_TITLES: [&str; 4] = [
    "Curator Supreme",
    "Distinguished Collector",
    "Apprentice Archivist",
    "Dust Gatherer",
];

pub const SOLE_SURVIVOR_TITLE: &str = "Sole Survivor";

// Ties keep turn order: the stable sort leaves the earlier seat higher.
pub fn build_scoreboard(tallies: Vec<(String, PlayerTally)>) -> Scoreboard {
    let mut rows: Vec<ScoreRow> = tallies
        .into_iter()
        .map(|(username, tally)| ScoreRow {
            username,
            total: tally.total(),
            cockades: tally.cockades,
            title: String::new(),
        })
        .collect();
    rows.sort_by_key(|row| std::cmp::Reverse(row.total));
    assign_titles(&mut rows);
    Scoreboard { rows }
}

// Fast end: everyone else abandoned the game, the survivor ranks first no
// matter the points.
pub fn sole_survivor_scoreboard(
    tallies: Vec<(String, PlayerTally)>, survivor: &str,
) -> Scoreboard {
    let mut board = build_scoreboard(tallies);
    let idx = board
        .rows
        .iter()
        .position(|row| row.username == survivor)
        .expect("survivor must be one of the session players");
    let row = board.rows.remove(idx);
    board.rows.insert(0, row);
    assign_titles(&mut board.rows);
    board.rows[0].title = SOLE_SURVIVOR_TITLE.to_owned();
    Scoreboard { rows: board.rows }
}

fn assign_titles(rows: &mut [ScoreRow]) {
    for (rank, row) in rows.iter_mut().enumerate() {
        row.title = RANK_TITLES[rank.min(RANK_TITLES.len() - 1)].to_owned();
    }
}
