//! Rank tiers and room labels.
//!
//! A level id packs the track and tier into decimal digits:
//!
//! ```text
//!   1 0 3 0 2
//!   │   │ └─┴── minor (1-3, stars within the tier)
//!   │   └────── major (1 Novice … 6/7 Celestial)
//!   └────────── mode (1 = 4-player, 2 = 3-player)
//! ```

use std::fmt;

const MAJORS: [&str; 6] = ["Novice", "Adept", "Expert", "Master", "Saint", "Celestial"];

/// Points needed to rank up, per major tier and minor step.
const SCORE_CAPS: [[u32; 3]; 5] = [
    [20, 80, 200],
    [600, 800, 1000],
    [1200, 1400, 2000],
    [2800, 3200, 3600],
    [4000, 6000, 9000],
];

/// A rank on one track, as carried by `AccountLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLevel {
    pub id: u32,
    pub score: u32,
}

impl PlayerLevel {
    pub fn new(id: u32, score: u32) -> Self {
        Self { id, score }
    }

    pub fn major(&self) -> u32 {
        (self.id / 100) % 10
    }

    pub fn minor(&self) -> u32 {
        self.id % 100
    }

    /// Whether this is a 3-player rank.
    pub fn is_three_player(&self) -> bool {
        self.id / 10_000 == 2
    }

    /// Celestial has two ids (6 on older accounts, 7 since the rework).
    pub fn is_celestial(&self) -> bool {
        self.major() >= 6
    }

    /// The tier name with its star count, e.g. `Expert 2`.
    pub fn tag(&self) -> String {
        let major = self.major();
        let name = match major {
            1..=5 => MAJORS[major as usize - 1],
            m if m >= 6 => MAJORS[5],
            _ => "Unranked",
        };
        format!("{name} {}", self.minor())
    }

    /// Points needed to rank up; `None` for Celestial and unknown tiers.
    pub fn max_score(&self) -> Option<u32> {
        let major = self.major() as usize;
        let minor = self.minor() as usize;
        if !(1..=5).contains(&major) || !(1..=3).contains(&minor) {
            return None;
        }
        Some(SCORE_CAPS[major - 1][minor - 1])
    }

    /// The score as the client shows it: `420/1400`, or `12.3` for
    /// Celestial where points are tracked in hundredths.
    pub fn formatted_score(&self) -> String {
        if self.is_celestial() {
            return format!("{:.1}", f64::from(self.score) / 100.0);
        }
        match self.max_score() {
            Some(cap) => format!("{}/{cap}", self.score),
            None => self.score.to_string(),
        }
    }
}

impl fmt::Display for PlayerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tag(), self.formatted_score())
    }
}

/// Human-readable room for a ranked `mode_id`.
pub fn room_label(mode_id: u32) -> Option<&'static str> {
    Some(match mode_id {
        2 => "Bronze East (4P)",
        3 => "Bronze South (4P)",
        5 => "Silver East (4P)",
        6 => "Silver South (4P)",
        8 => "Gold East (4P)",
        9 => "Gold South (4P)",
        11 => "Jade East (4P)",
        12 => "Jade South (4P)",
        15 => "Throne East (4P)",
        16 => "Throne South (4P)",
        17 => "Bronze East (3P)",
        18 => "Bronze South (3P)",
        19 => "Silver East (3P)",
        20 => "Silver South (3P)",
        21 => "Gold East (3P)",
        22 => "Gold South (3P)",
        23 => "Jade East (3P)",
        24 => "Jade South (3P)",
        25 => "Throne East (3P)",
        26 => "Throne South (3P)",
        _ => return None,
    })
}
