use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// League average rating; also the default for teams with no rating history.
pub const AVG_RATING: f64 = 1500.0;

/// Playoff berths per conference.
pub const PLAYOFF_SEEDS: usize = 7;

/// One of the two conferences making up the league.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conference {
    pub id: u32,
    pub name: String,
}

/// A four-team division within a conference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Division {
    pub id: u32,
    pub conference_id: u32,
    pub name: String,
}

/// A team as known before any simulation starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    pub division_id: u32,
    pub conference_id: u32,
    pub name: String,
}

/// Phase of the season a game belongs to. Phase changes both the rating
/// weight and the tie rules (post-season games cannot tie).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonPhase {
    Pre,
    Regular,
    Post,
}

/// A scheduled or completed game.
///
/// `home_score`/`away_score` are `None` until the game has been played;
/// the simulator replays scored games verbatim and draws outcomes for the
/// rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: u32,
    pub season: u16,
    pub week: u8,
    pub start_time: DateTime<Utc>,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
    pub phase: SeasonPhase,
    /// Neither side gets home advantage at a neutral site.
    #[serde(default)]
    pub neutral_site: bool,
}

/// How a single game resolved within one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResolution {
    HomeWin,
    AwayWin,
    Tie,
}

impl Game {
    pub fn is_played(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    /// The recorded resolution, if the game has been played.
    pub fn recorded_resolution(&self) -> Option<GameResolution> {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) if h > a => Some(GameResolution::HomeWin),
            (Some(h), Some(a)) if h < a => Some(GameResolution::AwayWin),
            (Some(_), Some(_)) => Some(GameResolution::Tie),
            _ => None,
        }
    }
}
