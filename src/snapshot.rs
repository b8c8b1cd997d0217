//! Read-only season snapshot: the input the persistence collaborator hands
//! to the simulator, plus the structural checks and derived views the core
//! needs before the first trial runs.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::league::{
    Conference, Division, Game, SeasonPhase, Team, AVG_RATING, PLAYOFF_SEEDS,
};
use crate::sim::team_state::TeamSimState;

/// Everything known about the season at the simulation cutoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonSnapshot {
    pub season: u16,
    pub conferences: Vec<Conference>,
    pub divisions: Vec<Division>,
    pub teams: Vec<Team>,
    pub games: Vec<Game>,
    /// Most recent rating per team id; absent teams default to the league
    /// average.
    #[serde(default)]
    pub ratings: HashMap<u32, f64>,
}

/// Structural problems that make a run impossible.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("the league must have exactly 2 conferences, found {0}")]
    ConferenceCount(usize),
    #[error("conference {id} has {teams} teams; {PLAYOFF_SEEDS} are needed to seed a bracket")]
    ConferenceTooSmall { id: u32, teams: usize },
    #[error("division {0} has no teams and cannot produce a leader")]
    EmptyDivision(u32),
    #[error("division {id} spans conferences {first} and {second}")]
    DivisionSpansConferences { id: u32, first: u32, second: u32 },
    #[error("game {game_id} references unknown team {team_id}")]
    UnknownTeam { game_id: u32, team_id: u32 },
}

impl SeasonSnapshot {
    /// Check the snapshot can seed and play a full post-season.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.conferences.len() != 2 {
            return Err(SnapshotError::ConferenceCount(self.conferences.len()));
        }

        for conference in &self.conferences {
            let teams = self
                .teams
                .iter()
                .filter(|t| t.conference_id == conference.id)
                .count();
            if teams < PLAYOFF_SEEDS {
                return Err(SnapshotError::ConferenceTooSmall {
                    id: conference.id,
                    teams,
                });
            }
        }

        for division in &self.divisions {
            let mut members = self.teams.iter().filter(|t| t.division_id == division.id);
            let Some(first) = members.next() else {
                return Err(SnapshotError::EmptyDivision(division.id));
            };
            if let Some(stray) = members.find(|t| t.conference_id != first.conference_id) {
                return Err(SnapshotError::DivisionSpansConferences {
                    id: division.id,
                    first: first.conference_id,
                    second: stray.conference_id,
                });
            }
        }

        for game in &self.games {
            for team_id in [game.home_team_id, game.away_team_id] {
                if !self.teams.iter().any(|t| t.id == team_id) {
                    return Err(SnapshotError::UnknownTeam {
                        game_id: game.id,
                        team_id,
                    });
                }
            }
        }

        Ok(())
    }

    /// Per-team starting state for a trial: snapshot rating (league average
    /// when missing), regular-season results already on the books, and the
    /// date each team last took the field. Per-trial clones start here.
    pub fn baseline_states(&self) -> Vec<TeamSimState> {
        let mut states: Vec<TeamSimState> = self
            .teams
            .iter()
            .map(|team| {
                TeamSimState::new(
                    team,
                    self.ratings.get(&team.id).copied().unwrap_or(AVG_RATING),
                )
            })
            .collect();

        let mut by_id: HashMap<u32, usize> = HashMap::new();
        for (index, state) in states.iter().enumerate() {
            by_id.insert(state.team_id, index);
        }

        for game in &self.games {
            let Some(resolution) = game.recorded_resolution() else {
                continue;
            };
            let home = by_id[&game.home_team_id];
            let away = by_id[&game.away_team_id];

            for index in [home, away] {
                let last = &mut states[index].last_game;
                if last.map_or(true, |d| d < game.start_time) {
                    *last = Some(game.start_time);
                }
            }

            // Only regular-season results count toward the standings.
            if game.phase != SeasonPhase::Regular {
                continue;
            }
            use crate::league::GameResolution::*;
            match resolution {
                HomeWin => {
                    states[home].record_win(game.away_team_id);
                    states[away].record_loss(game.home_team_id);
                }
                AwayWin => {
                    states[home].record_loss(game.away_team_id);
                    states[away].record_win(game.home_team_id);
                }
                Tie => {
                    states[home].record_tie(game.away_team_id);
                    states[away].record_tie(game.home_team_id);
                }
            }
        }

        states
    }

    /// End of the current league week: 08:00 on the Wednesday after the
    /// earliest unplayed game (the same week's Wednesday when that game
    /// falls Sunday through Wednesday). `None` when nothing is left to
    /// play.
    pub fn imminent_cutoff(&self) -> Option<DateTime<Utc>> {
        let first_unplayed = self
            .games
            .iter()
            .filter(|g| !g.is_played())
            .min_by_key(|g| g.start_time)?;

        let day = first_unplayed.start_time.weekday().num_days_from_sunday() as i64;
        let adjust = if day > 3 { 10 - day } else { 3 - day };
        let date = (first_unplayed.start_time + Duration::days(adjust)).date_naive();
        let cutoff = date.and_hms_opt(8, 0, 0).expect("08:00 is a valid time");
        Some(Utc.from_utc_datetime(&cutoff))
    }

    /// Ids of the unplayed games inside the current week, in start order.
    /// These are the games conditional probabilities are produced for.
    pub fn imminent_game_ids(&self) -> Vec<u32> {
        let Some(cutoff) = self.imminent_cutoff() else {
            return Vec::new();
        };
        let mut games: Vec<&Game> = self
            .games
            .iter()
            .filter(|g| !g.is_played() && g.start_time < cutoff)
            .collect();
        games.sort_by_key(|g| (g.start_time, g.id));
        games.iter().map(|g| g.id).collect()
    }

    /// Week number of the most recently completed game; the probability
    /// records are keyed on it. 0 before the season starts.
    pub fn last_completed_week(&self) -> u8 {
        self.games
            .iter()
            .filter(|g| g.is_played())
            .max_by_key(|g| g.start_time)
            .map(|g| g.week)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn team(id: u32, division_id: u32, conference_id: u32) -> Team {
        Team {
            id,
            division_id,
            conference_id,
            name: format!("team-{id}"),
        }
    }

    fn game(id: u32, home: u32, away: u32, start: &str, score: Option<(u16, u16)>) -> Game {
        Game {
            id,
            season: 2023,
            week: 1,
            start_time: start.parse().unwrap(),
            home_team_id: home,
            away_team_id: away,
            home_score: score.map(|s| s.0),
            away_score: score.map(|s| s.1),
            phase: SeasonPhase::Regular,
            neutral_site: false,
        }
    }

    /// Two conferences of seven single-team divisions each.
    fn snapshot() -> SeasonSnapshot {
        let mut teams = Vec::new();
        let mut divisions = Vec::new();
        for conference in [100u32, 200] {
            for i in 0..7u32 {
                let id = conference + i + 1;
                divisions.push(Division {
                    id,
                    conference_id: conference,
                    name: format!("division-{id}"),
                });
                teams.push(team(id, id, conference));
            }
        }
        SeasonSnapshot {
            season: 2023,
            conferences: vec![
                Conference {
                    id: 100,
                    name: "AFC".into(),
                },
                Conference {
                    id: 200,
                    name: "NFC".into(),
                },
            ],
            divisions,
            teams,
            games: Vec::new(),
            ratings: HashMap::new(),
        }
    }

    #[test]
    fn valid_snapshot_passes() {
        assert!(snapshot().validate().is_ok());
    }

    #[test]
    fn too_small_conference_is_rejected() {
        let mut snap = snapshot();
        snap.teams.retain(|t| t.id != 101);
        assert!(matches!(
            snap.validate(),
            Err(SnapshotError::ConferenceTooSmall { id: 100, teams: 6 })
        ));
    }

    #[test]
    fn empty_division_is_rejected() {
        let mut snap = snapshot();
        snap.divisions.push(Division {
            id: 999,
            conference_id: 100,
            name: "ghost".into(),
        });
        assert!(matches!(
            snap.validate(),
            Err(SnapshotError::EmptyDivision(999))
        ));
    }

    #[test]
    fn unknown_team_in_game_is_rejected() {
        let mut snap = snapshot();
        snap.games
            .push(game(1, 101, 999, "2023-09-10T17:00:00Z", None));
        assert!(matches!(
            snap.validate(),
            Err(SnapshotError::UnknownTeam {
                game_id: 1,
                team_id: 999
            })
        ));
    }

    #[test]
    fn missing_rating_defaults_to_league_average() {
        let mut snap = snapshot();
        snap.ratings.insert(101, 1622.5);
        let states = snap.baseline_states();
        let rated = states.iter().find(|s| s.team_id == 101).unwrap();
        let unrated = states.iter().find(|s| s.team_id == 102).unwrap();
        assert_relative_eq!(rated.rating, 1622.5);
        assert_relative_eq!(unrated.rating, AVG_RATING);
    }

    #[test]
    fn baseline_carries_recorded_regular_results_and_last_game_dates() {
        let mut snap = snapshot();
        snap.games
            .push(game(1, 101, 102, "2023-09-10T17:00:00Z", Some((27, 20))));
        snap.games
            .push(game(2, 102, 103, "2023-09-17T17:00:00Z", Some((14, 14))));
        let states = snap.baseline_states();
        let winner = states.iter().find(|s| s.team_id == 101).unwrap();
        let split = states.iter().find(|s| s.team_id == 102).unwrap();
        assert_eq!(winner.wins(), 1);
        assert_eq!(split.losses(), 1);
        assert_eq!(split.ties(), 1);
        assert_eq!(
            split.last_game,
            Some("2023-09-17T17:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn recorded_preseason_affects_rest_but_not_standings() {
        let mut snap = snapshot();
        let mut g = game(1, 101, 102, "2023-08-20T17:00:00Z", Some((13, 10)));
        g.phase = SeasonPhase::Pre;
        snap.games.push(g);
        let states = snap.baseline_states();
        let home = states.iter().find(|s| s.team_id == 101).unwrap();
        assert_eq!(home.games_played(), 0);
        assert!(home.last_game.is_some());
    }

    #[test]
    fn sunday_slate_cuts_off_the_following_wednesday() {
        let mut snap = snapshot();
        // Sunday, 2023-09-10.
        snap.games
            .push(game(1, 101, 102, "2023-09-10T17:00:00Z", None));
        let cutoff = snap.imminent_cutoff().unwrap();
        assert_eq!(cutoff, "2023-09-13T08:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn thursday_opener_extends_through_the_weekend() {
        let mut snap = snapshot();
        // Thursday, 2023-09-07; Sunday and Monday games follow.
        snap.games
            .push(game(1, 101, 102, "2023-09-07T00:20:00Z", None));
        snap.games
            .push(game(2, 103, 104, "2023-09-10T17:00:00Z", None));
        snap.games
            .push(game(3, 105, 106, "2023-09-11T23:00:00Z", None));
        snap.games
            .push(game(4, 107, 201, "2023-09-17T17:00:00Z", None));
        let cutoff = snap.imminent_cutoff().unwrap();
        assert_eq!(cutoff, "2023-09-13T08:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(snap.imminent_game_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn last_completed_week_follows_latest_recorded_game() {
        let mut snap = snapshot();
        let mut g1 = game(1, 101, 102, "2023-09-10T17:00:00Z", Some((20, 17)));
        g1.week = 1;
        let mut g2 = game(2, 103, 104, "2023-09-17T17:00:00Z", Some((20, 17)));
        g2.week = 2;
        let mut g3 = game(3, 105, 106, "2023-09-24T17:00:00Z", None);
        g3.week = 3;
        snap.games.extend([g1, g2, g3]);
        assert_eq!(snap.last_completed_week(), 2);
    }
}
