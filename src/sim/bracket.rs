//! Single-elimination playoff simulation.
//!
//! Seven seeds per conference: the four division leaders in conference
//! order, then the three best remaining teams as wild cards. Seed 1 sits
//! out the wild-card round; every later round re-pairs by seed, not by
//! bracket path. The championship is hosted by the league's designated
//! host team if it gets there, and played at a neutral site otherwise.
//!
//! Any slot whose exact pairing exists in the real schedule with a recorded
//! score is replayed verbatim; everything else is drawn from the rating
//! model in post-season mode (no ties) and feeds rating updates for both
//! sides, so a deep underdog run stays self-consistent within the trial.

use rand::Rng;

use crate::league::{Game, GameResolution, SeasonPhase};
use crate::sim::rating::{self, Outcome, DEFAULT_REST_DAYS};
use crate::sim::team_state::TeamSimState;

pub const ROUND_WILD_CARD: usize = 0;
pub const ROUND_DIVISIONAL: usize = 1;
pub const ROUND_CONFERENCE: usize = 2;
pub const ROUND_CHAMPIONSHIP: usize = 3;

/// Rest credited to the seed-1 team in the divisional round after its
/// wild-card bye.
const BYE_REST_DAYS: f64 = 14.0;

/// A post-season game as it appears in the real schedule.
#[derive(Debug, Clone)]
pub struct ScheduledPlayoffGame {
    pub game_id: u32,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub resolution: Option<GameResolution>,
}

/// The real post-season schedule, bucketed into rounds.
///
/// Rounds are recognised by week number in ascending order: playoff games
/// enter the schedule round by round, so the earliest post-season week
/// present is the wild-card round, the next the divisional round, and so
/// on.
#[derive(Debug, Clone, Default)]
pub struct PlayoffSchedule {
    rounds: Vec<Vec<ScheduledPlayoffGame>>,
}

impl PlayoffSchedule {
    /// Bucket the given post-season games by week.
    pub fn from_games<'a, I: IntoIterator<Item = &'a Game>>(games: I) -> Self {
        let mut games: Vec<&Game> = games.into_iter().collect();
        games.sort_by_key(|g| (g.week, g.start_time, g.id));

        let mut rounds: Vec<Vec<ScheduledPlayoffGame>> = Vec::new();
        let mut current_week: Option<u8> = None;
        for game in games {
            if current_week != Some(game.week) {
                current_week = Some(game.week);
                rounds.push(Vec::new());
            }
            rounds
                .last_mut()
                .expect("round bucket was just pushed")
                .push(ScheduledPlayoffGame {
                    game_id: game.id,
                    home_team_id: game.home_team_id,
                    away_team_id: game.away_team_id,
                    resolution: game.recorded_resolution(),
                });
        }
        PlayoffSchedule { rounds }
    }

    fn slot(&self, round: usize, home_id: u32, away_id: u32) -> Option<&ScheduledPlayoffGame> {
        self.rounds.get(round)?.iter().find(|g| {
            g.home_team_id == home_id && g.away_team_id == away_id
        })
    }
}

/// One conference's march through the bracket.
#[derive(Debug, Clone)]
pub struct ConferencePlayoff {
    pub conference_id: u32,
    /// The seven seeded teams, index 0 = seed 1.
    pub seeds: Vec<u32>,
    /// Teams reaching the divisional round.
    pub divisional: [u32; 4],
    /// Hosts of the two divisional games: seed 1 and the best-seeded
    /// wild-card winner.
    pub divisional_hosts: [u32; 2],
    /// Participants in the conference championship, host first.
    pub conference_round: [u32; 2],
    /// Conference champion, advancing to the final.
    pub champion: u32,
}

/// Outcome of the full post-season across both conferences.
#[derive(Debug, Clone)]
pub struct PlayoffOutcome {
    pub conferences: Vec<ConferencePlayoff>,
    pub champion: u32,
}

pub struct BracketSimulator<'a> {
    pub schedule: &'a PlayoffSchedule,
    /// Team awarded home field in the final, if it gets there.
    pub championship_host: u32,
}

impl BracketSimulator<'_> {
    /// Play the entire post-season. `seeds_by_conference` carries each
    /// conference's seven seeds in order; resolutions of slots that exist
    /// in the real schedule are appended to `resolutions` for
    /// conditional-probability tagging.
    ///
    /// # Panics
    ///
    /// Panics unless exactly two conferences of seven seeds are supplied.
    pub fn run(
        &self,
        league: &mut [TeamSimState],
        seeds_by_conference: &[(u32, Vec<u32>)],
        rng: &mut impl Rng,
        resolutions: &mut Vec<(u32, GameResolution)>,
    ) -> PlayoffOutcome {
        assert_eq!(
            seeds_by_conference.len(),
            2,
            "the bracket needs exactly two conferences"
        );
        let conferences: Vec<ConferencePlayoff> = seeds_by_conference
            .iter()
            .map(|(id, seeds)| self.run_conference(league, *id, seeds, rng, resolutions))
            .collect();

        let champion = self.championship(
            league,
            conferences[0].champion,
            conferences[1].champion,
            rng,
            resolutions,
        );
        PlayoffOutcome {
            conferences,
            champion,
        }
    }

    fn run_conference(
        &self,
        league: &mut [TeamSimState],
        conference_id: u32,
        seeds: &[u32],
        rng: &mut impl Rng,
        resolutions: &mut Vec<(u32, GameResolution)>,
    ) -> ConferencePlayoff {
        assert_eq!(seeds.len(), 7, "a conference seeds exactly seven teams");
        let seed_of = |id: u32| seeds.iter().position(|s| *s == id).expect("seeded team");

        // Wild card: 2v7, 3v6, 4v5; seed 1 rests.
        let mut wild_card_winners = [
            self.play_slot(
                league,
                ROUND_WILD_CARD,
                seeds[1],
                seeds[6],
                false,
                DEFAULT_REST_DAYS,
                DEFAULT_REST_DAYS,
                rng,
                resolutions,
            ),
            self.play_slot(
                league,
                ROUND_WILD_CARD,
                seeds[2],
                seeds[5],
                false,
                DEFAULT_REST_DAYS,
                DEFAULT_REST_DAYS,
                rng,
                resolutions,
            ),
            self.play_slot(
                league,
                ROUND_WILD_CARD,
                seeds[3],
                seeds[4],
                false,
                DEFAULT_REST_DAYS,
                DEFAULT_REST_DAYS,
                rng,
                resolutions,
            ),
        ];
        // Reseed: pairings depend on seed order, not on bracket path.
        wild_card_winners.sort_by_key(|id| seed_of(*id));

        let divisional = [
            seeds[0],
            wild_card_winners[0],
            wild_card_winners[1],
            wild_card_winners[2],
        ];
        let first = self.play_slot(
            league,
            ROUND_DIVISIONAL,
            seeds[0],
            wild_card_winners[2],
            false,
            BYE_REST_DAYS,
            DEFAULT_REST_DAYS,
            rng,
            resolutions,
        );
        let second = self.play_slot(
            league,
            ROUND_DIVISIONAL,
            wild_card_winners[0],
            wild_card_winners[1],
            false,
            DEFAULT_REST_DAYS,
            DEFAULT_REST_DAYS,
            rng,
            resolutions,
        );
        let mut conference_round = [first, second];
        conference_round.sort_by_key(|id| seed_of(*id));

        let champion = self.play_slot(
            league,
            ROUND_CONFERENCE,
            conference_round[0],
            conference_round[1],
            false,
            DEFAULT_REST_DAYS,
            DEFAULT_REST_DAYS,
            rng,
            resolutions,
        );

        ConferencePlayoff {
            conference_id,
            seeds: seeds.to_vec(),
            divisional,
            divisional_hosts: [seeds[0], wild_card_winners[0]],
            conference_round,
            champion,
        }
    }

    /// The final. Home field goes to the designated host team if it is
    /// playing; otherwise the game is at a neutral site.
    fn championship(
        &self,
        league: &mut [TeamSimState],
        first: u32,
        second: u32,
        rng: &mut impl Rng,
        resolutions: &mut Vec<(u32, GameResolution)>,
    ) -> u32 {
        let (home, away, neutral) = if first == self.championship_host {
            (first, second, false)
        } else if second == self.championship_host {
            (second, first, false)
        } else {
            (first, second, true)
        };

        // The scheduled final may list either side as home; the host logic
        // above decides the advantage, the schedule entry only anchors the
        // replay and the conditional tagging.
        let sched = self
            .schedule
            .slot(ROUND_CHAMPIONSHIP, home, away)
            .or_else(|| self.schedule.slot(ROUND_CHAMPIONSHIP, away, home));

        if let Some(game) = sched {
            match game.resolution {
                Some(GameResolution::HomeWin) => return game.home_team_id,
                Some(GameResolution::AwayWin) => return game.away_team_id,
                _ => {}
            }
        }

        let winner = simulate_playoff_game(
            league,
            home,
            away,
            neutral,
            DEFAULT_REST_DAYS,
            DEFAULT_REST_DAYS,
            rng,
        );
        if let Some(game) = sched {
            let resolution = if winner == game.home_team_id {
                GameResolution::HomeWin
            } else {
                GameResolution::AwayWin
            };
            resolutions.push((game.game_id, resolution));
        }
        winner
    }

    #[allow(clippy::too_many_arguments)]
    fn play_slot(
        &self,
        league: &mut [TeamSimState],
        round: usize,
        home_id: u32,
        away_id: u32,
        neutral: bool,
        home_rest: f64,
        away_rest: f64,
        rng: &mut impl Rng,
        resolutions: &mut Vec<(u32, GameResolution)>,
    ) -> u32 {
        if let Some(game) = self.schedule.slot(round, home_id, away_id) {
            match game.resolution {
                Some(GameResolution::HomeWin) => return home_id,
                Some(GameResolution::AwayWin) => return away_id,
                // A recorded tie cannot happen in the post-season; fall
                // through and simulate rather than invent a winner.
                _ => {}
            }
            let winner = simulate_playoff_game(
                league, home_id, away_id, neutral, home_rest, away_rest, rng,
            );
            let resolution = if winner == home_id {
                GameResolution::HomeWin
            } else {
                GameResolution::AwayWin
            };
            resolutions.push((game.game_id, resolution));
            return winner;
        }

        simulate_playoff_game(league, home_id, away_id, neutral, home_rest, away_rest, rng)
    }
}

/// Draw a post-season winner and apply rating updates to both sides, both
/// computed from the pre-game ratings.
fn simulate_playoff_game(
    league: &mut [TeamSimState],
    home_id: u32,
    away_id: u32,
    neutral: bool,
    home_rest: f64,
    away_rest: f64,
    rng: &mut impl Rng,
) -> u32 {
    let home_idx = index_of(league, home_id);
    let away_idx = index_of(league, away_id);
    let home_rating = league[home_idx].rating;
    let away_rating = league[away_idx].rating;

    let home_chance = rating::win_probability(
        home_rating,
        away_rating,
        !neutral,
        false,
        SeasonPhase::Post,
        home_rest,
        away_rest,
    );
    let home_won = rng.gen::<f64>() < home_chance;
    let (home_outcome, away_outcome) = if home_won {
        (Outcome::Win, Outcome::Loss)
    } else {
        (Outcome::Loss, Outcome::Win)
    };

    league[home_idx].rating = rating::update_rating(
        home_rating,
        away_rating,
        !neutral,
        false,
        SeasonPhase::Post,
        home_rest,
        away_rest,
        home_outcome,
    );
    league[away_idx].rating = rating::update_rating(
        away_rating,
        home_rating,
        false,
        !neutral,
        SeasonPhase::Post,
        away_rest,
        home_rest,
        away_outcome,
    );

    if home_won {
        home_id
    } else {
        away_id
    }
}

fn index_of(league: &[TeamSimState], id: u32) -> usize {
    league
        .iter()
        .position(|t| t.team_id == id)
        .expect("playoff team must exist in the league")
}
