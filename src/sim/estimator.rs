//! Turns raw trial counts into reportable probabilities.
//!
//! Two finite-sample artifacts get corrected before anything is reported:
//!
//! 1. A simulated 0% (or 100%) that the standings arithmetic says is not
//!    actually settled, because the team's magic number against the current
//!    holder of the spot is still positive, becomes `0.5 / trials` (or one
//!    minus that) instead of a hard certainty. Dependent outcomes are kept
//!    consistent: no flag stays at zero while something that requires it is
//!    positive, and the cumulative seed thresholds stay monotone.
//! 2. A probability conditioned on one imminent game's result replaces the
//!    season-long value only when it clears a two-sided margin of error for
//!    the conditioning branch's sample size; branches with no samples fall
//!    back to the unconditional value.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::SimConfig;
use crate::league::GameResolution;
use crate::sim::outcome::{Accumulator, Flag, ALL_FLAGS, FLAG_COUNT};
use crate::sim::team_state::TeamSimState;
use crate::sim::tiebreak;
use crate::snapshot::SeasonSnapshot;

/// Season-long probabilities for one team at one point in the season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamChancesRecord {
    pub team_id: u32,
    pub season: u16,
    pub week: u8,
    pub seed1: f64,
    pub seed2: f64,
    pub seed3: f64,
    pub seed4: f64,
    pub seed5: f64,
    pub seed6: f64,
    pub seed7: f64,
    pub host_wild_card: f64,
    pub host_division: f64,
    pub host_conference: f64,
    pub make_division: f64,
    pub make_conference: f64,
    pub make_super_bowl: f64,
    pub win_super_bowl: f64,
}

/// The same probabilities conditioned on each side winning one imminent
/// game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamChancesByGameRecord {
    pub game_id: u32,
    pub team_id: u32,
    pub home_seed1: f64,
    pub home_seed2: f64,
    pub home_seed3: f64,
    pub home_seed4: f64,
    pub home_seed5: f64,
    pub home_seed6: f64,
    pub home_seed7: f64,
    pub home_host_wild_card: f64,
    pub home_host_division: f64,
    pub home_host_conference: f64,
    pub home_make_division: f64,
    pub home_make_conference: f64,
    pub home_make_super_bowl: f64,
    pub home_win_super_bowl: f64,
    pub away_seed1: f64,
    pub away_seed2: f64,
    pub away_seed3: f64,
    pub away_seed4: f64,
    pub away_seed5: f64,
    pub away_seed6: f64,
    pub away_seed7: f64,
    pub away_host_wild_card: f64,
    pub away_host_division: f64,
    pub away_host_conference: f64,
    pub away_make_division: f64,
    pub away_make_conference: f64,
    pub away_make_super_bowl: f64,
    pub away_win_super_bowl: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateOutput {
    pub chances: Vec<TeamChancesRecord>,
    pub chances_by_game: Vec<TeamChancesByGameRecord>,
}

/// Reduce the accumulated counts to corrected probability records.
pub fn estimate(
    snapshot: &SeasonSnapshot,
    accumulator: &Accumulator,
    config: &SimConfig,
) -> EstimateOutput {
    let trials = accumulator.trials() as f64;
    let epsilon = 0.5 / trials;
    let week = snapshot.last_completed_week();

    let baseline = baseline_with_ranks(snapshot);
    let standings = baseline_conference_orders(snapshot, &baseline);

    // Raw frequencies, then the consistency pass per team.
    let mut chances: Vec<[f64; FLAG_COUNT]> = Vec::with_capacity(snapshot.teams.len());
    for (team_index, team) in snapshot.teams.iter().enumerate() {
        let mut team_chances = [0.0; FLAG_COUNT];
        for flag in ALL_FLAGS {
            team_chances[flag.index()] = accumulator.count(team_index, flag) as f64 / trials;
        }

        let state = &baseline[team_index];
        let order = &standings[&team.conference_id];
        correct_seed_certainties(
            &mut team_chances,
            state,
            order,
            &baseline,
            config.games_per_season,
            epsilon,
        );
        enforce_seed_monotonicity(&mut team_chances);
        cascade_prerequisites(&mut team_chances, epsilon);
        enforce_seed_monotonicity(&mut team_chances);

        chances.push(team_chances);
    }

    let records = snapshot
        .teams
        .iter()
        .enumerate()
        .map(|(team_index, team)| {
            team_record(team.id, snapshot.season, week, &chances[team_index])
        })
        .collect();

    // Conditional records, margin-of-error gated against the unconditional
    // values.
    let imminent = snapshot.imminent_game_ids();
    let mut by_game = Vec::with_capacity(snapshot.teams.len() * imminent.len());
    for (team_index, team) in snapshot.teams.iter().enumerate() {
        for (game_index, game_id) in imminent.iter().enumerate() {
            let branch = accumulator.branch(game_index);
            let mut home = [0.0; FLAG_COUNT];
            let mut away = [0.0; FLAG_COUNT];
            for flag in ALL_FLAGS {
                let unconditional = chances[team_index][flag.index()];
                home[flag.index()] = conditional_probability(
                    unconditional,
                    accumulator.conditional_count(
                        team_index,
                        game_index,
                        flag,
                        GameResolution::HomeWin,
                    ),
                    branch.home_wins,
                    config.confidence_z,
                );
                away[flag.index()] = conditional_probability(
                    unconditional,
                    accumulator.conditional_count(
                        team_index,
                        game_index,
                        flag,
                        GameResolution::AwayWin,
                    ),
                    branch.away_wins,
                    config.confidence_z,
                );
            }
            by_game.push(by_game_record(*game_id, team.id, &home, &away));
        }
    }

    EstimateOutput {
        chances: records,
        chances_by_game: by_game,
    }
}

/// Baseline states with division ranks assigned from recorded results.
/// The rng only matters where the baseline standings are genuinely tied,
/// and a fixed seed keeps the correction itself reproducible.
fn baseline_with_ranks(snapshot: &SeasonSnapshot) -> Vec<TeamSimState> {
    let mut baseline = snapshot.baseline_states();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    for division in &snapshot.divisions {
        let order = tiebreak::order_division(&baseline, division.id, &mut rng);
        for (rank, id) in order.iter().enumerate() {
            let index = baseline.iter().position(|t| t.team_id == *id).unwrap();
            baseline[index].division_rank = rank as u8;
        }
    }
    baseline
}

fn baseline_conference_orders(
    snapshot: &SeasonSnapshot,
    baseline: &[TeamSimState],
) -> HashMap<u32, Vec<u32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    snapshot
        .conferences
        .iter()
        .map(|c| (c.id, tiebreak::order_conference(baseline, c.id, &mut rng)))
        .collect()
}

/// Replace impossible hard 0s/1s on the seed thresholds, judged by magic
/// numbers against the baseline holder of each spot. Once both sides have
/// played out their schedules the standings between them are frozen and
/// the simulated frequency is exact, so no softening applies; the magic
/// number alone cannot see division-leader protection.
fn correct_seed_certainties(
    chances: &mut [f64; FLAG_COUNT],
    team: &TeamSimState,
    conference_order: &[u32],
    baseline: &[TeamSimState],
    games_per_season: u32,
    epsilon: f64,
) {
    let state_of = |id: u32| {
        baseline
            .iter()
            .find(|t| t.team_id == id)
            .expect("standings hold only known teams")
    };
    let frozen_against = |rival: &TeamSimState| {
        team.games_remaining(games_per_season) <= 0 && rival.games_remaining(games_per_season) <= 0
    };

    for threshold in 1..=7usize {
        let slot = Flag::seed(threshold).index();
        if chances[slot] == 0.0 {
            let holder = state_of(conference_order[threshold - 1]);
            let eliminated =
                frozen_against(holder) || team.magic_number(holder, games_per_season) <= 0.0;
            if !eliminated {
                chances[slot] = epsilon;
            }
        } else if chances[slot] == 1.0 {
            let clinched = match conference_order.get(threshold) {
                Some(challenger_id) => {
                    let challenger = state_of(*challenger_id);
                    frozen_against(challenger)
                        || challenger.magic_number(team, games_per_season) <= 0.0
                }
                // Nobody left to take the spot away.
                None => true,
            };
            if !clinched {
                chances[slot] = 1.0 - epsilon;
            }
        }
    }
}

/// Cumulative thresholds: finishing seed ≤ k implies finishing seed ≤ k+1.
fn enforce_seed_monotonicity(chances: &mut [f64; FLAG_COUNT]) {
    for threshold in 1..7usize {
        let lower = chances[Flag::seed(threshold).index()];
        let upper = &mut chances[Flag::seed(threshold + 1).index()];
        if *upper < lower {
            *upper = lower;
        }
    }
}

/// No dependent outcome may stay positive while its prerequisite sits at
/// exactly zero; raise the prerequisite to the epsilon floor instead.
pub(crate) fn cascade_prerequisites(chances: &mut [f64; FLAG_COUNT], epsilon: f64) {
    const CHAIN: [(Flag, Flag); 7] = [
        (Flag::WinSuperBowl, Flag::MakeSuperBowl),
        (Flag::MakeSuperBowl, Flag::MakeConference),
        (Flag::HostConference, Flag::MakeConference),
        (Flag::MakeConference, Flag::MakeDivision),
        (Flag::HostDivision, Flag::MakeDivision),
        (Flag::MakeDivision, Flag::Seed7),
        (Flag::HostWildCard, Flag::Seed4),
    ];
    for (dependent, prerequisite) in CHAIN {
        if chances[dependent.index()] > 0.0 && chances[prerequisite.index()] == 0.0 {
            chances[prerequisite.index()] = epsilon;
        }
    }
}

/// The conditional estimate for one branch, or the unconditional value
/// when the branch has no samples or the difference is within the margin
/// of error `z·sqrt(p(1−p)/n)`.
pub(crate) fn conditional_probability(
    unconditional: f64,
    count: u64,
    branch_trials: u64,
    z: f64,
) -> f64 {
    if branch_trials == 0 {
        return unconditional;
    }
    let conditional = count as f64 / branch_trials as f64;
    let margin =
        z * (unconditional * (1.0 - unconditional) / branch_trials as f64).sqrt();
    if (conditional - unconditional).abs() > margin {
        conditional
    } else {
        unconditional
    }
}

fn team_record(team_id: u32, season: u16, week: u8, c: &[f64; FLAG_COUNT]) -> TeamChancesRecord {
    TeamChancesRecord {
        team_id,
        season,
        week,
        seed1: c[Flag::Seed1.index()],
        seed2: c[Flag::Seed2.index()],
        seed3: c[Flag::Seed3.index()],
        seed4: c[Flag::Seed4.index()],
        seed5: c[Flag::Seed5.index()],
        seed6: c[Flag::Seed6.index()],
        seed7: c[Flag::Seed7.index()],
        host_wild_card: c[Flag::HostWildCard.index()],
        host_division: c[Flag::HostDivision.index()],
        host_conference: c[Flag::HostConference.index()],
        make_division: c[Flag::MakeDivision.index()],
        make_conference: c[Flag::MakeConference.index()],
        make_super_bowl: c[Flag::MakeSuperBowl.index()],
        win_super_bowl: c[Flag::WinSuperBowl.index()],
    }
}

fn by_game_record(
    game_id: u32,
    team_id: u32,
    home: &[f64; FLAG_COUNT],
    away: &[f64; FLAG_COUNT],
) -> TeamChancesByGameRecord {
    TeamChancesByGameRecord {
        game_id,
        team_id,
        home_seed1: home[Flag::Seed1.index()],
        home_seed2: home[Flag::Seed2.index()],
        home_seed3: home[Flag::Seed3.index()],
        home_seed4: home[Flag::Seed4.index()],
        home_seed5: home[Flag::Seed5.index()],
        home_seed6: home[Flag::Seed6.index()],
        home_seed7: home[Flag::Seed7.index()],
        home_host_wild_card: home[Flag::HostWildCard.index()],
        home_host_division: home[Flag::HostDivision.index()],
        home_host_conference: home[Flag::HostConference.index()],
        home_make_division: home[Flag::MakeDivision.index()],
        home_make_conference: home[Flag::MakeConference.index()],
        home_make_super_bowl: home[Flag::MakeSuperBowl.index()],
        home_win_super_bowl: home[Flag::WinSuperBowl.index()],
        away_seed1: away[Flag::Seed1.index()],
        away_seed2: away[Flag::Seed2.index()],
        away_seed3: away[Flag::Seed3.index()],
        away_seed4: away[Flag::Seed4.index()],
        away_seed5: away[Flag::Seed5.index()],
        away_seed6: away[Flag::Seed6.index()],
        away_seed7: away[Flag::Seed7.index()],
        away_host_wild_card: away[Flag::HostWildCard.index()],
        away_host_division: away[Flag::HostDivision.index()],
        away_host_conference: away[Flag::HostConference.index()],
        away_make_division: away[Flag::MakeDivision.index()],
        away_make_conference: away[Flag::MakeConference.index()],
        away_make_super_bowl: away[Flag::MakeSuperBowl.index()],
        away_win_super_bowl: away[Flag::WinSuperBowl.index()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_branch_reports_the_unconditional_value() {
        assert_relative_eq!(conditional_probability(0.4, 0, 0, 2.576), 0.4);
    }

    #[test]
    fn conditional_inside_the_margin_is_suppressed() {
        // p = 0.5, n = 100 → margin ≈ 0.129; 54/100 differs by 0.04.
        assert_relative_eq!(conditional_probability(0.5, 54, 100, 2.576), 0.5);
    }

    #[test]
    fn conditional_outside_the_margin_overrides() {
        // 80/100 differs by 0.30, well past the margin.
        assert_relative_eq!(conditional_probability(0.5, 80, 100, 2.576), 0.8);
    }

    #[test]
    fn cascade_raises_zero_prerequisites() {
        let mut chances = [0.0; FLAG_COUNT];
        chances[Flag::WinSuperBowl.index()] = 0.25;
        cascade_prerequisites(&mut chances, 1e-4);
        assert!(chances[Flag::MakeSuperBowl.index()] > 0.0);
        assert!(chances[Flag::MakeConference.index()] > 0.0);
        assert!(chances[Flag::MakeDivision.index()] > 0.0);
        assert!(chances[Flag::Seed7.index()] > 0.0);
    }

    #[test]
    fn cascade_leaves_consistent_values_alone() {
        let mut chances = [0.0; FLAG_COUNT];
        chances[Flag::Seed7.index()] = 0.5;
        chances[Flag::MakeDivision.index()] = 0.2;
        let before = chances;
        cascade_prerequisites(&mut chances, 1e-4);
        assert_eq!(before, chances);
    }

    #[test]
    fn monotonicity_lifts_higher_thresholds() {
        let mut chances = [0.0; FLAG_COUNT];
        chances[Flag::Seed3.index()] = 0.3;
        enforce_seed_monotonicity(&mut chances);
        assert_relative_eq!(chances[Flag::Seed4.index()], 0.3);
        assert_relative_eq!(chances[Flag::Seed7.index()], 0.3);
        assert_relative_eq!(chances[Flag::Seed2.index()], 0.0);
    }
}
