//! Monte Carlo driver: plays the remaining season to completion, many
//! thousands of times.
//!
//! Each trial clones the baseline team states, walks every unplayed game in
//! chronological order (pre-season first, then the regular season), draws
//! outcomes from the rating model, seeds both conferences through the
//! tie-breaker, runs the playoff bracket, and folds the resulting flags
//! into an accumulator. Trials are independent, so they run on a
//! fixed-size worker pool: each worker owns a disjoint batch of trial
//! indices, its own deterministically-seeded rng stream, and a local
//! accumulator; the locals are summed once every batch finishes. The only
//! state shared while running is a progress counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::config::SimConfig;
use crate::league::{Game, GameResolution, SeasonPhase, PLAYOFF_SEEDS};
use crate::sim::bracket::{BracketSimulator, PlayoffSchedule};
use crate::sim::outcome::{Accumulator, Flag, TrialOutcome};
use crate::sim::rating;
use crate::sim::team_state::TeamSimState;
use crate::sim::tiebreak;
use crate::snapshot::{SeasonSnapshot, SnapshotError};

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("failed to build the worker pool: {0}")]
    WorkerPool(String),
}

/// Everything a trial needs, computed once per run and shared read-only
/// across workers.
pub struct TrialPlan {
    baseline: Vec<TeamSimState>,
    team_index: HashMap<u32, usize>,
    unplayed_pre: Vec<Game>,
    unplayed_regular: Vec<Game>,
    playoff_schedule: PlayoffSchedule,
    division_ids: Vec<u32>,
    conference_ids: Vec<u32>,
    /// Imminent game id → tracked index for conditional counting.
    imminent_index: HashMap<u32, usize>,
    imminent_count: usize,
    championship_host: u32,
}

impl TrialPlan {
    pub fn new(snapshot: &SeasonSnapshot, championship_host: u32) -> Self {
        let baseline = snapshot.baseline_states();
        let team_index = baseline
            .iter()
            .enumerate()
            .map(|(index, state)| (state.team_id, index))
            .collect();

        let mut unplayed_pre: Vec<Game> = snapshot
            .games
            .iter()
            .filter(|g| g.phase == SeasonPhase::Pre && !g.is_played())
            .cloned()
            .collect();
        unplayed_pre.sort_by_key(|g| (g.start_time, g.id));
        let mut unplayed_regular: Vec<Game> = snapshot
            .games
            .iter()
            .filter(|g| g.phase == SeasonPhase::Regular && !g.is_played())
            .cloned()
            .collect();
        unplayed_regular.sort_by_key(|g| (g.start_time, g.id));

        let playoff_schedule = PlayoffSchedule::from_games(
            snapshot.games.iter().filter(|g| g.phase == SeasonPhase::Post),
        );

        let imminent = snapshot.imminent_game_ids();
        let imminent_count = imminent.len();
        let imminent_index = imminent
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id, index))
            .collect();

        TrialPlan {
            baseline,
            team_index,
            unplayed_pre,
            unplayed_regular,
            playoff_schedule,
            division_ids: snapshot.divisions.iter().map(|d| d.id).collect(),
            conference_ids: snapshot.conferences.iter().map(|c| c.id).collect(),
            imminent_index,
            imminent_count,
            championship_host,
        }
    }

    pub fn team_count(&self) -> usize {
        self.baseline.len()
    }

    pub fn tracked_game_count(&self) -> usize {
        self.imminent_count
    }
}

/// Run the full set of trials and return the merged counts.
pub fn run(snapshot: &SeasonSnapshot, config: &SimConfig) -> Result<Accumulator, SimError> {
    snapshot.validate()?;
    let plan = TrialPlan::new(snapshot, config.super_bowl_host);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| SimError::WorkerPool(e.to_string()))?;

    let total = config.total_trials;
    let workers = pool.current_num_threads().max(1) as u64;
    let base_seed = config.seed.unwrap_or_else(rand::random);
    let batch = total.div_ceil(workers);
    info!(
        trials = total,
        workers,
        seed = base_seed,
        "simulating remaining season"
    );

    let progress = AtomicU64::new(0);
    let progress_step = (total / 20).max(1);

    let accumulator = pool.install(|| {
        (0..workers)
            .into_par_iter()
            .map(|worker| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(worker));
                let mut local = Accumulator::new(plan.team_count(), plan.tracked_game_count());
                let first = worker * batch;
                let last = (first + batch).min(total);
                for _ in first..last {
                    let (trial, _) = simulate_trial(&plan, &mut rng);
                    local.record(&trial);
                    let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % progress_step == 0 {
                        info!("simulated {done}/{total} seasons");
                    }
                }
                local
            })
            .reduce(
                || Accumulator::new(plan.team_count(), plan.tracked_game_count()),
                Accumulator::merge,
            )
    });

    Ok(accumulator)
}

/// Play one season to completion. Returns the trial's flags and the final
/// team states (the latter mostly for tests; callers normally keep only
/// the flags).
pub(crate) fn simulate_trial(
    plan: &TrialPlan,
    rng: &mut impl Rng,
) -> (TrialOutcome, Vec<TeamSimState>) {
    let mut states = plan.baseline.clone();
    let mut trial = TrialOutcome::new(plan.team_count(), plan.tracked_game_count());

    // Pre-season games move ratings and rest but never the standings.
    for game in &plan.unplayed_pre {
        let resolution = resolve_game(plan, &mut states, game, false, rng);
        track_resolution(plan, &mut trial, game.id, resolution);
    }
    for game in &plan.unplayed_regular {
        let resolution = resolve_game(plan, &mut states, game, true, rng);
        track_resolution(plan, &mut trial, game.id, resolution);
    }

    let seeds_by_conference = seed_conferences(plan, &mut states, &mut trial, rng);

    let simulator = BracketSimulator {
        schedule: &plan.playoff_schedule,
        championship_host: plan.championship_host,
    };
    let mut slot_resolutions = Vec::new();
    let playoff = simulator.run(&mut states, &seeds_by_conference, rng, &mut slot_resolutions);

    for conference in &playoff.conferences {
        for id in conference.divisional {
            trial.set(plan.team_index[&id], Flag::MakeDivision);
        }
        for id in conference.divisional_hosts {
            trial.set(plan.team_index[&id], Flag::HostDivision);
        }
        for id in conference.conference_round {
            trial.set(plan.team_index[&id], Flag::MakeConference);
        }
        trial.set(
            plan.team_index[&conference.conference_round[0]],
            Flag::HostConference,
        );
        trial.set(plan.team_index[&conference.champion], Flag::MakeSuperBowl);
    }
    trial.set(plan.team_index[&playoff.champion], Flag::WinSuperBowl);

    for (game_id, resolution) in slot_resolutions {
        track_resolution(plan, &mut trial, game_id, resolution);
    }

    (trial, states)
}

/// Order both conferences, assign division ranks and seeds, and set the
/// seeding flags (cumulative seed thresholds plus wild-card hosting).
fn seed_conferences(
    plan: &TrialPlan,
    states: &mut [TeamSimState],
    trial: &mut TrialOutcome,
    rng: &mut impl Rng,
) -> Vec<(u32, Vec<u32>)> {
    for division_id in &plan.division_ids {
        let order = tiebreak::order_division(states, *division_id, rng);
        for (rank, id) in order.iter().enumerate() {
            states[plan.team_index[id]].division_rank = rank as u8;
        }
    }

    let mut seeds_by_conference = Vec::with_capacity(plan.conference_ids.len());
    for conference_id in &plan.conference_ids {
        let order = tiebreak::order_conference(states, *conference_id, rng);
        let seeded: Vec<u32> = order[..PLAYOFF_SEEDS].to_vec();
        for (position, id) in seeded.iter().enumerate() {
            let index = plan.team_index[id];
            states[index].seed = position as u8 + 1;
            for threshold in (position + 1)..=PLAYOFF_SEEDS {
                trial.set(index, Flag::seed(threshold));
            }
            // Seeds 2-4 host a wild-card game.
            if (1..=3).contains(&position) {
                trial.set(index, Flag::HostWildCard);
            }
        }
        seeds_by_conference.push((*conference_id, seeded));
    }
    seeds_by_conference
}

/// Replay-or-draw one scheduled game. Unplayed games draw an outcome from
/// the rating model and update both ratings from their pre-game values;
/// the standings lists move only for regular-season games.
fn resolve_game(
    plan: &TrialPlan,
    states: &mut [TeamSimState],
    game: &Game,
    counts_in_standings: bool,
    rng: &mut impl Rng,
) -> GameResolution {
    let home = plan.team_index[&game.home_team_id];
    let away = plan.team_index[&game.away_team_id];
    let home_rest = states[home].rest_days_before(game.start_time);
    let away_rest = states[away].rest_days_before(game.start_time);
    let home_rating = states[home].rating;
    let away_rating = states[away].rating;

    let home_chance = rating::win_probability(
        home_rating,
        away_rating,
        !game.neutral_site,
        false,
        game.phase,
        home_rest,
        away_rest,
    );
    let away_chance = rating::win_probability(
        away_rating,
        home_rating,
        false,
        !game.neutral_site,
        game.phase,
        away_rest,
        home_rest,
    );

    let draw = rng.gen::<f64>();
    let resolution = if draw < home_chance {
        GameResolution::HomeWin
    } else if draw < home_chance + away_chance {
        GameResolution::AwayWin
    } else {
        GameResolution::Tie
    };

    let (home_outcome, away_outcome) = match resolution {
        GameResolution::HomeWin => (rating::Outcome::Win, rating::Outcome::Loss),
        GameResolution::AwayWin => (rating::Outcome::Loss, rating::Outcome::Win),
        GameResolution::Tie => (rating::Outcome::Tie, rating::Outcome::Tie),
    };

    if counts_in_standings {
        match resolution {
            GameResolution::HomeWin => {
                states[home].record_win(game.away_team_id);
                states[away].record_loss(game.home_team_id);
            }
            GameResolution::AwayWin => {
                states[home].record_loss(game.away_team_id);
                states[away].record_win(game.home_team_id);
            }
            GameResolution::Tie => {
                states[home].record_tie(game.away_team_id);
                states[away].record_tie(game.home_team_id);
            }
        }
    }

    states[home].rating = rating::update_rating(
        home_rating,
        away_rating,
        !game.neutral_site,
        false,
        game.phase,
        home_rest,
        away_rest,
        home_outcome,
    );
    states[away].rating = rating::update_rating(
        away_rating,
        home_rating,
        false,
        !game.neutral_site,
        game.phase,
        away_rest,
        home_rest,
        away_outcome,
    );
    states[home].last_game = Some(game.start_time);
    states[away].last_game = Some(game.start_time);

    resolution
}

fn track_resolution(
    plan: &TrialPlan,
    trial: &mut TrialOutcome,
    game_id: u32,
    resolution: GameResolution,
) {
    if let Some(index) = plan.imminent_index.get(&game_id) {
        trial.set_resolution(*index, resolution);
    }
}
