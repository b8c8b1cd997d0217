//! Pairwise rating model: win probability and post-game rating updates.
//!
//! Ratings follow the classic logistic (base-10, 400-point) curve with three
//! league-specific adjustments, each calibrated from historical game data:
//! a flat home-field bonus, a rest-day ("short week") bias, and a
//! phase-dependent weight on the rating differential (pre-season games are
//! noisier than the regular season, playoff games considerably less so).

use crate::league::{SeasonPhase, AVG_RATING};

/// Home-field advantage expressed in rating points.
const HOME_BIAS: f64 = 44.3;
/// Empirical share of regular-season games that end in a tie.
const TIE_CHANCE: f64 = 0.002419215;
/// Rest-day bias slope (rating points per day of rest).
const BREAK_C: f64 = 4.843299;
/// Rest-day bias intercept.
const BREAK_B: f64 = -30.362724;
/// Fixed K-factor for rating updates.
const K: f64 = 29.0;
/// Rating-differential weight in pre-season play.
const PRE_MULT: f64 = 0.7;
/// Rating-differential weight in post-season play.
const POST_MULT: f64 = 2.1;
/// Off-season regression factor toward the league average.
const EQUALIZE_MULT: f64 = 2.0 / 3.0;

/// Rest value substituted when a side's true rest is unknown or long enough
/// (opening week, coming off a bye) that the linear bias would distort it.
pub const DEFAULT_REST_DAYS: f64 = 7.0;
/// Rest values at or beyond this many days fall back to [`DEFAULT_REST_DAYS`].
pub const REST_CLAMP_DAYS: f64 = 20.0;

/// Result of a game from one side's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

impl Outcome {
    /// Actual score used by the rating update: win 1, loss 0, tie ½.
    fn actual_score(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Loss => 0.0,
            Outcome::Tie => 0.5,
        }
    }
}

fn rest_bias(days: f64) -> f64 {
    let days = if days >= REST_CLAMP_DAYS {
        DEFAULT_REST_DAYS
    } else {
        days
    };
    BREAK_C * days + BREAK_B
}

/// Probability that the first side wins.
///
/// The returned value already excludes the tie mass: in the regular and
/// pre-season, `win_probability(a, b, ..) + win_probability(b, a, ..)`
/// sums to `1 − TIE_CHANCE`, and the remainder is the chance of a tie.
/// Post-season games cannot tie and the two sides sum to 1.
///
/// # Panics
///
/// Panics if both sides claim home advantage; that is a scheduling bug in
/// the caller, not a recoverable condition.
#[allow(clippy::too_many_arguments)]
pub fn win_probability(
    rating: f64,
    opp_rating: f64,
    home_advantage: bool,
    opp_home_advantage: bool,
    phase: SeasonPhase,
    rest_days: f64,
    opp_rest_days: f64,
) -> f64 {
    assert!(
        !(home_advantage && opp_home_advantage),
        "both teams cannot have home-field advantage in the same game"
    );

    let biased = rating
        + if home_advantage { HOME_BIAS } else { 0.0 }
        + rest_bias(rest_days);
    let opp_biased = opp_rating
        + if opp_home_advantage { HOME_BIAS } else { 0.0 }
        + rest_bias(opp_rest_days);

    let not_tie = match phase {
        SeasonPhase::Post => 1.0,
        _ => 1.0 - TIE_CHANCE,
    };
    let multiplier = match phase {
        SeasonPhase::Pre => PRE_MULT,
        SeasonPhase::Regular => 1.0,
        SeasonPhase::Post => POST_MULT,
    };

    let diff = multiplier * (opp_biased - biased);
    not_tie * (1.0 / (1.0 + 10f64.powf(diff / 400.0)))
}

/// New rating for the first side after a game with the given outcome.
///
/// Fixed-K update against the expected score from [`win_probability`]:
/// `rating + K × (actual − expected)`.
#[allow(clippy::too_many_arguments)]
pub fn update_rating(
    rating: f64,
    opp_rating: f64,
    home_advantage: bool,
    opp_home_advantage: bool,
    phase: SeasonPhase,
    rest_days: f64,
    opp_rest_days: f64,
    outcome: Outcome,
) -> f64 {
    let expected = win_probability(
        rating,
        opp_rating,
        home_advantage,
        opp_home_advantage,
        phase,
        rest_days,
        opp_rest_days,
    );
    rating + K * (outcome.actual_score() - expected)
}

/// Shrink a rating toward the league average by a fixed fraction.
///
/// Applied once per team after a gap of more than 90 days between games
/// (the off-season), modeling roster churn between seasons. The gap check
/// belongs to the rating-history updater; only the formula lives here.
pub fn equalize(rating: f64) -> f64 {
    (rating - AVG_RATING) * EQUALIZE_MULT + AVG_RATING
}
