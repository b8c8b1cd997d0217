//! Playoff-seeding tie-breaker.
//!
//! Orders teams the way the league's seeding procedure does: by win
//! percentage first, then through an ordered pipeline of tie-breaking
//! criteria applied to the set of teams still tied. Each criterion keeps
//! only the candidates with the best value; when that narrows the set, the
//! pipeline restarts from the top on the survivors, and when every
//! deterministic criterion has been exhausted the spot falls to a uniform
//! coin toss. (The league would break such ties with point-total criteria;
//! this simulator generates outcomes rather than scores, so the toss stands
//! in for them deliberately.)
//!
//! The pipeline-with-narrowing loop replaces a mutually recursive
//! formulation of the same rules, bounding the work per tied group without
//! changing which team survives each level.
//!
//! Two orderings exist: within a division, and within a conference. The
//! conference ordering ranks division leaders strictly ahead of everyone
//! else and adds two rules of its own: a tied group never contains two
//! teams from one division (the better-ranked one represents the division
//! until it is placed), and groups of three or more first look for a team
//! that beat, or lost to, every other team in the group.

use std::collections::HashSet;

use rand::Rng;

use crate::sim::team_state::TeamSimState;

/// Which rule set a tied group is resolved under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Division,
    Conference,
}

#[derive(Debug, Clone, Copy)]
enum Criterion {
    /// Win percentage in games among the tied teams only.
    HeadToHead,
    /// Win percentage against the team's own division.
    DivisionRecord,
    /// Win percentage against opponents common to every tied team; only
    /// applies when at least four such opponents exist.
    CommonOpponents,
    /// Win percentage against the team's conference.
    ConferenceRecord,
    StrengthOfVictory,
    StrengthOfSchedule,
}

const DIVISION_PIPELINE: &[Criterion] = &[
    Criterion::HeadToHead,
    Criterion::DivisionRecord,
    Criterion::CommonOpponents,
    Criterion::ConferenceRecord,
    Criterion::StrengthOfVictory,
    Criterion::StrengthOfSchedule,
];

const CONFERENCE_PIPELINE: &[Criterion] = &[
    Criterion::HeadToHead,
    Criterion::ConferenceRecord,
    Criterion::CommonOpponents,
    Criterion::StrengthOfVictory,
    Criterion::StrengthOfSchedule,
];

/// Minimum number of shared opponents before the common-opponents
/// criterion may discriminate.
const COMMON_OPPONENT_FLOOR: usize = 4;

/// Full seeding order of one division, best first.
///
/// # Panics
///
/// Panics if the division has no teams in `league`.
pub fn order_division(league: &[TeamSimState], division_id: u32, rng: &mut impl Rng) -> Vec<u32> {
    let ids: Vec<u32> = league
        .iter()
        .filter(|t| t.division_id == division_id)
        .map(|t| t.team_id)
        .collect();
    assert!(!ids.is_empty(), "cannot order an empty division");
    order_by_percentage(league, ids, Scope::Division, rng)
}

/// Full seeding order of one conference, best first.
///
/// Division leaders come first regardless of record, so callers must have
/// assigned `division_rank` (via [`order_division`]) beforehand.
///
/// # Panics
///
/// Panics if the conference has no teams in `league`.
pub fn order_conference(
    league: &[TeamSimState],
    conference_id: u32,
    rng: &mut impl Rng,
) -> Vec<u32> {
    let members: Vec<&TeamSimState> = league
        .iter()
        .filter(|t| t.conference_id == conference_id)
        .collect();
    assert!(!members.is_empty(), "cannot order an empty conference");

    let leaders: Vec<u32> = members
        .iter()
        .filter(|t| t.division_rank == 0)
        .map(|t| t.team_id)
        .collect();
    let rest: Vec<u32> = members
        .iter()
        .filter(|t| t.division_rank != 0)
        .map(|t| t.team_id)
        .collect();

    let mut ordered = order_by_percentage(league, leaders, Scope::Conference, rng);
    ordered.extend(order_by_percentage(league, rest, Scope::Conference, rng));
    ordered
}

/// Sort by overall win percentage, resolving each group of exactly-tied
/// teams through the scope's tie-break rules.
fn order_by_percentage(
    league: &[TeamSimState],
    mut ids: Vec<u32>,
    scope: Scope,
    rng: &mut impl Rng,
) -> Vec<u32> {
    let pct = |id: u32| state(league, id).win_percentage();
    ids.sort_by(|a, b| {
        pct(*b)
            .partial_cmp(&pct(*a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ordered = Vec::with_capacity(ids.len());
    let mut i = 0;
    while i < ids.len() {
        let mut j = i + 1;
        while j < ids.len() && pct(ids[j]) == pct(ids[i]) {
            j += 1;
        }
        if j - i == 1 {
            ordered.push(ids[i]);
        } else {
            ordered.extend(order_tied_group(league, ids[i..j].to_vec(), scope, rng));
        }
        i = j;
    }
    ordered
}

/// Fully order one tied group by repeatedly extracting its best team.
/// The tie-break context (head-to-head sets, division representatives)
/// shrinks with each extraction, so the group is re-resolved every round.
fn order_tied_group(
    league: &[TeamSimState],
    mut remaining: Vec<u32>,
    scope: Scope,
    rng: &mut impl Rng,
) -> Vec<u32> {
    let mut ordered = Vec::with_capacity(remaining.len());
    while remaining.len() > 1 {
        let winner = match scope {
            Scope::Division => division_group_winner(league, &remaining, rng),
            Scope::Conference => conference_group_winner(league, &remaining, rng),
        };
        ordered.push(winner);
        remaining.retain(|id| *id != winner);
    }
    ordered.extend(remaining);
    ordered
}

fn division_group_winner(league: &[TeamSimState], group: &[u32], rng: &mut impl Rng) -> u32 {
    run_pipeline(league, group.to_vec(), DIVISION_PIPELINE, rng)
}

fn conference_group_winner(league: &[TeamSimState], group: &[u32], rng: &mut impl Rng) -> u32 {
    let mut candidates = division_representatives(league, group);

    'outer: loop {
        if candidates.len() == 1 {
            return candidates[0];
        }

        if candidates.len() > 2 {
            if let Some(winner) = beat_every_other(league, &candidates) {
                return winner;
            }
            if let Some(loser) = lost_to_every_other(league, &candidates) {
                candidates.retain(|id| *id != loser);
                continue 'outer;
            }
        }

        for &criterion in CONFERENCE_PIPELINE {
            match narrow(league, &candidates, criterion) {
                Narrowed::Winner(id) => return id,
                Narrowed::Survivors(survivors) => {
                    candidates = survivors;
                    continue 'outer;
                }
                Narrowed::NoChange => {}
            }
        }

        return coin_toss(&candidates, rng);
    }
}

fn run_pipeline(
    league: &[TeamSimState],
    mut candidates: Vec<u32>,
    pipeline: &[Criterion],
    rng: &mut impl Rng,
) -> u32 {
    'outer: loop {
        if candidates.len() == 1 {
            return candidates[0];
        }
        for &criterion in pipeline {
            match narrow(league, &candidates, criterion) {
                Narrowed::Winner(id) => return id,
                Narrowed::Survivors(survivors) => {
                    candidates = survivors;
                    continue 'outer;
                }
                Narrowed::NoChange => {}
            }
        }
        return coin_toss(&candidates, rng);
    }
}

enum Narrowed {
    Winner(u32),
    Survivors(Vec<u32>),
    NoChange,
}

fn narrow(league: &[TeamSimState], candidates: &[u32], criterion: Criterion) -> Narrowed {
    let Some(values) = evaluate(league, candidates, criterion) else {
        return Narrowed::NoChange;
    };
    let best = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let survivors: Vec<u32> = candidates
        .iter()
        .zip(&values)
        .filter(|(_, v)| **v == best)
        .map(|(id, _)| *id)
        .collect();
    if survivors.len() == 1 {
        Narrowed::Winner(survivors[0])
    } else if survivors.len() < candidates.len() {
        Narrowed::Survivors(survivors)
    } else {
        Narrowed::NoChange
    }
}

fn evaluate(
    league: &[TeamSimState],
    candidates: &[u32],
    criterion: Criterion,
) -> Option<Vec<f64>> {
    match criterion {
        Criterion::HeadToHead => Some(
            candidates
                .iter()
                .map(|id| state(league, *id).win_percentage_against(candidates))
                .collect(),
        ),
        Criterion::DivisionRecord => {
            let division_id = state(league, candidates[0]).division_id;
            let division: Vec<u32> = league
                .iter()
                .filter(|t| t.division_id == division_id)
                .map(|t| t.team_id)
                .collect();
            Some(
                candidates
                    .iter()
                    .map(|id| state(league, *id).win_percentage_against(&division))
                    .collect(),
            )
        }
        Criterion::CommonOpponents => {
            let common = common_opponents(league, candidates);
            if common.len() < COMMON_OPPONENT_FLOOR {
                return None;
            }
            Some(
                candidates
                    .iter()
                    .map(|id| state(league, *id).win_percentage_against(&common))
                    .collect(),
            )
        }
        Criterion::ConferenceRecord => {
            let conference_id = state(league, candidates[0]).conference_id;
            let conference: Vec<u32> = league
                .iter()
                .filter(|t| t.conference_id == conference_id)
                .map(|t| t.team_id)
                .collect();
            Some(
                candidates
                    .iter()
                    .map(|id| state(league, *id).win_percentage_against(&conference))
                    .collect(),
            )
        }
        Criterion::StrengthOfVictory => Some(
            candidates
                .iter()
                .map(|id| state(league, *id).strength_of_victory(league))
                .collect(),
        ),
        Criterion::StrengthOfSchedule => Some(
            candidates
                .iter()
                .map(|id| state(league, *id).strength_of_schedule(league))
                .collect(),
        ),
    }
}

/// Opponent ids every candidate has faced.
fn common_opponents(league: &[TeamSimState], candidates: &[u32]) -> Vec<u32> {
    let mut iter = candidates.iter();
    let first = iter.next().expect("tied group is never empty");
    let mut common = opponent_set(state(league, *first));
    for id in iter {
        let theirs = opponent_set(state(league, *id));
        common.retain(|opp| theirs.contains(opp));
    }
    common.into_iter().collect()
}

fn opponent_set(team: &TeamSimState) -> HashSet<u32> {
    let mut set: HashSet<u32> = team.beaten_opponents().iter().copied().collect();
    set.extend(team.lost_to_opponents().iter().copied());
    set.extend(team.tied_opponents().iter().copied());
    set
}

/// When a tied group holds several teams from one division, only the
/// best-ranked of them competes; the rest wait for it to be placed.
fn division_representatives(league: &[TeamSimState], group: &[u32]) -> Vec<u32> {
    let mut divisions_seen: Vec<u32> = Vec::new();
    let mut has_duplicates = false;
    for id in group {
        let div = state(league, *id).division_id;
        if divisions_seen.contains(&div) {
            has_duplicates = true;
        } else {
            divisions_seen.push(div);
        }
    }
    if !has_duplicates {
        return group.to_vec();
    }

    divisions_seen
        .into_iter()
        .map(|div| {
            group
                .iter()
                .copied()
                .filter(|id| state(league, *id).division_id == div)
                .min_by_key(|id| state(league, *id).division_rank)
                .expect("division came from this group")
        })
        .collect()
}

/// A team that beat every other candidate wins the group outright.
fn beat_every_other(league: &[TeamSimState], candidates: &[u32]) -> Option<u32> {
    candidates.iter().copied().find(|id| {
        let team = state(league, *id);
        candidates
            .iter()
            .filter(|other| *other != id)
            .all(|other| team.beaten_opponents().contains(other))
    })
}

/// A team that lost to every other candidate drops out of contention.
fn lost_to_every_other(league: &[TeamSimState], candidates: &[u32]) -> Option<u32> {
    candidates.iter().copied().find(|id| {
        let team = state(league, *id);
        candidates
            .iter()
            .filter(|other| *other != id)
            .all(|other| team.lost_to_opponents().contains(other))
    })
}

fn coin_toss(candidates: &[u32], rng: &mut impl Rng) -> u32 {
    candidates[rng.gen_range(0..candidates.len())]
}

fn state<'a>(league: &'a [TeamSimState], id: u32) -> &'a TeamSimState {
    league
        .iter()
        .find(|t| t.team_id == id)
        .expect("tie-break candidate must exist in the league")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league::Team;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn make_state(id: u32, division_id: u32, conference_id: u32) -> TeamSimState {
        TeamSimState::new(
            &Team {
                id,
                division_id,
                conference_id,
                name: format!("team-{id}"),
            },
            1500.0,
        )
    }

    fn find(league: &mut [TeamSimState], id: u32) -> &mut TeamSimState {
        league.iter_mut().find(|t| t.team_id == id).unwrap()
    }

    /// Record a decisive game between two league members.
    fn play(league: &mut [TeamSimState], winner: u32, loser: u32) {
        find(league, winner).record_win(loser);
        find(league, loser).record_loss(winner);
    }

    fn rng() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn plain_percentage_order_needs_no_tiebreak() {
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 10, 100),
            make_state(3, 10, 100),
        ];
        play(&mut league, 1, 2);
        play(&mut league, 1, 3);
        play(&mut league, 2, 3);
        let order = order_division(&league, 10, &mut rng());
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn output_is_a_permutation_of_the_division() {
        let mut league: Vec<TeamSimState> = (1..=4).map(|id| make_state(id, 10, 100)).collect();
        play(&mut league, 1, 2);
        play(&mut league, 3, 4);
        let mut order = order_division(&league, 10, &mut rng());
        order.sort_unstable();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn head_to_head_breaks_a_two_way_division_tie() {
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 10, 100),
            // outsiders to equalise records
            make_state(8, 11, 100),
            make_state(9, 11, 100),
        ];
        // both 1-1 overall; 2 beat 1 head-to-head
        play(&mut league, 2, 1);
        play(&mut league, 1, 8);
        play(&mut league, 9, 2);
        let order = order_division(&league, 10, &mut rng());
        assert_eq!(order[..2], [2, 1]);
    }

    #[test]
    fn division_record_decides_after_split_head_to_head() {
        // Teams 1 and 2 share the division with 3; 8 is an outsider.
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 10, 100),
            make_state(3, 10, 100),
            make_state(8, 11, 100),
        ];
        // Head-to-head split 1-1.
        play(&mut league, 1, 2);
        play(&mut league, 2, 1);
        // Team 1 adds a division win, team 2 an outside win: both 2-1
        // overall, but 1 is 2-1 in-division while 2 is 1-1.
        play(&mut league, 1, 3);
        play(&mut league, 2, 8);
        let order = order_division(&league, 10, &mut rng());
        assert_eq!(order[..2], [1, 2]);
    }

    #[test]
    fn narrowing_restarts_the_pipeline_from_head_to_head() {
        // Three-way division tie at 3-3. Head-to-head over the trio drops 3
        // (1-3) while 1 and 2 sit level at 2-1; the restarted head-to-head
        // on the narrowed pair is decisive (2 won the only meeting), even
        // though the trio-wide values could not separate them.
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 10, 100),
            make_state(3, 10, 100),
            make_state(8, 11, 100),
            make_state(9, 11, 100),
        ];
        play(&mut league, 1, 3);
        play(&mut league, 1, 3);
        play(&mut league, 2, 3);
        play(&mut league, 3, 2);
        play(&mut league, 2, 1);
        // Outside games level everyone at 3-3 overall.
        play(&mut league, 8, 1);
        play(&mut league, 9, 1);
        play(&mut league, 1, 8);
        play(&mut league, 8, 2);
        play(&mut league, 9, 2);
        play(&mut league, 2, 9);
        play(&mut league, 3, 8);
        play(&mut league, 3, 9);
        let order = order_division(&league, 10, &mut rng());
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn coin_toss_is_deterministic_with_a_stubbed_rng() {
        // Identical records against disjoint-but-symmetric opponents leave
        // nothing for the deterministic criteria.
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 10, 100),
            make_state(8, 11, 100),
            make_state(9, 11, 100),
        ];
        play(&mut league, 1, 8);
        play(&mut league, 2, 9);
        let a = order_division(&league, 10, &mut rng());
        let b = order_division(&league, 10, &mut rng());
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn seeded_rng_reproduces_the_toss() {
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 10, 100),
            make_state(8, 11, 100),
            make_state(9, 11, 100),
        ];
        play(&mut league, 1, 8);
        play(&mut league, 2, 9);
        let mut rng_a = ChaCha8Rng::seed_from_u64(7);
        let mut rng_b = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(
            order_division(&league, 10, &mut rng_a),
            order_division(&league, 10, &mut rng_b)
        );
    }

    #[test]
    #[should_panic(expected = "empty division")]
    fn empty_division_panics() {
        let league = vec![make_state(1, 10, 100)];
        order_division(&league, 99, &mut rng());
    }

    // ── Conference ordering ──────────────────────────────────────────────

    /// Two divisions of two teams each; ranks assigned by division order.
    fn conference_fixture() -> Vec<TeamSimState> {
        vec![
            make_state(1, 10, 100),
            make_state(2, 10, 100),
            make_state(3, 11, 100),
            make_state(4, 11, 100),
        ]
    }

    fn assign_division_ranks(league: &mut Vec<TeamSimState>, divisions: &[u32]) {
        for division_id in divisions {
            let order = order_division(league, *division_id, &mut rng());
            for (rank, id) in order.iter().enumerate() {
                find(league, *id).division_rank = rank as u8;
            }
        }
    }

    #[test]
    fn division_leaders_rank_ahead_of_better_records() {
        let mut league = conference_fixture();
        // Division 11 is weak: its leader (3) is 1-2, while the second
        // team of division 10 is 2-1.
        play(&mut league, 1, 2);
        play(&mut league, 1, 3);
        play(&mut league, 2, 3);
        play(&mut league, 2, 4);
        play(&mut league, 1, 4);
        play(&mut league, 3, 4);
        assign_division_ranks(&mut league, &[10, 11]);
        let order = order_conference(&league, 100, &mut rng());
        // leaders 1 and 3 first, then 2 and 4
        assert_eq!(order, vec![1, 3, 2, 4]);
    }

    #[test]
    fn same_division_teams_never_compete_directly_at_conference_level() {
        // Non-leader block: 2 and 5 from division 10, 4 from division 11,
        // all 1-2. Division rank makes 2 the division's representative, so
        // 5's head-to-head win over 4 never comes into play: 4 beats the
        // representative and takes the group, with 5 gated behind 2.
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 10, 100),
            make_state(5, 10, 100),
            make_state(3, 11, 100),
            make_state(4, 11, 100),
        ];
        play(&mut league, 1, 2);
        play(&mut league, 1, 5);
        play(&mut league, 2, 5);
        play(&mut league, 4, 2);
        play(&mut league, 5, 4);
        play(&mut league, 3, 4);
        // records: 1 is 2-0, 3 is 1-0, and 2, 4, 5 are all 1-2.
        assign_division_ranks(&mut league, &[10, 11]);
        let order = order_conference(&league, 100, &mut rng());
        let pos = |id: u32| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(4) < pos(2), "4 beat the division-10 representative");
        assert!(pos(2) < pos(5), "division rank must order 2 ahead of 5");
    }

    #[test]
    fn beat_every_other_wins_a_three_way_conference_group() {
        // 9 belongs to the other conference; it only pads records.
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 11, 100),
            make_state(3, 12, 100),
            make_state(4, 13, 100),
            make_state(9, 14, 200),
        ];
        // 3 beat both 1 and 2; everyone in the group is 2-2 overall.
        play(&mut league, 3, 1);
        play(&mut league, 3, 2);
        play(&mut league, 1, 2);
        play(&mut league, 2, 1);
        play(&mut league, 9, 3);
        play(&mut league, 9, 3);
        play(&mut league, 1, 9);
        play(&mut league, 2, 9);
        assign_division_ranks(&mut league, &[10, 11, 12, 13, 14]);
        let order = order_conference(&league, 100, &mut rng());
        let group: Vec<u32> = order
            .into_iter()
            .filter(|id| [1, 2, 3].contains(id))
            .collect();
        assert_eq!(group[0], 3);
    }

    #[test]
    fn lost_to_every_other_finishes_last_in_its_group() {
        // No game between 1 and 2, so neither holds a beat-them-all sweep;
        // 3 lost to both and must fall to the bottom of the group.
        let mut league = vec![
            make_state(1, 10, 100),
            make_state(2, 11, 100),
            make_state(3, 12, 100),
            make_state(9, 14, 200),
        ];
        play(&mut league, 1, 3);
        play(&mut league, 2, 3);
        play(&mut league, 3, 9);
        play(&mut league, 3, 9);
        play(&mut league, 9, 1);
        play(&mut league, 9, 2);
        // 1, 2 and 3 all sit at an even record.
        assign_division_ranks(&mut league, &[10, 11, 12, 14]);
        let order = order_conference(&league, 100, &mut rng());
        let group: Vec<u32> = order
            .into_iter()
            .filter(|id| [1, 2, 3].contains(id))
            .collect();
        assert_eq!(group[2], 3);
    }
}
