//! Per-trial mutable team record.
//!
//! One `TeamSimState` exists per team per trial, cloned from the baseline at
//! trial start and thrown away at trial end. Accumulated results live in
//! three opponent lists (beaten / lost to / tied); `record_win`,
//! `record_loss` and `record_tie` are the only mutation path, and every
//! standings statistic the tie-breaker needs is derived from those lists on
//! demand. Ties count as half a win and half a loss throughout.

use chrono::{DateTime, Utc};

use crate::league::Team;
use crate::sim::rating::DEFAULT_REST_DAYS;

#[derive(Debug, Clone)]
pub struct TeamSimState {
    pub team_id: u32,
    pub division_id: u32,
    pub conference_id: u32,
    /// Current rating; evolves within the trial as games resolve.
    pub rating: f64,
    /// Start time of the team's most recent game, recorded or simulated.
    pub last_game: Option<DateTime<Utc>>,
    /// Conference seed once the regular season completes (0 = unseeded).
    pub seed: u8,
    /// Rank within the division (0 = leader).
    pub division_rank: u8,
    won: Vec<u32>,
    lost: Vec<u32>,
    tied: Vec<u32>,
}

impl TeamSimState {
    pub fn new(team: &Team, rating: f64) -> Self {
        TeamSimState {
            team_id: team.id,
            division_id: team.division_id,
            conference_id: team.conference_id,
            rating,
            last_game: None,
            seed: 0,
            division_rank: 0,
            won: Vec::new(),
            lost: Vec::new(),
            tied: Vec::new(),
        }
    }

    pub fn record_win(&mut self, opponent_id: u32) {
        self.won.push(opponent_id);
    }

    pub fn record_loss(&mut self, opponent_id: u32) {
        self.lost.push(opponent_id);
    }

    pub fn record_tie(&mut self, opponent_id: u32) {
        self.tied.push(opponent_id);
    }

    pub fn beaten_opponents(&self) -> &[u32] {
        &self.won
    }

    pub fn lost_to_opponents(&self) -> &[u32] {
        &self.lost
    }

    pub fn tied_opponents(&self) -> &[u32] {
        &self.tied
    }

    pub fn wins(&self) -> usize {
        self.won.len()
    }

    pub fn losses(&self) -> usize {
        self.lost.len()
    }

    pub fn ties(&self) -> usize {
        self.tied.len()
    }

    pub fn games_played(&self) -> usize {
        self.won.len() + self.lost.len() + self.tied.len()
    }

    pub fn games_remaining(&self, games_per_season: u32) -> i64 {
        games_per_season as i64 - self.games_played() as i64
    }

    pub fn wins_with_ties(&self) -> f64 {
        self.wins() as f64 + 0.5 * self.ties() as f64
    }

    pub fn losses_with_ties(&self) -> f64 {
        self.losses() as f64 + 0.5 * self.ties() as f64
    }

    /// Overall win percentage; 0 before any game has been played.
    pub fn win_percentage(&self) -> f64 {
        let games = self.games_played();
        if games == 0 {
            return 0.0;
        }
        self.wins_with_ties() / games as f64
    }

    /// Win percentage counting only games against the given opponents.
    /// Opponents met more than once contribute one entry per meeting.
    pub fn win_percentage_against(&self, opponent_ids: &[u32]) -> f64 {
        let wins = self.won.iter().filter(|id| opponent_ids.contains(id)).count();
        let losses = self.lost.iter().filter(|id| opponent_ids.contains(id)).count();
        let ties = self.tied.iter().filter(|id| opponent_ids.contains(id)).count();
        let games = wins + losses + ties;
        if games == 0 {
            return 0.0;
        }
        (wins as f64 + 0.5 * ties as f64) / games as f64
    }

    /// Average win percentage of the opponents this team has beaten or tied,
    /// ties weighted at half. 0 for a team with no wins or ties.
    pub fn strength_of_victory(&self, league: &[TeamSimState]) -> f64 {
        if self.won.is_empty() && self.tied.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0;
        for id in &self.won {
            sum += win_percentage_of(league, *id);
        }
        for id in &self.tied {
            sum += 0.5 * win_percentage_of(league, *id);
        }
        sum / self.wins_with_ties()
    }

    /// Average win percentage of every opponent played.
    pub fn strength_of_schedule(&self, league: &[TeamSimState]) -> f64 {
        let games = self.games_played();
        if games == 0 {
            return 0.0;
        }
        let mut sum = 0.0;
        for id in self.won.iter().chain(&self.lost).chain(&self.tied) {
            sum += win_percentage_of(league, *id);
        }
        sum / games as f64
    }

    /// Magic number against `rival` for the seed the rival currently holds.
    ///
    /// Any combination of this team's further losses/ties and the rival's
    /// further wins summing to this value guarantees the team cannot catch
    /// the rival; at 0 or below the team is mathematically eliminated from
    /// that spot (the `+ 1` assumes the team could still win a tiebreaker).
    pub fn magic_number(&self, rival: &TeamSimState, games_per_season: u32) -> f64 {
        games_per_season as f64 + 1.0 - rival.wins_with_ties() - self.losses_with_ties()
    }

    /// Days of rest before a game starting at `start`, defaulting when the
    /// team has not played yet.
    pub fn rest_days_before(&self, start: DateTime<Utc>) -> f64 {
        match self.last_game {
            Some(last) => (start - last).num_seconds() as f64 / 86_400.0,
            None => DEFAULT_REST_DAYS,
        }
    }
}

fn win_percentage_of(league: &[TeamSimState], team_id: u32) -> f64 {
    league
        .iter()
        .find(|t| t.team_id == team_id)
        .map(TeamSimState::win_percentage)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn team(id: u32) -> Team {
        Team {
            id,
            division_id: 1,
            conference_id: 1,
            name: format!("team-{id}"),
        }
    }

    fn state(id: u32) -> TeamSimState {
        TeamSimState::new(&team(id), 1500.0)
    }

    #[test]
    fn record_counts_add_up() {
        let mut t = state(1);
        t.record_win(2);
        t.record_win(3);
        t.record_loss(4);
        t.record_tie(5);
        assert_eq!(t.games_played(), 4);
        assert_eq!(t.games_played(), t.wins() + t.losses() + t.ties());
        assert_eq!(t.games_remaining(17), 13);
    }

    #[test]
    fn win_percentage_weighs_ties_at_half() {
        let mut t = state(1);
        t.record_win(2);
        t.record_loss(3);
        t.record_tie(4);
        t.record_tie(5);
        // (1 + 0.5 * 2) / 4
        assert_relative_eq!(t.win_percentage(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn win_percentage_of_unplayed_team_is_zero() {
        assert_relative_eq!(state(1).win_percentage(), 0.0);
    }

    #[test]
    fn restricted_win_percentage_ignores_outsiders() {
        let mut t = state(1);
        t.record_win(2);
        t.record_loss(2);
        t.record_win(9);
        t.record_win(9);
        assert_relative_eq!(t.win_percentage_against(&[2]), 0.5, epsilon = 1e-12);
        assert_relative_eq!(t.win_percentage_against(&[9]), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.win_percentage_against(&[7]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn strength_of_victory_averages_beaten_and_tied_opponents() {
        let mut a = state(1);
        let mut b = state(2);
        let mut c = state(3);
        // b: 1-0, c: 0-0-1 vs somebody else
        b.record_win(9);
        c.record_tie(9);
        a.record_win(2);
        a.record_tie(3);
        let league = vec![a.clone(), b, c];
        // (1.0 + 0.5 * 0.5) / 1.5
        assert_relative_eq!(
            a.strength_of_victory(&league),
            1.25 / 1.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn strength_of_victory_without_wins_is_zero() {
        let mut a = state(1);
        a.record_loss(2);
        let league = vec![a.clone(), state(2)];
        assert_relative_eq!(a.strength_of_victory(&league), 0.0);
    }

    #[test]
    fn strength_of_schedule_counts_every_opponent() {
        let mut a = state(1);
        let mut b = state(2);
        let c = state(3);
        b.record_win(9);
        b.record_win(8);
        a.record_win(2);
        a.record_loss(3);
        let league = vec![a.clone(), b, c];
        // (1.0 + 0.0) / 2
        assert_relative_eq!(a.strength_of_schedule(&league), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn magic_number_arithmetic() {
        let mut me = state(1);
        let mut rival = state(2);
        for opp in 10..20 {
            rival.record_win(opp);
        }
        me.record_loss(2);
        me.record_loss(3);
        // 17 + 1 - 10 - 2
        assert_relative_eq!(me.magic_number(&rival, 17), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn rest_days_default_before_first_game() {
        let t = state(1);
        let start = "2023-09-10T17:00:00Z".parse().unwrap();
        assert_relative_eq!(t.rest_days_before(start), DEFAULT_REST_DAYS);
    }

    #[test]
    fn rest_days_from_last_game() {
        let mut t = state(1);
        t.last_game = Some("2023-09-10T17:00:00Z".parse().unwrap());
        let next = "2023-09-17T17:00:00Z".parse().unwrap();
        assert_relative_eq!(t.rest_days_before(next), 7.0, epsilon = 1e-9);
    }
}
