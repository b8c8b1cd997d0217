//! Per-trial outcome flags and the run-wide accumulator.
//!
//! A trial produces one boolean per team per tracked outcome, plus the
//! resolution of every imminent game it happened to decide. The
//! accumulator sums those booleans over all trials: unconditionally, and
//! split by which side won each imminent game, which is what the
//! conditional ("if the home side wins...") probabilities are built from.
//! Workers each own an accumulator and the results are summed at the end;
//! nothing here is shared while trials run.

use crate::league::GameResolution;

/// Tracked outcomes, in output order. Seed flags are cumulative: `Seed4`
/// means "finished seed 4 or better".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Seed1,
    Seed2,
    Seed3,
    Seed4,
    Seed5,
    Seed6,
    Seed7,
    HostWildCard,
    HostDivision,
    HostConference,
    MakeDivision,
    MakeConference,
    MakeSuperBowl,
    WinSuperBowl,
}

pub const FLAG_COUNT: usize = 14;

pub const ALL_FLAGS: [Flag; FLAG_COUNT] = [
    Flag::Seed1,
    Flag::Seed2,
    Flag::Seed3,
    Flag::Seed4,
    Flag::Seed5,
    Flag::Seed6,
    Flag::Seed7,
    Flag::HostWildCard,
    Flag::HostDivision,
    Flag::HostConference,
    Flag::MakeDivision,
    Flag::MakeConference,
    Flag::MakeSuperBowl,
    Flag::WinSuperBowl,
];

impl Flag {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Cumulative flag for "finished seed `k` or better".
    pub fn seed(k: usize) -> Flag {
        ALL_FLAGS[k - 1]
    }
}

/// Everything one trial decided: a flag matrix over teams, and how each
/// tracked (imminent) game came out in this trial.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    flags: Vec<[bool; FLAG_COUNT]>,
    resolutions: Vec<Option<GameResolution>>,
}

impl TrialOutcome {
    pub fn new(team_count: usize, tracked_game_count: usize) -> Self {
        TrialOutcome {
            flags: vec![[false; FLAG_COUNT]; team_count],
            resolutions: vec![None; tracked_game_count],
        }
    }

    pub fn set(&mut self, team_index: usize, flag: Flag) {
        self.flags[team_index][flag.index()] = true;
    }

    pub fn is_set(&self, team_index: usize, flag: Flag) -> bool {
        self.flags[team_index][flag.index()]
    }

    pub fn set_resolution(&mut self, game_index: usize, resolution: GameResolution) {
        self.resolutions[game_index] = Some(resolution);
    }
}

/// Flag counts conditioned on one side winning one tracked game.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SideCounts {
    pub home: [u64; FLAG_COUNT],
    pub away: [u64; FLAG_COUNT],
}

/// How often each side of a tracked game won across trials. Ties fall in
/// neither branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchCounts {
    pub home_wins: u64,
    pub away_wins: u64,
}

/// Run-wide counts: one row of flag counts per team, a conditional matrix
/// per team × tracked game, and the branch sizes per tracked game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulator {
    trials: u64,
    team_counts: Vec<[u64; FLAG_COUNT]>,
    conditional: Vec<Vec<SideCounts>>,
    branches: Vec<BranchCounts>,
}

impl Accumulator {
    pub fn new(team_count: usize, tracked_game_count: usize) -> Self {
        Accumulator {
            trials: 0,
            team_counts: vec![[0; FLAG_COUNT]; team_count],
            conditional: vec![vec![SideCounts::default(); tracked_game_count]; team_count],
            branches: vec![BranchCounts::default(); tracked_game_count],
        }
    }

    /// Fold one trial into the counts.
    pub fn record(&mut self, outcome: &TrialOutcome) {
        debug_assert_eq!(outcome.flags.len(), self.team_counts.len());
        debug_assert_eq!(outcome.resolutions.len(), self.branches.len());

        self.trials += 1;
        for (game_index, resolution) in outcome.resolutions.iter().enumerate() {
            match resolution {
                Some(GameResolution::HomeWin) => self.branches[game_index].home_wins += 1,
                Some(GameResolution::AwayWin) => self.branches[game_index].away_wins += 1,
                _ => {}
            }
        }

        for (team_index, flags) in outcome.flags.iter().enumerate() {
            for (flag_index, set) in flags.iter().enumerate() {
                if !set {
                    continue;
                }
                self.team_counts[team_index][flag_index] += 1;
                for (game_index, resolution) in outcome.resolutions.iter().enumerate() {
                    match resolution {
                        Some(GameResolution::HomeWin) => {
                            self.conditional[team_index][game_index].home[flag_index] += 1;
                        }
                        Some(GameResolution::AwayWin) => {
                            self.conditional[team_index][game_index].away[flag_index] += 1;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Sum another worker's counts into this one.
    pub fn merge(mut self, other: Accumulator) -> Accumulator {
        debug_assert_eq!(self.team_counts.len(), other.team_counts.len());
        self.trials += other.trials;
        for (mine, theirs) in self.team_counts.iter_mut().zip(&other.team_counts) {
            for (m, t) in mine.iter_mut().zip(theirs) {
                *m += t;
            }
        }
        for (mine, theirs) in self.conditional.iter_mut().zip(&other.conditional) {
            for (m, t) in mine.iter_mut().zip(theirs) {
                for (a, b) in m.home.iter_mut().zip(&t.home) {
                    *a += b;
                }
                for (a, b) in m.away.iter_mut().zip(&t.away) {
                    *a += b;
                }
            }
        }
        for (mine, theirs) in self.branches.iter_mut().zip(&other.branches) {
            mine.home_wins += theirs.home_wins;
            mine.away_wins += theirs.away_wins;
        }
        self
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }

    pub fn count(&self, team_index: usize, flag: Flag) -> u64 {
        self.team_counts[team_index][flag.index()]
    }

    pub fn conditional_count(
        &self,
        team_index: usize,
        game_index: usize,
        flag: Flag,
        side: GameResolution,
    ) -> u64 {
        let counts = &self.conditional[team_index][game_index];
        match side {
            GameResolution::HomeWin => counts.home[flag.index()],
            GameResolution::AwayWin => counts.away[flag.index()],
            GameResolution::Tie => 0,
        }
    }

    pub fn branch(&self, game_index: usize) -> BranchCounts {
        self.branches[game_index]
    }
}
