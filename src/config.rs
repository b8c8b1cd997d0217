use clap::Parser;
use std::path::PathBuf;

/// Season-outcome Monte Carlo simulator for NFL playoff odds
#[derive(Parser, Debug, Clone)]
#[command(name = "gridiron-sim", version, about)]
pub struct SimConfig {
    /// Path to the season snapshot JSON (teams, games, ratings)
    #[arg(long, env = "SNAPSHOT_PATH")]
    pub snapshot: PathBuf,

    /// Where the probability records are written
    #[arg(long, env = "OUTPUT_PATH", default_value = "chances.json")]
    pub output: PathBuf,

    /// Number of season simulations to run
    #[arg(long, env = "TOTAL_TRIALS", default_value = "32768")]
    pub total_trials: u64,

    /// Season year being simulated
    #[arg(long, env = "CURRENT_SEASON", default_value = "2023")]
    pub current_season: u16,

    /// z-score gating conditional probabilities against sampling noise
    /// (2.576 ≈ a 99% confidence interval)
    #[arg(long, env = "CONFIDENCE_Z", default_value = "2.576")]
    pub confidence_z: f64,

    /// Team awarded home field in the championship game, if it gets there
    #[arg(long, env = "SUPER_BOWL_HOST", default_value = "1")]
    pub super_bowl_host: u32,

    /// Worker threads for the trial pool (0 = one per core)
    #[arg(long, env = "WORKERS", default_value = "0")]
    pub workers: usize,

    /// Base seed for the per-worker rng streams; omit for a random run
    #[arg(long, env = "SIM_SEED")]
    pub seed: Option<u64>,

    /// Regular-season games per team, used by elimination arithmetic
    #[arg(long, env = "GAMES_PER_SEASON", default_value = "17")]
    pub games_per_season: u32,
}

impl SimConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.total_trials == 0 {
            anyhow::bail!("total_trials must be positive");
        }
        if self.confidence_z <= 0.0 {
            anyhow::bail!("confidence_z must be positive");
        }
        if self.games_per_season == 0 {
            anyhow::bail!("games_per_season must be positive");
        }
        Ok(())
    }
}
