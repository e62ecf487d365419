/// Tunables for a single analysis run.
///
/// Defaults match the documented operating envelope; tests and benches
/// override individual fields with struct-update syntax.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seed for the anomaly model. Two runs over the same batch with the
    /// same seed produce identical reports.
    pub anomaly_seed: u64,
    /// Number of isolation trees.
    pub anomaly_trees: usize,
    /// Subsample size per tree, capped at the account population.
    pub anomaly_sample: usize,
    /// DFS step budget per cycle-search starting node.
    pub dfs_step_budget: usize,
    /// Global cap on validated cycle candidates.
    pub cycle_candidate_cap: usize,
    /// Global step budget for the shell chain walk.
    pub shell_step_budget: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anomaly_seed: 42,
            anomaly_trees: 100,
            anomaly_sample: 256,
            dfs_step_budget: 5_000,
            cycle_candidate_cap: 2_000,
            shell_step_budget: 200_000,
        }
    }
}
