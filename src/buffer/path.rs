//! Per-episode trajectory storage

use crate::policy::ActionDist;

/// One rollout of the policy in the environment
///
/// All per-step vectors have the same length. `observations[t]` is the
/// policy input at step `t` (the normalized observation concatenated with
/// the previous one), `actions[t]` the raw policy output before rescaling
/// into the environment's action bounds.
#[derive(Debug, Clone, Default)]
pub struct Path {
    /// Policy inputs [len, state_dim]
    pub observations: Vec<Vec<f32>>,

    /// Raw policy actions [len, act_dim]
    pub actions: Vec<Vec<f32>>,

    /// Action distributions the actions were sampled from [len]
    pub action_dists: Vec<ActionDist>,

    /// Log probabilities of the sampled actions [len]
    pub log_probs: Vec<f32>,

    /// Rewards received [len]
    pub rewards: Vec<f32>,

    /// Whether the episode ended by natural termination rather than by the
    /// step budget
    pub terminated: bool,
}

impl Path {
    /// Create an empty path with room for `capacity` steps
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            observations: Vec::with_capacity(capacity),
            actions: Vec::with_capacity(capacity),
            action_dists: Vec::with_capacity(capacity),
            log_probs: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            terminated: false,
        }
    }

    /// Record the policy's decision for one step
    pub fn push_decision(&mut self, state: Vec<f32>, action: Vec<f32>, dist: ActionDist, log_prob: f32) {
        self.observations.push(state);
        self.actions.push(action);
        self.action_dists.push(dist);
        self.log_probs.push(log_prob);
    }

    /// Record the reward that followed the last decision
    pub fn push_reward(&mut self, reward: f32) {
        debug_assert_eq!(self.rewards.len() + 1, self.observations.len(), "reward without decision");
        self.rewards.push(reward);
    }

    /// Number of steps in the path
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Check if the path has no steps
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Undiscounted episode return
    pub fn total_reward(&self) -> f32 {
        self.rewards.iter().sum()
    }

    /// Whether every per-step vector has the same length
    pub fn is_consistent(&self) -> bool {
        let n = self.rewards.len();
        self.observations.len() == n
            && self.actions.len() == n
            && self.action_dists.len() == n
            && self.log_probs.len() == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist() -> ActionDist {
        ActionDist::new(vec![0.0], vec![0.0])
    }

    #[test]
    fn test_push_and_len() {
        let mut path = Path::with_capacity(4);
        assert!(path.is_empty());

        path.push_decision(vec![1.0, 0.0], vec![0.5], dist(), -0.9);
        assert!(!path.is_consistent());
        path.push_reward(2.0);
        path.push_decision(vec![2.0, 1.0], vec![-0.5], dist(), -1.1);
        path.push_reward(3.0);

        assert_eq!(path.len(), 2);
        assert!(path.is_consistent());
        assert_eq!(path.total_reward(), 5.0);
        assert!(!path.terminated);
    }
}
