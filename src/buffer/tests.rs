//! Tests for advantage estimation across paths

#[cfg(test)]
mod gae_tests {
    use anyhow::Result;

    use crate::{
        buffer::{
            Batch, Path,
            gae::{discount, estimate_advantages, path_advantages, standardize},
        },
        policy::ActionDist,
        value::ValueFunction,
    };

    /// Baseline predicting a constant everywhere
    struct ConstantValue(f32);

    impl ValueFunction for ConstantValue {
        fn predict(&self, path: &Path) -> Result<Vec<f32>> {
            Ok(vec![self.0; path.len()])
        }

        fn fit(&mut self, _paths: &[Path], _targets: &[Vec<f32>]) -> Result<()> {
            Ok(())
        }
    }

    fn path_with_rewards(rewards: &[f32], terminated: bool) -> Path {
        let mut path = Path::with_capacity(rewards.len());
        for &r in rewards {
            path.push_decision(vec![0.0], vec![0.0], ActionDist::new(vec![0.0], vec![0.0]), 0.0);
            path.push_reward(r);
        }
        path.terminated = terminated;
        path
    }

    #[test]
    fn test_discount_three_steps() {
        let g = 0.9;
        let out = discount(&[1.0, 2.0, 3.0], g);
        assert!((out[0] - (1.0 + g * 2.0 + g * g * 3.0)).abs() < 1e-6);
        assert!((out[1] - (2.0 + g * 3.0)).abs() < 1e-6);
        assert!((out[2] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_discount_empty() {
        assert!(discount(&[], 0.99).is_empty());
    }

    #[test]
    fn test_terminated_constant_reward_zero_baseline() {
        let rewards = [1.0; 5];
        let values = [0.0; 5];
        let advantages = path_advantages(&rewards, &values, true, 0.99, 0.95);

        assert_eq!(advantages.len(), 5);
        assert!(advantages.iter().all(|&a| a > 0.0), "Advantages should be positive: {:?}", advantages);
        for w in advantages.windows(2) {
            assert!(w[0].abs() > w[1].abs(), "Magnitude should decrease toward the end: {:?}", advantages);
        }
        assert!((advantages[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_terminal_bootstraps_from_zero() {
        // With γ=λ=1 the advantage is the return-to-go minus the current value
        let rewards = [1.0, 1.0, 1.0];
        let values = [2.0, 2.0, 2.0];
        let advantages = path_advantages(&rewards, &values, true, 1.0, 1.0);

        assert!((advantages[2] - (-1.0)).abs() < 1e-6, "Step 2: got {}", advantages[2]);
        assert!((advantages[1] - 0.0).abs() < 1e-6, "Step 1: got {}", advantages[1]);
        assert!((advantages[0] - 1.0).abs() < 1e-6, "Step 0: got {}", advantages[0]);
    }

    #[test]
    fn test_truncated_bootstraps_from_last_value() {
        let rewards = [0.0, 0.0];
        let values = [0.0, 5.0];

        let truncated = path_advantages(&rewards, &values, false, 0.5, 1.0);
        let terminated = path_advantages(&rewards, &values, true, 0.5, 1.0);

        // Last step: δ = 0 + 0.5 * 5 - 5 vs δ = 0 + 0 - 5
        assert!((truncated[1] - (-2.5)).abs() < 1e-6);
        assert!((terminated[1] - (-5.0)).abs() < 1e-6);
        assert!(truncated[0] > terminated[0]);
    }

    #[test]
    fn test_estimates_do_not_cross_paths() {
        let paths = vec![path_with_rewards(&[1.0, 1.0], true), path_with_rewards(&[10.0], true)];
        let estimates = estimate_advantages(&paths, &ConstantValue(0.0), 0.99, 0.95).unwrap();

        // First path's last step sees only its own reward
        assert!((estimates.advantages[0][1] - 1.0).abs() < 1e-6);
        assert!((estimates.value_targets[0][0] - 1.99).abs() < 1e-5);
        assert!((estimates.value_targets[1][0] - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_value_targets_ignore_baseline() {
        let paths = vec![path_with_rewards(&[1.0, 2.0, 3.0], false)];
        let with_zero = estimate_advantages(&paths, &ConstantValue(0.0), 0.9, 0.95).unwrap();
        let with_five = estimate_advantages(&paths, &ConstantValue(5.0), 0.9, 0.95).unwrap();

        assert_eq!(with_zero.value_targets, with_five.value_targets);
        assert_ne!(with_zero.advantages, with_five.advantages);
    }

    #[test]
    fn test_standardize_moments() {
        let raw = [3.0, -1.0, 7.5, 0.25, 12.0, -4.0, 2.0];
        let standardized = standardize(&raw);

        let n = standardized.len() as f32;
        let mean = standardized.iter().sum::<f32>() / n;
        let var = standardized.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;

        assert!(mean.abs() < 1e-5, "mean = {}", mean);
        assert!((var.sqrt() - 1.0).abs() < 1e-4, "std = {}", var.sqrt());
    }

    #[test]
    fn test_standardize_constant_batch_is_zero() {
        let standardized = standardize(&[2.0; 4]);
        assert!(standardized.iter().all(|&a| a == 0.0));
    }

    #[test]
    fn test_batch_standardizes_across_paths() {
        let paths = vec![path_with_rewards(&[1.0, 0.0, 2.0], false), path_with_rewards(&[5.0, 5.0], true)];
        let estimates = estimate_advantages(&paths, &ConstantValue(1.0), 0.99, 0.97).unwrap();
        let batch = Batch::from_paths(&paths, &estimates.advantages);

        assert_eq!(batch.len(), 5);
        let mean = batch.advantages.iter().sum::<f32>() / 5.0;
        assert!(mean.abs() < 1e-5);
    }
}
