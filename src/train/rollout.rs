//! Single-path trajectory collection
//!
//! Drives one episode of an environment with a policy. The policy sees the
//! current (filtered) observation concatenated with the previous one, and
//! its `[-1, 1]` actions are rescaled into the environment's action box.

use anyhow::{Result, ensure};

use crate::{buffer::Path, env::Environment, policy::Policy, utils::ZFilter};

/// Per-call rollout settings
#[derive(Debug, Clone, Copy)]
pub struct RolloutOptions {
    /// Maximum steps in the path
    pub max_pathlength: usize,

    /// Render before every step
    pub animate: bool,

    /// Concatenate the raw previous observation instead of the filtered one
    pub concat_raw_previous: bool,
}

impl RolloutOptions {
    /// Options with rendering off and filtered previous observations
    ///
    /// The previous observation is the filtered one, so both halves of the
    /// policy input share the filter's scale; `concat_raw_previous` opts into
    /// the raw one.
    pub fn new(max_pathlength: usize) -> Self {
        Self { max_pathlength, animate: false, concat_raw_previous: false }
    }
}

/// Map a `[-1, 1]` action into `[low, high]` and clip
pub fn rescale_action(action: &[f32], low: &[f32], high: &[f32]) -> Vec<f32> {
    action
        .iter()
        .zip(low.iter().zip(high))
        .map(|(&a, (&lo, &hi))| (lo + (a + 1.0) * 0.5 * (hi - lo)).clamp(lo, hi))
        .collect()
}

/// Collect one path
///
/// Stops after `max_pathlength` steps or when the environment signals
/// termination (`path.terminated = true`) or truncation
/// (`path.terminated = false`). Every observation seen, including the
/// initial one, updates `obfilter`.
pub fn rollout<E, P>(
    env: &mut E,
    policy: &mut P,
    mut obfilter: Option<&mut ZFilter>,
    options: &RolloutOptions,
) -> Result<Path>
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    let action_space = env.action_space();
    let (low, high) = action_space.bounds()?;

    let mut raw_ob = env.reset()?;
    let mut ob = match obfilter.as_deref_mut() {
        Some(filter) => filter.apply(&raw_ob),
        None => raw_ob.clone(),
    };
    let mut prev_ob = vec![0.0; ob.len()];

    let mut path = Path::with_capacity(options.max_pathlength);
    for _ in 0..options.max_pathlength {
        if options.animate {
            env.render()?;
        }

        let mut state = Vec::with_capacity(ob.len() * 2);
        state.extend_from_slice(&ob);
        state.extend_from_slice(&prev_ob);

        let out = policy.act(&state)?;
        ensure!(
            out.action.len() == low.len(),
            "Policy produced a {}-dimensional action for a {}-dimensional action space",
            out.action.len(),
            low.len()
        );
        let scaled = rescale_action(&out.action, low, high);
        path.push_decision(state, out.action, out.dist, out.log_prob);

        prev_ob = if options.concat_raw_previous { raw_ob } else { ob };

        let step = env.step(&scaled)?;
        raw_ob = step.observation;
        ob = match obfilter.as_deref_mut() {
            Some(filter) => filter.apply(&raw_ob),
            None => raw_ob.clone(),
        };
        path.push_reward(step.reward);

        if step.terminated {
            path.terminated = true;
            break;
        }
        if step.truncated {
            break;
        }
    }

    tracing::debug!(
        "Path finished: len={}, reward={:.3}, terminated={}",
        path.len(),
        path.total_reward(),
        path.terminated
    );
    Ok(path)
}
