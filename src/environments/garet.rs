//! Seeded GARET-style random MDP generation.
//!
//! Every (action, state) pair transitions to `branching_factor` distinct
//! successor states with normalized random probabilities and earns a random
//! expected reward, so small test MDPs with nontrivial optimal policies can
//! be produced reproducibly from a seed.

use super::structure::{MarkovDecisionProcess, StructureError};
use itertools::iproduct;
use ndarray::{Array2, Array3, NdFloat};
use rand::prelude::*;

pub fn create<F: NdFloat>(
    seed: u64,
    num_states: usize,
    num_actions: usize,
    branching_factor: usize,
) -> Result<MarkovDecisionProcess<F>, StructureError> {
    if branching_factor == 0 || branching_factor > num_states {
        return Err(StructureError::InvalidBranchingFactor {
            branching_factor,
            num_states,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut transitions = Array3::<f64>::zeros((num_actions, num_states, num_states));
    let mut rewards = Array2::<f64>::zeros((num_actions, num_states));
    for (action, state) in iproduct!(0..num_actions, 0..num_states) {
        let successors = (0..num_states).choose_multiple(&mut rng, branching_factor);
        // Bounded away from zero so normalization stays well-conditioned.
        let weights: Vec<f64> = (0..branching_factor)
            .map(|_| rng.gen_range(0.01..1.0))
            .collect();
        let total: f64 = weights.iter().sum();
        for (next_state, weight) in successors.into_iter().zip(&weights) {
            transitions[[action, state, next_state]] = weight / total;
        }
        rewards[[action, state]] = rng.gen::<f64>();
    }

    MarkovDecisionProcess::new(
        transitions.mapv(|x| F::from(x).unwrap()),
        rewards.mapv(|x| F::from(x).unwrap()),
        &format!("garet(seed={seed}, states={num_states}, actions={num_actions}, branching={branching_factor})"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_deterministic_for_a_seed() {
        let first = create::<f64>(42, 4, 4, 3).unwrap();
        let second = create::<f64>(42, 4, 4, 3).unwrap();
        assert_eq!(first.transitions(), second.transitions());
        assert_eq!(first.rewards(), second.rewards());
    }

    #[test]
    fn different_seeds_differ() {
        let first = create::<f64>(42, 4, 4, 3).unwrap();
        let second = create::<f64>(43, 4, 4, 3).unwrap();
        assert_ne!(first.transitions(), second.transitions());
    }

    #[test]
    fn create_validates_against_structure_checks() {
        // Constructor re-validates row-stochasticity, so a successful create
        // implies every action slice is a proper distribution.
        let mdp = create::<f32>(7, 10, 2, 3).unwrap();
        assert_eq!(mdp.num_states(), 10);
        assert_eq!(mdp.num_actions(), 2);
    }

    #[test]
    fn create_rejects_oversized_branching_factor() {
        let result = create::<f64>(42, 3, 2, 4);
        assert_eq!(
            result.unwrap_err(),
            StructureError::InvalidBranchingFactor {
                branching_factor: 4,
                num_states: 3
            }
        );
    }
}
