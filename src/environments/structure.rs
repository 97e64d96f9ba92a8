//! Immutable MRP and MDP containers over explicit transition/reward tensors.

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis, NdFloat};
use std::error::Error;
use std::fmt;

/// Rejections raised when the supplied tensors do not describe a valid
/// process. Construction is the only place these checks run; once built,
/// a process is read-only and assumed well-formed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StructureError {
    /// The trailing two dimensions of the transition tensor are not square.
    NonSquareTransitions { rows: usize, cols: usize },
    /// Transition and reward tensors disagree on the number of states.
    StateCountMismatch { transitions: usize, rewards: usize },
    /// Transition and reward tensors disagree on the number of actions.
    ActionCountMismatch { transitions: usize, rewards: usize },
    /// A transition row contains a negative entry.
    NegativeProbability { action: Option<usize>, state: usize },
    /// A transition row does not sum to 1 within dtype tolerance.
    NotRowStochastic { action: Option<usize>, state: usize },
    /// A random-MDP request with an unusable branching factor.
    InvalidBranchingFactor {
        branching_factor: usize,
        num_states: usize,
    },
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonSquareTransitions { rows, cols } => {
                write!(f, "transition matrix is {rows}x{cols}, expected square")
            }
            Self::StateCountMismatch {
                transitions,
                rewards,
            } => write!(
                f,
                "transitions describe {transitions} states but rewards describe {rewards}"
            ),
            Self::ActionCountMismatch {
                transitions,
                rewards,
            } => write!(
                f,
                "transitions describe {transitions} actions but rewards describe {rewards}"
            ),
            Self::NegativeProbability { action, state } => match action {
                Some(action) => write!(
                    f,
                    "negative transition probability at action {action}, state {state}"
                ),
                None => write!(f, "negative transition probability at state {state}"),
            },
            Self::NotRowStochastic { action, state } => match action {
                Some(action) => write!(
                    f,
                    "transition row for action {action}, state {state} does not sum to 1"
                ),
                None => write!(f, "transition row for state {state} does not sum to 1"),
            },
            Self::InvalidBranchingFactor {
                branching_factor,
                num_states,
            } => write!(
                f,
                "branching factor {branching_factor} unusable for {num_states} states"
            ),
        }
    }
}

impl Error for StructureError {}

fn validate_rows<F: NdFloat>(
    matrix: ArrayView2<F>,
    action: Option<usize>,
) -> Result<(), StructureError> {
    // Scales with the dtype: ~3e-4 for f32, ~1.5e-8 for f64.
    let tolerance = F::epsilon().sqrt();
    for (state, row) in matrix.rows().into_iter().enumerate() {
        if row.iter().any(|p| *p < F::zero()) {
            return Err(StructureError::NegativeProbability { action, state });
        }
        if (row.sum() - F::one()).abs() > tolerance {
            return Err(StructureError::NotRowStochastic { action, state });
        }
    }
    Ok(())
}

/// A finite Markov Reward Process: row-stochastic state transitions plus an
/// expected immediate reward per state. The target of prediction.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkovRewardProcess<F> {
    transitions: Array2<F>,
    rewards: Array1<F>,
    name: String,
}

impl<F: NdFloat> MarkovRewardProcess<F> {
    pub fn new(
        transitions: Array2<F>,
        rewards: Array1<F>,
        name: &str,
    ) -> Result<Self, StructureError> {
        let (rows, cols) = transitions.dim();
        if rows != cols {
            return Err(StructureError::NonSquareTransitions { rows, cols });
        }
        if rows != rewards.len() {
            return Err(StructureError::StateCountMismatch {
                transitions: rows,
                rewards: rewards.len(),
            });
        }
        validate_rows(transitions.view(), None)?;
        Ok(Self {
            transitions,
            rewards,
            name: name.to_string(),
        })
    }

    pub fn num_states(&self) -> usize {
        self.rewards.len()
    }

    pub fn transitions(&self) -> &Array2<F> {
        &self.transitions
    }

    pub fn rewards(&self) -> &Array1<F> {
        &self.rewards
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A finite Markov Decision Process: one row-stochastic transition matrix and
/// one reward vector per action. The target of control.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkovDecisionProcess<F> {
    transitions: Array3<F>,
    rewards: Array2<F>,
    name: String,
}

impl<F: NdFloat> MarkovDecisionProcess<F> {
    pub fn new(
        transitions: Array3<F>,
        rewards: Array2<F>,
        name: &str,
    ) -> Result<Self, StructureError> {
        let (actions, rows, cols) = transitions.dim();
        if rows != cols {
            return Err(StructureError::NonSquareTransitions { rows, cols });
        }
        let (reward_actions, reward_states) = rewards.dim();
        if rows != reward_states {
            return Err(StructureError::StateCountMismatch {
                transitions: rows,
                rewards: reward_states,
            });
        }
        if actions != reward_actions {
            return Err(StructureError::ActionCountMismatch {
                transitions: actions,
                rewards: reward_actions,
            });
        }
        for (action, slice) in transitions.axis_iter(Axis(0)).enumerate() {
            validate_rows(slice, Some(action))?;
        }
        Ok(Self {
            transitions,
            rewards,
            name: name.to_string(),
        })
    }

    pub fn num_states(&self) -> usize {
        self.transitions.len_of(Axis(1))
    }

    pub fn num_actions(&self) -> usize {
        self.transitions.len_of(Axis(0))
    }

    pub fn transitions(&self) -> &Array3<F> {
        &self.transitions
    }

    pub fn rewards(&self) -> &Array2<F> {
        &self.rewards
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, arr3};

    #[test]
    fn mrp_derives_state_count() {
        let mrp = MarkovRewardProcess::new(
            arr2(&[[0., 1., 0.], [0., 0., 1.], [1., 0., 0.]]),
            arr1(&[0., 0., 1.]),
            "cycle",
        )
        .unwrap();
        assert_eq!(mrp.num_states(), 3);
        assert_eq!(mrp.name(), "cycle");
    }

    #[test]
    fn mrp_rejects_non_square_transitions() {
        let result = MarkovRewardProcess::new(
            Array2::<f64>::zeros((2, 3)),
            arr1(&[0., 0.]),
            "bad",
        );
        assert_eq!(
            result.unwrap_err(),
            StructureError::NonSquareTransitions { rows: 2, cols: 3 }
        );
    }

    #[test]
    fn mrp_rejects_reward_length_mismatch() {
        let result = MarkovRewardProcess::new(
            arr2(&[[1., 0.], [0., 1.]]),
            arr1(&[0., 0., 1.]),
            "bad",
        );
        assert_eq!(
            result.unwrap_err(),
            StructureError::StateCountMismatch {
                transitions: 2,
                rewards: 3
            }
        );
    }

    #[test]
    fn mrp_rejects_non_stochastic_row() {
        let result = MarkovRewardProcess::new(
            arr2(&[[0.5, 0.4], [1., 0.]]),
            arr1(&[0., 0.]),
            "bad",
        );
        assert_eq!(
            result.unwrap_err(),
            StructureError::NotRowStochastic {
                action: None,
                state: 0
            }
        );
    }

    #[test]
    fn mrp_rejects_negative_probability() {
        // Row sums to 1 but contains a negative entry.
        let result = MarkovRewardProcess::new(
            arr2(&[[1.5, -0.5], [0., 1.]]),
            arr1(&[0., 0.]),
            "bad",
        );
        assert_eq!(
            result.unwrap_err(),
            StructureError::NegativeProbability {
                action: None,
                state: 0
            }
        );
    }

    #[test]
    fn mrp_accepts_f32_rows_within_tolerance() {
        let mrp = MarkovRewardProcess::new(
            arr2(&[[0.1f32, 0.9], [0.3, 0.7]]),
            arr1(&[1f32, 1.]),
            "f32",
        );
        assert!(mrp.is_ok());
    }

    #[test]
    fn mdp_derives_counts() {
        let mdp = MarkovDecisionProcess::new(
            arr3(&[
                [[1., 0.], [0., 1.]],
                [[0., 1.], [1., 0.]],
            ]),
            arr2(&[[1., 1.], [0., 0.]]),
            "two-state",
        )
        .unwrap();
        assert_eq!(mdp.num_states(), 2);
        assert_eq!(mdp.num_actions(), 2);
    }

    #[test]
    fn mdp_rejects_action_count_mismatch() {
        let result = MarkovDecisionProcess::new(
            arr3(&[
                [[1., 0.], [0., 1.]],
                [[0., 1.], [1., 0.]],
            ]),
            arr2(&[[1., 1.], [0., 0.], [0., 0.]]),
            "bad",
        );
        assert_eq!(
            result.unwrap_err(),
            StructureError::ActionCountMismatch {
                transitions: 2,
                rewards: 3
            }
        );
    }

    #[test]
    fn mdp_reports_failing_action_slice() {
        let result = MarkovDecisionProcess::new(
            arr3(&[
                [[1., 0.], [0., 1.]],
                [[0.2, 0.2], [1., 0.]],
            ]),
            arr2(&[[1., 1.], [0., 0.]]),
            "bad",
        );
        assert_eq!(
            result.unwrap_err(),
            StructureError::NotRowStochastic {
                action: Some(1),
                state: 0
            }
        );
    }
}
