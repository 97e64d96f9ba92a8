//! Hand-built micro MRPs and MDPs used across the algorithm tests.

use super::structure::{MarkovDecisionProcess, MarkovRewardProcess};
use ndarray::{Array1, Array2, Array3, NdFloat};
use std::any::type_name;

fn cast1<F: NdFloat>(values: Array1<f64>) -> Array1<F> {
    values.mapv(|x| F::from(x).unwrap())
}

fn cast2<F: NdFloat>(values: Array2<f64>) -> Array2<F> {
    values.mapv(|x| F::from(x).unwrap())
}

fn cast3<F: NdFloat>(values: Array3<f64>) -> Array3<F> {
    values.mapv(|x| F::from(x).unwrap())
}

/// A cycling 3-state MRP from Sutton's book (Exercise 10.7).
/// <http://incompleteideas.net/book/RLbook2020.pdf>
pub fn mrp1<F: NdFloat>() -> MarkovRewardProcess<F> {
    MarkovRewardProcess::new(
        cast2(ndarray::arr2(&[
            [0., 1., 0.],
            [0., 0., 1.],
            [1., 0., 0.],
        ])),
        cast1(ndarray::arr1(&[0., 0., 1.])),
        &format!("mrp1 ({})", type_name::<F>()),
    )
    .unwrap()
}

/// A multichain 4-state MRP: three communicating states plus an absorbing one.
pub fn mrp2<F: NdFloat>() -> MarkovRewardProcess<F> {
    MarkovRewardProcess::new(
        cast2(ndarray::arr2(&[
            [0., 0.9, 0.1, 0.],
            [0.1, 0., 0.9, 0.],
            [0.9, 0.1, 0., 0.],
            [0., 0., 0., 1.],
        ])),
        cast1(ndarray::arr1(&[0., 1., 8., 20.])),
        &format!("mrp2 ({})", type_name::<F>()),
    )
    .unwrap()
}

/// A unichain 2-state MRP.
pub fn mrp3<F: NdFloat>() -> MarkovRewardProcess<F> {
    MarkovRewardProcess::new(
        cast2(ndarray::arr2(&[[0.2, 0.8], [0.2, 0.8]])),
        cast1(ndarray::arr1(&[1., 1.])),
        &format!("mrp3 ({})", type_name::<F>()),
    )
    .unwrap()
}

/// A 2-state MDP where the first action stays put for reward 1 and the
/// second swaps states for reward 0.
pub fn mdp1<F: NdFloat>() -> MarkovDecisionProcess<F> {
    MarkovDecisionProcess::new(
        cast3(ndarray::arr3(&[
            [[1., 0.], [0., 1.]], // first action
            [[0., 1.], [1., 0.]], // second action
        ])),
        cast2(ndarray::arr2(&[
            [1., 1.], // first action
            [0., 0.], // second action
        ])),
        &format!("mdp1 ({})", type_name::<F>()),
    )
    .unwrap()
}

/// A 2-state MDP whose states do not communicate, so the two recurrent
/// classes carry different average rewards.
pub fn mdp2<F: NdFloat>() -> MarkovDecisionProcess<F> {
    MarkovDecisionProcess::new(
        cast3(ndarray::arr3(&[
            [[1., 0.], [0., 1.]], // first action
            [[1., 0.], [0., 1.]], // second action
        ])),
        cast2(ndarray::arr2(&[
            [1., 1.], // first action
            [0., 2.], // second action
        ])),
        &format!("mdp2 ({})", type_name::<F>()),
    )
    .unwrap()
}

/// A 3-state MDP with dense stochastic transitions.
pub fn mdp3<F: NdFloat>() -> MarkovDecisionProcess<F> {
    MarkovDecisionProcess::new(
        cast3(ndarray::arr3(&[
            [
                [0.5, 0.25, 0.25],
                [0.25, 0.5, 0.25],
                [0.25, 0.25, 0.5],
            ], // first action
            [
                [0.25, 0.5, 0.25],
                [0.25, 0.25, 0.5],
                [0.5, 0.25, 0.25],
            ], // second action
        ])),
        cast2(ndarray::arr2(&[
            [1., 2., 3.], // first action
            [0., 0., 0.], // second action
        ])),
        &format!("mdp3 ({})", type_name::<F>()),
    )
    .unwrap()
}

/// A 7-state admission-control MDP, a stress case for multichain control
/// with a single shared offset.
pub fn mdp4<F: NdFloat>() -> MarkovDecisionProcess<F> {
    MarkovDecisionProcess::new(
        cast3(ndarray::arr3(&[
            // First action (continue)
            [
                [0.5, 0.5, 0., 0., 0., 0., 0.],
                [0.5, 0.5, 0., 0., 0., 0., 0.],
                [0.5, 0., 0., 0.5, 0., 0., 0.],
                [0.5, 0., 0., 0.5, 0., 0., 0.],
                [0., 0., 0.5, 0., 0., 0.5, 0.],
                [0., 0., 0.5, 0., 0., 0.5, 0.],
                [0., 0., 0., 0., 0.5, 0., 0.5],
            ],
            // Second action (admit)
            [
                [0.5, 0.5, 0., 0., 0., 0., 0.],
                [0.5, 0., 0., 0.5, 0., 0., 0.],
                [0.5, 0., 0., 0.5, 0., 0., 0.],
                [0., 0., 0.5, 0., 0., 0.5, 0.],
                [0., 0., 0.5, 0., 0., 0.5, 0.],
                [0., 0., 0., 0., 0.5, 0., 0.5],
                [0., 0., 0., 0., 0.5, 0., 0.5],
            ],
        ])),
        cast2(ndarray::arr2(&[
            [0., 0., -1., -1., -2., -2., -3.],  // first action (continue)
            [-1., 9., -2., 8., -3., 7., -4.],   // second action (admit)
        ])),
        &format!("mdp4 ({})", type_name::<F>()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micro_environments_are_well_formed() {
        assert_eq!(mrp1::<f32>().num_states(), 3);
        assert_eq!(mrp2::<f64>().num_states(), 4);
        assert_eq!(mrp3::<f64>().num_states(), 2);
        assert_eq!(mdp1::<f64>().num_actions(), 2);
        assert_eq!(mdp2::<f32>().num_states(), 2);
        assert_eq!(mdp3::<f64>().num_states(), 3);
        let mdp4 = mdp4::<f64>();
        assert_eq!(mdp4.num_states(), 7);
        assert_eq!(mdp4.num_actions(), 2);
    }
}
