//! Random control baseline: estimates nothing, changes nothing, and plays
//! the uniform policy. Used as a comparison floor in the harness tests.

use super::StepDelta;
use crate::environments::structure::MarkovDecisionProcess;
use ndarray::{Array1, Array2, ArrayView1, NdFloat};
use std::rc::Rc;

pub struct Control<F: NdFloat> {
    mdp: Rc<MarkovDecisionProcess<F>>,
    synchronized: bool,
}

impl<F: NdFloat> Control<F> {
    pub fn new(
        mdp: Rc<MarkovDecisionProcess<F>>,
        _initial_values: Array1<F>,
        synchronized: bool,
    ) -> Self {
        Self { mdp, synchronized }
    }
}

impl<F: NdFloat> super::Evaluation<F> for Control<F> {
    fn reset(&mut self) {}

    fn diverged(&self) -> bool {
        false
    }

    fn update(&mut self) -> StepDelta<F> {
        if self.synchronized {
            StepDelta::Sweep(Array1::zeros(self.mdp.num_states()))
        } else {
            StepDelta::Single(F::zero())
        }
    }

    fn estimates(&self) -> Option<ArrayView1<'_, F>> {
        None
    }
}

impl<F: NdFloat> super::Control<F> for Control<F> {
    fn greedy_policy(&self) -> Array2<F> {
        let action_probability = F::one() / F::from(self.mdp.num_actions()).unwrap();
        Array2::from_elem(
            (self.mdp.num_actions(), self.mdp.num_states()),
            action_probability,
        )
    }

    fn types_ok(&self) -> bool {
        true
    }
}
