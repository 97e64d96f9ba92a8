//! Evaluation and Control implementations of Relative Value Iteration.
//!
//! RVI subtracts the value of a fixed reference state from every Bellman
//! residual instead of learning a separate average-reward offset; the
//! reference state's value converges to the average reward, and
//! convergence depends on the reference state communicating with the
//! recurrent classes of interest.

use super::{best_action, best_action_at, lookahead_table, one_hot_policy, StepDelta};
use crate::environments::structure::{MarkovDecisionProcess, MarkovRewardProcess};
use ndarray::{Array1, Array2, ArrayView1, NdFloat};
use std::rc::Rc;
use tracing::warn;

/// RVI for prediction on a fixed MRP.
pub struct Evaluation<F: NdFloat> {
    mrp: Rc<MarkovRewardProcess<F>>,
    initial_values: Array1<F>,
    step_size: F,
    reference_index: usize,
    synchronized: bool,
    current_values: Array1<F>,
    index: usize,
}

impl<F: NdFloat> Evaluation<F> {
    /// `initial_values` must have one entry per state of `mrp`, and
    /// `reference_index` must name a valid state.
    pub fn new(
        mrp: Rc<MarkovRewardProcess<F>>,
        initial_values: Array1<F>,
        step_size: F,
        reference_index: usize,
        synchronized: bool,
    ) -> Self {
        assert_eq!(
            initial_values.len(),
            mrp.num_states(),
            "initial values must cover every state of {}",
            mrp.name()
        );
        assert!(
            reference_index < mrp.num_states(),
            "reference index {} out of range for {}",
            reference_index,
            mrp.name()
        );
        let current_values = initial_values.clone();
        Self {
            mrp,
            initial_values,
            step_size,
            reference_index,
            synchronized,
            current_values,
            index: 0,
        }
    }

    fn update_sync(&mut self) -> StepDelta<F> {
        let reference_value = self.current_values[self.reference_index];
        let expected_values = self.mrp.transitions().dot(&self.current_values);
        let mut changes = &expected_values - &self.current_values + self.mrp.rewards();
        changes.mapv_inplace(|c| c - reference_value);
        self.current_values.scaled_add(self.step_size, &changes);
        StepDelta::Sweep(changes)
    }

    fn update_async(&mut self) -> StepDelta<F> {
        let state = self.index;
        let expected_value = self.mrp.transitions().row(state).dot(&self.current_values);
        let change = self.mrp.rewards()[state] + expected_value
            - self.current_values[self.reference_index]
            - self.current_values[state];
        self.current_values[state] = self.current_values[state] + self.step_size * change;
        self.index = (state + 1) % self.mrp.num_states();
        StepDelta::Single(change)
    }
}

impl<F: NdFloat> super::Evaluation<F> for Evaluation<F> {
    fn reset(&mut self) {
        self.current_values = self.initial_values.clone();
        self.index = 0;
    }

    fn diverged(&self) -> bool {
        if !self.current_values.iter().all(|v| v.is_finite()) {
            warn!("current values not finite in RVI");
            return true;
        }
        false
    }

    fn update(&mut self) -> StepDelta<F> {
        if self.synchronized {
            self.update_sync()
        } else {
            self.update_async()
        }
    }

    fn estimates(&self) -> Option<ArrayView1<'_, F>> {
        Some(self.current_values.view())
    }
}

/// RVI for control: greedy Bellman lookahead, then the same residual rule
/// as prediction.
pub struct Control<F: NdFloat> {
    mdp: Rc<MarkovDecisionProcess<F>>,
    initial_values: Array1<F>,
    step_size: F,
    reference_index: usize,
    synchronized: bool,
    current_values: Array1<F>,
    index: usize,
}

impl<F: NdFloat> Control<F> {
    /// `initial_values` must have one entry per state of `mdp`, and
    /// `reference_index` must name a valid state.
    pub fn new(
        mdp: Rc<MarkovDecisionProcess<F>>,
        initial_values: Array1<F>,
        step_size: F,
        reference_index: usize,
        synchronized: bool,
    ) -> Self {
        assert_eq!(
            initial_values.len(),
            mdp.num_states(),
            "initial values must cover every state of {}",
            mdp.name()
        );
        assert!(
            reference_index < mdp.num_states(),
            "reference index {} out of range for {}",
            reference_index,
            mdp.name()
        );
        let current_values = initial_values.clone();
        Self {
            mdp,
            initial_values,
            step_size,
            reference_index,
            synchronized,
            current_values,
            index: 0,
        }
    }

    fn update_sync(&mut self) -> StepDelta<F> {
        let reference_value = self.current_values[self.reference_index];
        let table = lookahead_table(&self.mdp, &self.current_values);
        let mut changes = Array1::zeros(self.mdp.num_states());
        for (state, change) in changes.iter_mut().enumerate() {
            let (_, best) = best_action(table.column(state));
            *change = best - reference_value - self.current_values[state];
        }
        self.current_values.scaled_add(self.step_size, &changes);
        StepDelta::Sweep(changes)
    }

    fn update_async(&mut self) -> StepDelta<F> {
        let state = self.index;
        let (_, best) = best_action_at(&self.mdp, &self.current_values, state);
        let change =
            best - self.current_values[self.reference_index] - self.current_values[state];
        self.current_values[state] = self.current_values[state] + self.step_size * change;
        self.index = (state + 1) % self.mdp.num_states();
        StepDelta::Single(change)
    }
}

impl<F: NdFloat> super::Evaluation<F> for Control<F> {
    fn reset(&mut self) {
        self.current_values = self.initial_values.clone();
        self.index = 0;
    }

    fn diverged(&self) -> bool {
        if !self.current_values.iter().all(|v| v.is_finite()) {
            warn!("current values not finite in RVI Control");
            return true;
        }
        false
    }

    fn update(&mut self) -> StepDelta<F> {
        if self.synchronized {
            self.update_sync()
        } else {
            self.update_async()
        }
    }

    fn estimates(&self) -> Option<ArrayView1<'_, F>> {
        Some(self.current_values.view())
    }
}

impl<F: NdFloat> super::Control<F> for Control<F> {
    fn greedy_policy(&self) -> Array2<F> {
        let reference_value = self.current_values[self.reference_index];
        let mut table = lookahead_table(&self.mdp, &self.current_values);
        table.mapv_inplace(|q| q - reference_value);
        let greedy: Vec<usize> = (0..self.mdp.num_states())
            .map(|state| best_action(table.column(state)).0)
            .collect();
        one_hot_policy(&greedy, self.mdp.num_actions())
    }

    fn types_ok(&self) -> bool {
        true
    }
}
