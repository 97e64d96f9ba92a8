//! Evaluation and Control implementations of Differential Value Iteration.
//!
//! DVI subtracts a learned average-reward estimate `r_bar` from every
//! Bellman residual, which keeps the value estimates bounded for processes
//! with nonzero average reward.

use super::{best_action, best_action_at, lookahead_table, one_hot_policy, StepDelta};
use crate::environments::structure::{MarkovDecisionProcess, MarkovRewardProcess};
use ndarray::{Array1, Array2, ArrayView1, NdFloat};
use std::rc::Rc;
use tracing::warn;

/// DVI for prediction on a fixed MRP.
pub struct Evaluation<F: NdFloat> {
    mrp: Rc<MarkovRewardProcess<F>>,
    initial_values: Array1<F>,
    initial_r_bar: F,
    step_size: F,
    beta: F,
    synchronized: bool,
    current_values: Array1<F>,
    r_bar: F,
    index: usize,
}

impl<F: NdFloat> Evaluation<F> {
    /// `initial_values` must have one entry per state of `mrp`.
    pub fn new(
        mrp: Rc<MarkovRewardProcess<F>>,
        initial_values: Array1<F>,
        initial_r_bar: F,
        step_size: F,
        beta: F,
        synchronized: bool,
    ) -> Self {
        assert_eq!(
            initial_values.len(),
            mrp.num_states(),
            "initial values must cover every state of {}",
            mrp.name()
        );
        let current_values = initial_values.clone();
        Self {
            mrp,
            initial_values,
            initial_r_bar,
            step_size,
            beta,
            synchronized,
            current_values,
            r_bar: initial_r_bar,
            index: 0,
        }
    }

    pub fn r_bar(&self) -> F {
        self.r_bar
    }

    fn update_sync(&mut self) -> StepDelta<F> {
        let r_bar = self.r_bar;
        let expected_values = self.mrp.transitions().dot(&self.current_values);
        let mut changes = &expected_values - &self.current_values + self.mrp.rewards();
        changes.mapv_inplace(|c| c - r_bar);
        self.current_values.scaled_add(self.step_size, &changes);
        self.r_bar = self.r_bar + self.beta * changes.sum();
        StepDelta::Sweep(changes)
    }

    fn update_async(&mut self) -> StepDelta<F> {
        let state = self.index;
        let expected_value = self.mrp.transitions().row(state).dot(&self.current_values);
        let change =
            self.mrp.rewards()[state] - self.r_bar + expected_value - self.current_values[state];
        self.current_values[state] = self.current_values[state] + self.step_size * change;
        self.r_bar = self.r_bar + self.beta * change;
        self.index = (state + 1) % self.mrp.num_states();
        StepDelta::Single(change)
    }
}

impl<F: NdFloat> super::Evaluation<F> for Evaluation<F> {
    fn reset(&mut self) {
        self.current_values = self.initial_values.clone();
        self.r_bar = self.initial_r_bar;
        self.index = 0;
    }

    fn diverged(&self) -> bool {
        if !self.current_values.iter().all(|v| v.is_finite()) {
            warn!("current values not finite in DVI");
            return true;
        }
        if !self.r_bar.is_finite() {
            warn!("r_bar not finite in DVI");
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

/// DVI for control: the greedy one-step lookahead replaces the fixed
/// reward/transition row, the residual and offset rules stay the same.
pub struct Control<F: NdFloat> {
    mdp: Rc<MarkovDecisionProcess<F>>,
    initial_values: Array1<F>,
    initial_r_bar: F,
    step_size: F,
    beta: F,
    synchronized: bool,
    current_values: Array1<F>,
    r_bar: F,
    index: usize,
}

impl<F: NdFloat> Control<F> {
    /// `initial_values` must have one entry per state of `mdp`.
    pub fn new(
        mdp: Rc<MarkovDecisionProcess<F>>,
        initial_values: Array1<F>,
        initial_r_bar: F,
        step_size: F,
        beta: F,
        synchronized: bool,
    ) -> Self {
        assert_eq!(
            initial_values.len(),
            mdp.num_states(),
            "initial values must cover every state of {}",
            mdp.name()
        );
        let current_values = initial_values.clone();
        Self {
            mdp,
            initial_values,
            initial_r_bar,
            step_size,
            beta,
            synchronized,
            current_values,
            r_bar: initial_r_bar,
            index: 0,
        }
    }

    pub fn r_bar(&self) -> F {
        self.r_bar
    }

    fn update_sync(&mut self) -> StepDelta<F> {
        let table = lookahead_table(&self.mdp, &self.current_values);
        let mut changes = Array1::zeros(self.mdp.num_states());
        for (state, change) in changes.iter_mut().enumerate() {
            let (_, best) = best_action(table.column(state));
            *change = best - self.r_bar - self.current_values[state];
        }
        self.current_values.scaled_add(self.step_size, &changes);
        self.r_bar = self.r_bar + self.beta * changes.sum();
        StepDelta::Sweep(changes)
    }

    fn update_async(&mut self) -> StepDelta<F> {
        let state = self.index;
        let (_, best) = best_action_at(&self.mdp, &self.current_values, state);
        let change = best - self.r_bar - self.current_values[state];
        self.current_values[state] = self.current_values[state] + self.step_size * change;
        self.r_bar = self.r_bar + self.beta * change;
        self.index = (state + 1) % self.mdp.num_states();
        StepDelta::Single(change)
    }
}

impl<F: NdFloat> super::Evaluation<F> for Control<F> {
    fn reset(&mut self) {
        self.current_values = self.initial_values.clone();
        self.r_bar = self.initial_r_bar;
        self.index = 0;
    }

    fn diverged(&self) -> bool {
        if !self.current_values.iter().all(|v| v.is_finite()) {
            warn!("current values not finite in DVI Control");
            return true;
        }
        if !self.r_bar.is_finite() {
            warn!("r_bar not finite in DVI Control");
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
        let r_bar = self.r_bar;
        let mut table = lookahead_table(&self.mdp, &self.current_values);
        table.mapv_inplace(|q| q - r_bar);
        let greedy: Vec<usize> = (0..self.mdp.num_states())
            .map(|state| best_action(table.column(state)).0)
            .collect();
        one_hot_policy(&greedy, self.mdp.num_actions())
    }

    fn types_ok(&self) -> bool {
        true
    }
}
