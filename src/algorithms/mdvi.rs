//! Multichain Differential Value Iteration for control.
//!
//! DVI's single learned offset cannot represent the average rewards of an
//! MDP with several recurrent classes: the classes fight over `r_bar` and
//! the value estimates never settle. The two variants here keep DVI's
//! greedy Bellman-residual structure and differ only in how the offset is
//! tracked.
//!
//! `Control1` keeps the scalar offset but gates its update behind a
//! threshold: once the prospective offset step is small the offset holds
//! still, and any residual value drift is uniform within a class, which
//! cannot change a greedy argmax because transition rows are stochastic.
//!
//! `Control2` tracks one offset per state and mixes offsets along the
//! currently greedy transitions, so states in the same recurrent class
//! settle on a shared average reward while distinct classes keep their own.

use super::{best_action, best_action_at, lookahead_table, one_hot_policy, StepDelta};
use crate::environments::structure::MarkovDecisionProcess;
use ndarray::{Array1, Array2, ArrayView1, Axis, NdFloat};
use std::rc::Rc;
use tracing::warn;

/// Multichain DVI with a scalar offset and a threshold-gated offset update.
pub struct Control1<F: NdFloat> {
    mdp: Rc<MarkovDecisionProcess<F>>,
    initial_values: Array1<F>,
    initial_r_bar: F,
    step_size: F,
    beta: F,
    threshold: F,
    synchronized: bool,
    current_values: Array1<F>,
    r_bar: F,
    index: usize,
}

impl<F: NdFloat> Control1<F> {
    /// `initial_values` must have one entry per state of `mdp`.
    pub fn new(
        mdp: Rc<MarkovDecisionProcess<F>>,
        initial_values: Array1<F>,
        initial_r_bar: F,
        step_size: F,
        beta: F,
        threshold: F,
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
            threshold,
            synchronized,
            current_values,
            r_bar: initial_r_bar,
            index: 0,
        }
    }

    pub fn r_bar(&self) -> F {
        self.r_bar
    }

    /// Applies the offset step only while it is still material; below the
    /// threshold the offset is considered stabilized.
    fn nudge_offset(&mut self, offset_step: F) {
        if offset_step.abs() >= self.threshold {
            self.r_bar = self.r_bar + offset_step;
        }
    }

    fn update_sync(&mut self) -> StepDelta<F> {
        let table = lookahead_table(&self.mdp, &self.current_values);
        let mut changes = Array1::zeros(self.mdp.num_states());
        for (state, change) in changes.iter_mut().enumerate() {
            let (_, best) = best_action(table.column(state));
            *change = best - self.r_bar - self.current_values[state];
        }
        self.current_values.scaled_add(self.step_size, &changes);
        let offset_step = self.beta * changes.sum();
        self.nudge_offset(offset_step);
        StepDelta::Sweep(changes)
    }

    fn update_async(&mut self) -> StepDelta<F> {
        let state = self.index;
        let (_, best) = best_action_at(&self.mdp, &self.current_values, state);
        let change = best - self.r_bar - self.current_values[state];
        self.current_values[state] = self.current_values[state] + self.step_size * change;
        let offset_step = self.beta * change;
        self.nudge_offset(offset_step);
        self.index = (state + 1) % self.mdp.num_states();
        StepDelta::Single(change)
    }
}

impl<F: NdFloat> super::Evaluation<F> for Control1<F> {
    fn reset(&mut self) {
        self.current_values = self.initial_values.clone();
        self.r_bar = self.initial_r_bar;
        self.index = 0;
    }

    fn diverged(&self) -> bool {
        if !self.current_values.iter().all(|v| v.is_finite()) {
            warn!("current values not finite in MDVI Control1");
            return true;
        }
        if !self.r_bar.is_finite() {
            warn!("r_bar not finite in MDVI Control1");
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

impl<F: NdFloat> super::Control<F> for Control1<F> {
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

/// Multichain DVI with one offset per state, mixed along greedy transitions.
pub struct Control2<F: NdFloat> {
    mdp: Rc<MarkovDecisionProcess<F>>,
    initial_values: Array1<F>,
    initial_r_bar: F,
    step_size: F,
    beta: F,
    synchronized: bool,
    current_values: Array1<F>,
    r_bar: Array1<F>,
    index: usize,
}

impl<F: NdFloat> Control2<F> {
    /// `initial_values` must have one entry per state of `mdp`. The offset
    /// vector starts uniform at `initial_r_bar`.
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
        let r_bar = Array1::from_elem(mdp.num_states(), initial_r_bar);
        Self {
            mdp,
            initial_values,
            initial_r_bar,
            step_size,
            beta,
            synchronized,
            current_values,
            r_bar,
            index: 0,
        }
    }

    /// Per-state average-reward estimates; within one recurrent class they
    /// mix toward that class's gain.
    pub fn r_bar(&self) -> ArrayView1<'_, F> {
        self.r_bar.view()
    }

    /// Greedy action and offset-corrected residual for one state.
    fn residual_at(&self, state: usize) -> (usize, F) {
        let (action, best) = best_action_at(&self.mdp, &self.current_values, state);
        (
            action,
            best - self.r_bar[state] - self.current_values[state],
        )
    }

    fn update_sync(&mut self) -> StepDelta<F> {
        let num_states = self.mdp.num_states();
        let table = lookahead_table(&self.mdp, &self.current_values);
        let mut changes = Array1::zeros(num_states);
        let mut greedy = vec![0usize; num_states];
        for state in 0..num_states {
            let (action, best) = best_action(table.column(state));
            greedy[state] = action;
            changes[state] = best - self.r_bar[state] - self.current_values[state];
        }
        self.current_values.scaled_add(self.step_size, &changes);
        self.r_bar.scaled_add(self.beta, &changes);
        // Mix offsets along the greedy transitions so states in the same
        // recurrent class settle on a shared average reward.
        let mixed = Array1::from_shape_fn(num_states, |state| {
            let expected_offset = self
                .mdp
                .transitions()
                .index_axis(Axis(0), greedy[state])
                .row(state)
                .dot(&self.r_bar);
            self.r_bar[state] + self.beta * (expected_offset - self.r_bar[state])
        });
        self.r_bar = mixed;
        StepDelta::Sweep(changes)
    }

    fn update_async(&mut self) -> StepDelta<F> {
        let state = self.index;
        let (action, change) = self.residual_at(state);
        self.current_values[state] = self.current_values[state] + self.step_size * change;
        self.r_bar[state] = self.r_bar[state] + self.beta * change;
        let expected_offset = self
            .mdp
            .transitions()
            .index_axis(Axis(0), action)
            .row(state)
            .dot(&self.r_bar);
        self.r_bar[state] =
            self.r_bar[state] + self.beta * (expected_offset - self.r_bar[state]);
        self.index = (state + 1) % self.mdp.num_states();
        StepDelta::Single(change)
    }
}

impl<F: NdFloat> super::Evaluation<F> for Control2<F> {
    fn reset(&mut self) {
        self.current_values = self.initial_values.clone();
        self.r_bar = Array1::from_elem(self.mdp.num_states(), self.initial_r_bar);
        self.index = 0;
    }

    fn diverged(&self) -> bool {
        if !self.current_values.iter().all(|v| v.is_finite()) {
            warn!("current values not finite in MDVI Control2");
            return true;
        }
        if !self.r_bar.iter().all(|r| r.is_finite()) {
            warn!("r_bar not finite in MDVI Control2");
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

impl<F: NdFloat> super::Control<F> for Control2<F> {
    fn greedy_policy(&self) -> Array2<F> {
        // The per-state offset shifts a whole column, so the argmax is the
        // same with or without it.
        let table = lookahead_table(&self.mdp, &self.current_values);
        let greedy: Vec<usize> = (0..self.mdp.num_states())
            .map(|state| best_action(table.column(state)).0)
            .collect();
        one_hot_policy(&greedy, self.mdp.num_actions())
    }

    fn types_ok(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Control as _, Evaluation as _};
    use super::*;
    use crate::environments::micro;
    use float_eq::assert_float_eq;
    use ndarray::arr2;

    #[test]
    fn control1_finds_the_stay_policy_on_mdp1() {
        let environment = Rc::new(micro::mdp1::<f64>());
        let mut algorithm = Control1::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            0.01,
            true,
        );

        for _ in 0..500 {
            algorithm.update();
        }
        assert!(!algorithm.diverged());
        assert_eq!(algorithm.greedy_policy(), arr2(&[[1., 1.], [0., 0.]]));
        // The offset settles near the gain of 1 and then holds.
        assert_float_eq!(algorithm.r_bar(), 1., abs <= 0.1);
    }

    #[test]
    fn control2_finds_the_stay_policy_on_mdp1() {
        let environment = Rc::new(micro::mdp1::<f64>());
        let mut algorithm = Control2::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            true,
        );

        for _ in 0..500 {
            algorithm.update();
        }
        assert!(!algorithm.diverged());
        assert_eq!(algorithm.greedy_policy(), arr2(&[[1., 1.], [0., 0.]]));
    }

    #[test]
    fn control1_stays_on_policy_when_classes_disagree() {
        // mdp2's states never communicate and earn different average
        // rewards, so no scalar offset fits both; the gate keeps the offset
        // still and the per-class value drift stays uniform.
        let environment = Rc::new(micro::mdp2::<f64>());
        let mut algorithm = Control1::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            0.01,
            true,
        );

        for _ in 0..500 {
            algorithm.update();
        }
        assert!(!algorithm.diverged());
        assert_eq!(algorithm.greedy_policy(), arr2(&[[1., 0.], [0., 1.]]));
    }

    #[test]
    fn control2_learns_per_class_gains_on_mdp2() {
        let environment = Rc::new(micro::mdp2::<f64>());
        let mut algorithm = Control2::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            true,
        );

        for _ in 0..1000 {
            algorithm.update();
        }
        assert!(!algorithm.diverged());
        assert_eq!(algorithm.greedy_policy(), arr2(&[[1., 0.], [0., 1.]]));
        // One recurrent class earns 1 per step, the other 2.
        assert_float_eq!(algorithm.r_bar()[0], 1., abs <= 1e-6);
        assert_float_eq!(algorithm.r_bar()[1], 2., abs <= 1e-6);
    }

    #[test]
    fn multichain_stress_case_stays_finite() {
        let environment = Rc::new(micro::mdp4::<f64>());
        let mut control1 = Control1::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            0.01,
            true,
        );
        let mut control2 = Control2::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            true,
        );

        for _ in 0..1000 {
            control1.update();
            control2.update();
        }
        assert!(!control1.diverged());
        assert!(!control2.diverged());
        assert_eq!(control1.greedy_policy(), control2.greedy_policy());
    }

    #[test]
    fn async_control1_matches_sync_policy_on_mdp3() {
        let environment = Rc::new(micro::mdp3::<f64>());
        let mut sync = Control1::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            0.01,
            true,
        );
        let mut non_sync = Control1::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            0.01,
            false,
        );

        for _ in 0..1000 {
            sync.update();
        }
        for _ in 0..1000 * environment.num_states() {
            non_sync.update();
        }
        assert_eq!(sync.greedy_policy(), non_sync.greedy_policy());
    }

    #[test]
    fn async_control2_matches_sync_policy_on_mdp2() {
        let environment = Rc::new(micro::mdp2::<f64>());
        let mut sync = Control2::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            true,
        );
        let mut non_sync = Control2::new(
            Rc::clone(&environment),
            Array1::zeros(environment.num_states()),
            0.,
            0.1,
            0.1,
            false,
        );

        for _ in 0..1000 {
            sync.update();
        }
        for _ in 0..1000 * environment.num_states() {
            non_sync.update();
        }
        assert!(!non_sync.diverged());
        assert_eq!(sync.greedy_policy(), non_sync.greedy_policy());
        // One state per call still finds both per-class gains.
        assert_float_eq!(non_sync.r_bar()[0], 1., abs <= 1e-6);
        assert_float_eq!(non_sync.r_bar()[1], 2., abs <= 1e-6);
    }
}
