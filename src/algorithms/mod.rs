//! Shared contract for the value-iteration family: the Evaluation and
//! Control capability traits, the per-update delta, and the greedy
//! one-step-lookahead machinery every Control algorithm shares.

pub mod dvi;
pub mod mdvi;
pub mod random;
pub mod rvi;

use crate::environments::structure::MarkovDecisionProcess;
use ndarray::{Array1, Array2, ArrayView1, Axis, NdFloat};

/// The change produced by one call to `update()`: a full per-state vector
/// for a synchronous sweep, a single state's change for an asynchronous one.
#[derive(Clone, Debug, PartialEq)]
pub enum StepDelta<F> {
    Sweep(Array1<F>),
    Single(F),
}

impl<F: NdFloat> StepDelta<F> {
    /// Total magnitude of the step, the callers' convergence measure.
    pub fn abs_sum(&self) -> F {
        match self {
            Self::Sweep(changes) => changes.mapv(|c| c.abs()).sum(),
            Self::Single(change) => change.abs(),
        }
    }
}

/// Prediction: estimate the differential value function of a fixed process.
pub trait Evaluation<F: NdFloat> {
    /// Restores initial values, the initial offset and the asynchronous
    /// cursor, leaving the environment binding intact.
    fn reset(&mut self);

    /// True when any value estimate or the offset has gone non-finite.
    /// Never mutates state; logs a warning when divergence is detected.
    fn diverged(&self) -> bool;

    /// Advances the iteration by exactly one logical step: a full sweep from
    /// a consistent snapshot when synchronized, one state (Gauss-Seidel
    /// style) otherwise.
    fn update(&mut self) -> StepDelta<F>;

    /// Read-only view of the current value estimates. `None` only for
    /// algorithms that do not estimate anything.
    fn estimates(&self) -> Option<ArrayView1<'_, F>>;
}

/// Control: everything Evaluation does, plus an induced greedy policy.
pub trait Control<F: NdFloat>: Evaluation<F> {
    /// A num_actions x num_states matrix placing probability 1 in every
    /// column on the action maximizing the one-step Bellman lookahead.
    /// Ties break to the lowest action index.
    fn greedy_policy(&self) -> Array2<F>;

    /// Whether the supplied value dtype matches the environment's dtype.
    /// The shared element type parameter makes a mismatch unrepresentable,
    /// so this always holds; the query is kept as the contract's surface.
    fn types_ok(&self) -> bool;
}

/// One-step lookahead table: entry (a, s) is `rewards[(a, s)] + (P_a v)_s`.
/// Offsets are the caller's business since they shift whole columns.
pub(crate) fn lookahead_table<F: NdFloat>(
    mdp: &MarkovDecisionProcess<F>,
    values: &Array1<F>,
) -> Array2<F> {
    let mut table = Array2::zeros((mdp.num_actions(), mdp.num_states()));
    for (action, mut row) in table.outer_iter_mut().enumerate() {
        let expected_values = mdp.transitions().index_axis(Axis(0), action).dot(values);
        row.assign(&(&mdp.rewards().row(action) + &expected_values));
    }
    table
}

/// First maximum wins, so ties resolve to the lowest action index.
pub(crate) fn best_action<F: NdFloat>(action_values: ArrayView1<F>) -> (usize, F) {
    let mut best = (0, F::neg_infinity());
    for (action, &value) in action_values.iter().enumerate() {
        if value > best.1 {
            best = (action, value);
        }
    }
    best
}

/// Single-state variant of the lookahead, for asynchronous updates reading
/// the most recently written values of all other states.
pub(crate) fn best_action_at<F: NdFloat>(
    mdp: &MarkovDecisionProcess<F>,
    values: &Array1<F>,
    state: usize,
) -> (usize, F) {
    let mut best = (0, F::neg_infinity());
    for action in 0..mdp.num_actions() {
        let value = mdp.rewards()[[action, state]]
            + mdp
                .transitions()
                .index_axis(Axis(0), action)
                .row(state)
                .dot(values);
        if value > best.1 {
            best = (action, value);
        }
    }
    best
}

pub(crate) fn one_hot_policy<F: NdFloat>(greedy_actions: &[usize], num_actions: usize) -> Array2<F> {
    let mut policy = Array2::zeros((num_actions, greedy_actions.len()));
    for (state, &action) in greedy_actions.iter().enumerate() {
        policy[[action, state]] = F::one();
    }
    policy
}
