//! Tabular algorithms for the average-reward formulation of finite Markov
//! reward and decision processes: Differential Value Iteration (DVI),
//! Relative Value Iteration (RVI) and two multichain DVI control variants,
//! plus a random baseline to compare them against.
//!
//! Refs: Wan, Naik & Sutton, "Learning and Planning in Average-Reward Markov
//! Decision Processes" (2021); Sutton & Barto 2018, chapter 10.

pub mod algorithms;
pub mod environments;
