//! Core business logic module with pure functions
//!
//! Nothing in here performs I/O: functions take inputs and return outputs,
//! so they can be tested without spawning any processes.

pub mod mapreduce;
