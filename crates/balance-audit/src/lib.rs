//! Rule-based consistency audit of SYSCOHADA trial balances.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
