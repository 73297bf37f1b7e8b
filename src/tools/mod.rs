//! Example tool implementations bundled with the crate.

pub mod calculator;

pub use calculator::{Calculator, CalculatorError, CalculatorResult, CalculatorTool};
