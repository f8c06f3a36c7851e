//! Tools the model can call during a turn.

mod calculator;

pub use calculator::{CalculatorInput, CalculatorTool, EvalError, evaluate};
