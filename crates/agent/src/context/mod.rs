//! Prompt assembly from the rolling window and the memory bank.

pub mod assembler;

pub use assembler::{ContextAssembler, TOOL_INSTRUCTIONS};
