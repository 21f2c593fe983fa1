//! Order execution port.
//!
//! The engine only issues target-position instructions; an execution
//! collaborator turns them into fills and reports those back.

use crate::domain::engine::Fill;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::policy::Instruction;

pub trait ExecutionPort {
    /// Called once per bar before signals are evaluated. Marks the
    /// instrument to the bar and returns any trailing-stop fills it caused.
    fn process_bar(&mut self, bar: &OhlcvBar) -> Vec<Fill>;

    /// Execute `instruction` against `bar`. A rejected order yields no fills.
    fn submit(&mut self, instruction: &Instruction, bar: &OhlcvBar) -> Vec<Fill>;

    /// Cash plus marked positions.
    fn equity(&self) -> f64;
}
