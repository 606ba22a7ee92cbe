pub mod args;
pub mod sim;

pub use args::{Cli, Commands, RunArgs};
pub use sim::{HostClock, Simulation, Summary};
