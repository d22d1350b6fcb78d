//! Siege contests: phases, registration, battle and outcome

pub mod contest;
pub mod countdown;
pub mod installation;
pub mod outcome;
pub mod phase;
pub mod registration;
pub mod roster;
pub mod schedule;
pub mod scheduler;

pub use contest::{Contest, ContestStatus};
pub use phase::{Phase, Timeline};
pub use registration::{Rejection, Side, Standing};
pub use roster::{FactionParticipation, Roster};
pub use scheduler::{TaskHandle, TaskScheduler, TaskSlot};
