pub mod chat;
pub mod memory;
pub mod onboard;
pub mod run;
pub mod status;
