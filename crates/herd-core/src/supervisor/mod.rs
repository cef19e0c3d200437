mod background;
mod commands;
mod main;

pub use main::Supervisor;
