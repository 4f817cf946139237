//! Small helpers shipped alongside the switch tool. Nothing here talks to a switch.

pub mod hostconfig;
pub mod mqtt;

pub use hostconfig::{by_hostname, by_key, hostname, Overrides};
pub use mqtt::{Messenger, MessengerError, RunningMessenger};
