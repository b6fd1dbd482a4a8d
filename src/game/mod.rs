//! Duel simulation modules

pub mod combat;
pub mod duel;
pub mod physics;

pub use duel::{DuelSession, SessionCommand, SessionHandle};
