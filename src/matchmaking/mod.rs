pub mod challenge;
pub mod error;
pub mod queue;
pub mod service;

pub use error::DuelError;
pub use service::DuelService;
