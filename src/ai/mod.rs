pub mod client;
pub mod decision;

pub use client::{AiVerdictApi, HttpAiClient};
pub use decision::AiDecision;
