//! Interview session orchestration engine: a timed multi-question interview
//! with network-backed scoring, a deterministic offline fallback, local
//! persistence, and a cross-tab message bus.

pub mod bus;
pub mod config;
pub mod db;
pub mod errors;
pub mod llm_client;
pub mod models;
pub mod resume;
pub mod retry;
pub mod scoring;
pub mod session;
pub mod store;
pub mod timer;

pub use bus::{BusChannel, MessageType, TabBus};
pub use config::Config;
pub use errors::EngineError;
pub use llm_client::LlmClient;
pub use scoring::ScoringEngine;
pub use session::{Orchestrator, Phase, SubmitOutcome};
pub use store::Store;
pub use timer::{Countdown, TimerEvent};
