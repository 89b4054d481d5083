//! HopeLink weighted matching engine: scoring, recommendations, match creation, and
//! admin-tunable parameters behind an axum router.

pub mod config;
pub mod error;
pub mod matching;
pub mod seed;
pub mod telemetry;
