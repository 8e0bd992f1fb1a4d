//! `Akashic` - scripted terminal breach theatre
//!
//! A timer-driven stage machine plays an intro, a biometric "scan", an
//! access banner, a query prompt and a scripted processing log, then hands
//! a real search URL for the viewer's query to a [`Navigator`].
//!
//! [`Navigator`]: sequence::Navigator

pub mod cli;
pub mod config;
pub mod error;
pub mod noise;
pub mod observability;
pub mod sequence;
