//! relmatrix-lib: Core types and logic for relmatrix
//!
//! This crate implements the build-and-release pipeline:
//! - `matrix`: the declarative target matrix and its loader
//! - `provision`: per-platform toolchain preparation
//! - `execute`: build procedure invocation
//! - `artifact`: artifact location after a successful build
//! - `publish`: idempotent release asset uploads
//! - `run`: fan-out orchestration and outcome aggregation

pub mod artifact;
pub mod execute;
pub mod matrix;
pub mod platform;
pub mod provision;
pub mod publish;
pub mod run;
