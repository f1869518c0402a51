//! Scripts for deploying a release of contracts and wiring their permissions,
//! recording every deployed address per network.

#![deny(missing_docs)]

pub mod artifacts;
pub mod chain;
pub mod cli;
mod commands;
pub mod compiled;
pub mod config;
pub mod constants;
pub mod deployer;
pub mod errors;
pub mod plan;
pub mod resolver;
pub mod solidity;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod types;
pub mod wiring;
