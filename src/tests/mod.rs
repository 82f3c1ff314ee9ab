//! Test modules for discussbot
//!
//! Flow and client tests live here. Pure helpers are tested next to their code.

#[cfg(test)]
pub mod config_tests;
#[cfg(test)]
pub mod support;
#[cfg(test)]
pub mod webhook_tests;
