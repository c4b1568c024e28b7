//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock or simulation adapters. All tests run on the host with no
//! real hardware required.

#![cfg(not(target_os = "espidf"))]

mod bridge_tests;
mod gateway_flow_tests;
mod link_tests;
mod mock_hw;
mod relay_tests;
