// Copyright 2026 Fieldwork Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fieldwork library — survey form auto-fill and response harvesting.
//!
//! This library crate exposes the core modules for integration testing.

pub mod cli;
pub mod config;
pub mod driver;
pub mod harvester;
pub mod resolver;
