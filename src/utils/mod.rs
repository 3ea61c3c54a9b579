// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Utility modules
//!
//! Terminal output helpers shared by the CLI commands.

pub mod colors;
pub mod spinner;

pub use colors::*;
pub use spinner::*;
