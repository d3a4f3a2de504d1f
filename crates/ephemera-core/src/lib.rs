// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ephemera — core types, operation parameters and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod ops;
pub mod public_error;
pub mod traits;
pub mod types;

pub use config::EphemeraConfig;
pub use error::{EphemeraError, Result};
pub use public_error::{ErrorKind, PublicError};
pub use types::*;
