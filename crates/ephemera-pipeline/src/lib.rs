// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ephemera-pipeline — apply operations to stored artifacts.
//
// Every transformation reads its inputs through the artifact store, hands
// the bytes to a `DocumentEngine`, and stores the result as new artifacts.
// Inputs are never modified. The whole operation runs under a deadline.

pub mod naming;
pub mod pipeline;

pub use pipeline::{Inspection, Pipeline, TransformOutcome};
