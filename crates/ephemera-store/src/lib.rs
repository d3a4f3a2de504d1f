// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ephemera-store — the only code in Ephemera that touches the storage root.
//
// `ArtifactStore` owns the `<id>.payload` / `<id>.meta.json` file pairs,
// `RetrievalGateway` ingests uploads and serves downloads on top of it, and
// `RetentionSweeper` evicts whatever has outlived the TTL.

pub mod gateway;
pub mod store;
pub mod sweeper;

pub use gateway::{Download, RetrievalGateway, ServePolicy, content_disposition};
pub use store::{ArtifactStore, Listing, StrayFile, StrayKind};
pub use sweeper::{RetentionSweeper, SweepReport, SweeperState};
