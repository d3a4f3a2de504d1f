// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ephemera-security — payload fingerprints and passphrase protection.
//
// `integrity` gives the store its SHA-256 digests, both one-shot and
// streaming. `protect` wraps payloads in age envelopes for the `protect`
// transformation.

pub mod integrity;
pub mod protect;

pub use integrity::{StreamDigest, hash_bytes, hash_reader, verify_hash};
pub use protect::{PassphraseCipher, is_age_envelope};
