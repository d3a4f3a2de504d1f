// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default configuration file location.

use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// `$XDG_CONFIG_HOME/ephemera/config.json`, falling back to
/// `~/.config/ephemera/config.json`.
pub fn default_config_file() -> PathBuf {
    config_base().join("ephemera").join(CONFIG_FILE)
}

fn config_base() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".config");
    }
    // Last resort
    std::env::temp_dir()
}
