// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Status Command

use anyhow::Result;

use crate::config::CliConfig;
use crate::display;

/// Shows the cached version and bundle count.
pub fn run(config: &CliConfig) -> Result<()> {
    let state = config.cache()?.state();
    display::display_cache_state(&state, &config.cache_dir.display().to_string());
    Ok(())
}
