// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Serde helpers shared by the component configuration structs.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Deserializes a `Duration` from human duration text ("30s", "5m").
pub(crate) fn duration_from_text<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
}
