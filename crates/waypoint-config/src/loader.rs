// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./waypoint.toml` > `~/.config/waypoint/waypoint.toml` > `/etc/waypoint/waypoint.toml`
//! with environment variable overrides via `WAYPOINT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use tracing::debug;

use crate::model::WaypointConfig;

/// System-wide config path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/waypoint/waypoint.toml";

/// Local config file name, resolved against the working directory.
pub const LOCAL_CONFIG_FILE: &str = "waypoint.toml";

/// User config path under the XDG config directory, if one exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("waypoint").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/waypoint/waypoint.toml`
/// 3. `~/.config/waypoint/waypoint.toml`
/// 4. `./waypoint.toml`
/// 5. `WAYPOINT_*` environment variables
pub fn load_config() -> Result<WaypointConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<WaypointConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WaypointConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WaypointConfig, figment::Error> {
    debug!(path = %path.display(), "loading config file");
    Figment::new()
        .merge(Serialized::defaults(WaypointConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used for hierarchical loading, before extraction.
pub fn build_figment() -> Figment {
    let user_path = user_config_path().unwrap_or_default();
    let candidates = [
        Path::new(SYSTEM_CONFIG_PATH),
        user_path.as_path(),
        Path::new(LOCAL_CONFIG_FILE),
    ];
    for path in candidates {
        if path.is_file() {
            debug!(path = %path.display(), "config file found");
        }
    }
    Figment::new()
        .merge(Serialized::defaults(WaypointConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_path))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider mapping `WAYPOINT_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys themselves
/// contain underscores: `WAYPOINT_SERVER_ADMIN_TOKEN` must become
/// `server.admin_token`, not `server.admin.token`. Nested similarity keys
/// use `WAYPOINT_CACHE_SIMILARITY_<KEY>`.
fn env_provider() -> Env {
    Env::prefixed("WAYPOINT_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    if let Some(rest) = key.strip_prefix("cache_similarity_") {
        return format!("cache.similarity.{rest}");
    }
    for section in ["server", "breaker", "cache", "classifier", "prometheus"] {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key
}
