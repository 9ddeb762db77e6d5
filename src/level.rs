//! Level naming and run profiles.
//!
//! A level is a pure value: everything about it (image reference, sandbox
//! name, run profile) is derived from its number on demand and never stored.

use crate::config::LevelConfig;

/// One stage of the wargame, identified by its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    number: u32,
}

impl Level {
    /// Wraps a level number.
    pub fn new(number: u32) -> Self {
        Self { number }
    }

    /// The level's number.
    pub fn number(self) -> u32 {
        self.number
    }

    /// Full image reference for this level, e.g. `ghcr.io/.../levels:war3`.
    pub fn image_reference(self, levels: &LevelConfig) -> String {
        format!(
            "{}:{}{}",
            levels.repository, levels.tag_prefix, self.number
        )
    }

    /// Container name for this level's sandbox, e.g. `ctf3`.
    pub fn sandbox_name(self) -> String {
        format!("ctf{}", self.number)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "level {}", self.number)
    }
}

/// How a level's sandbox is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunProfile {
    /// Detached sandbox with the user's identity as hostname, /bin/sh entry point.
    Default,
    /// Identity hostname, but the image's native entry point is kept.
    IdentityTagged,
    /// Elevated privileges, no hostname override, /bin/sh entry point.
    Privileged,
}

impl RunProfile {
    /// Per-level profile overrides; levels not listed run the default profile.
    /// The final level wins if it collides with the native-entrypoint level.
    fn overrides(levels: &LevelConfig) -> [(u32, RunProfile); 2] {
        [
            (levels.total, RunProfile::Privileged),
            (levels.native_entrypoint_level, RunProfile::IdentityTagged),
        ]
    }

    /// Resolve the run profile for a level from the override table.
    pub fn for_level(level: Level, levels: &LevelConfig) -> Self {
        Self::overrides(levels)
            .into_iter()
            .find_map(|(number, profile)| (number == level.number()).then_some(profile))
            .unwrap_or(Self::Default)
    }
}
