//! Username onboarding and persistence.
//!
//! The username is the identity the backend tracks levels against and the
//! hostname stamped onto sandboxes. It is prompted for once and stored under
//! `~/.warplay/user.toml` for reuse across invocations.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const USER_DIR: &str = ".warplay";
const USER_FILE: &str = "user.toml";

/// Stored user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend identifier, `LD` followed by digits.
    pub username: String,
    /// When the username was first saved.
    pub registered_at: DateTime<Utc>,
}

fn user_file_path(home: &Path) -> PathBuf {
    home.join(USER_DIR).join(USER_FILE)
}

/// Usernames are `LD` followed by digits, e.g. `LD42`.
pub fn is_valid_username(username: &str) -> bool {
    username.len() > 2
        && username.starts_with("LD")
        && username[2..].chars().all(|c| c.is_ascii_digit())
}

/// Load the stored profile, if any. A file holding an invalid username is
/// treated as absent so the user gets re-prompted.
pub fn load(home: &Path) -> Result<Option<UserProfile>> {
    let path = user_file_path(home);

    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read user file: {}", path.display()))?;

    let Ok(profile) = toml::from_str::<UserProfile>(&content) else {
        return Ok(None);
    };

    if is_valid_username(&profile.username) {
        Ok(Some(profile))
    } else {
        Ok(None)
    }
}

/// Persist the username with a registration timestamp.
pub fn save(home: &Path, username: &str) -> Result<UserProfile> {
    let profile = UserProfile {
        username: username.to_string(),
        registered_at: Utc::now(),
    };

    let path = user_file_path(home);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(&profile).context("Failed to serialize user profile")?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write user file: {}", path.display()))?;

    Ok(profile)
}

/// Return the stored username or prompt until a valid one is entered.
pub fn get_or_prompt(home: &Path, input: &mut dyn BufRead) -> Result<String> {
    if let Some(profile) = load(home)? {
        println!(
            "{}",
            format!("Welcome back, {}!", profile.username).yellow().bold()
        );
        return Ok(profile.username);
    }

    loop {
        print!("{}", "Enter your CTF username: ".magenta().bold());
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("Failed to read username input")?;
        if read == 0 {
            bail!("No username entered");
        }

        let username = line.trim();
        if username.is_empty() {
            continue;
        }
        if !is_valid_username(username) {
            println!("{}", "Invalid username!".red().bold());
            continue;
        }

        save(home, username)?;
        println!(
            "{}",
            format!("Your username is set to {username}.").yellow().bold()
        );
        return Ok(username.to_string());
    }
}
