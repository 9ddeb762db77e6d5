//! Interactive loop for one active level.
//!
//! Reads commands until a correct submission advances the level or the user
//! exits. End-of-input behaves like `exit`.

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{BufRead, Write};
use tracing::debug;

use crate::backend::Backend;
use crate::images::ImageStore;
use crate::sandbox::Sandbox;
use crate::ui;

/// A parsed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit the given flag text for verification.
    Submit(String),
    /// Open the level's interactive shell.
    Play,
    /// Leave the level session.
    Exit,
    /// Anything else; prompts a usage hint.
    Unknown,
}

impl Command {
    /// Parse one input line. Verbs are case-insensitive; the flag text after
    /// `submit` is taken verbatim.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();

        if trimmed
            .get(..7)
            .is_some_and(|p| p.eq_ignore_ascii_case("submit "))
        {
            return Self::Submit(trimmed[7..].trim().to_string());
        }
        if trimmed.eq_ignore_ascii_case("play") {
            return Self::Play;
        }
        if trimmed.eq_ignore_ascii_case("exit") {
            return Self::Exit;
        }
        Self::Unknown
    }
}

/// Run the interactive loop for `level`.
///
/// Returns the new level after a correct submission, or the unchanged level
/// on `exit`/end-of-input. On success the next-next image is prefetched in
/// the background and the current sandbox is removed before returning.
pub async fn run_level(
    level: u32,
    user_id: &str,
    total_levels: u32,
    backend: &dyn Backend,
    images: &dyn ImageStore,
    sandbox: &dyn Sandbox,
    input: &mut dyn BufRead,
) -> Result<u32> {
    ui::section_header(&format!("Welcome {user_id}, to Wargames Level {level}"));
    println!(
        "{}",
        "Submit the flag using 'submit FLAG{...}' below.".green().bold()
    );
    println!(
        "{}",
        "Type 'play' to open your shell. Type 'exit' to quit this level session."
            .green()
            .bold()
    );

    loop {
        print!("{}", format!("level-{level}> ").magenta().bold());
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("Failed to read command input")?;
        if read == 0 {
            // End of input behaves like `exit`.
            debug!(level, "end of input, leaving level session");
            return Ok(level);
        }

        match Command::parse(&line) {
            Command::Submit(flag) => match backend.submit_flag(&flag, user_id).await {
                Ok(result) if result.correct => {
                    println!("{}", "Correct flag! Level up!".green().bold());
                    let new_level = result.new_level.unwrap_or_else(|| level.saturating_add(1));

                    // Hide the pull latency of the level after next, then
                    // drop the finished sandbox so its name can be reused.
                    // checked_add: the backend owns new_level, so it may sit
                    // at the top of the range.
                    if let Some(next) = new_level.checked_add(1) {
                        if next <= total_levels {
                            images.prefetch(next);
                        }
                    }
                    sandbox.remove(level).await;
                    return Ok(new_level);
                }
                Ok(_) => {
                    println!("{}", "Incorrect flag. Try again.".red().bold());
                }
                Err(e) => {
                    debug!(error = %e, "flag submission failed");
                    println!(
                        "{}",
                        "Could not reach the verification service. Try again.".red().bold()
                    );
                }
            },
            Command::Play => {
                if let Err(e) = sandbox.attach(level).await {
                    println!("{}", format!("Could not open the level shell: {e}").red());
                }
            }
            Command::Exit => {
                println!("Exiting current level session.");
                return Ok(level);
            }
            Command::Unknown => {
                println!("Unknown command. Use 'submit FLAG{{...}}', 'play', or 'exit'.");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    //! Scripted collaborators shared by session and controller tests.

    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::backend::{Backend, BackendError, SubmissionResult};
    use crate::images::{ImageError, ImageStore, PullProgress};
    use crate::level::Level;
    use crate::sandbox::{Sandbox, SandboxError};

    /// Ordered record of collaborator calls, shared across mocks.
    pub type EventLog = Arc<Mutex<Vec<String>>>;

    pub fn event_log() -> EventLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn events(log: &EventLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    pub struct ScriptedBackend {
        pub level: Result<u32, ()>,
        pub submissions: Mutex<VecDeque<Result<SubmissionResult, ()>>>,
        pub log: EventLog,
    }

    impl ScriptedBackend {
        pub fn new(level: u32, log: EventLog) -> Self {
            Self {
                level: Ok(level),
                submissions: Mutex::new(VecDeque::new()),
                log,
            }
        }

        pub fn unreachable_backend(log: EventLog) -> Self {
            Self {
                level: Err(()),
                submissions: Mutex::new(VecDeque::new()),
                log,
            }
        }

        pub fn push_submission(&self, result: Result<SubmissionResult, ()>) {
            self.submissions.lock().unwrap().push_back(result);
        }

        pub fn correct(new_level: u32) -> Result<SubmissionResult, ()> {
            Ok(SubmissionResult {
                correct: true,
                new_level: Some(new_level),
            })
        }

        pub fn incorrect() -> Result<SubmissionResult, ()> {
            Ok(SubmissionResult {
                correct: false,
                new_level: None,
            })
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn get_level(&self, _user_id: &str) -> Result<u32, BackendError> {
            self.level
                .map_err(|()| BackendError::connectivity("scripted outage"))
        }

        async fn submit_flag(
            &self,
            flag: &str,
            _user_id: &str,
        ) -> Result<SubmissionResult, BackendError> {
            self.log.lock().unwrap().push(format!("submit {flag}"));
            self.submissions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(()))
                .map_err(|()| BackendError::connectivity("scripted outage"))
        }
    }

    pub struct MockImageStore {
        pub fail_levels: Vec<u32>,
        pub log: EventLog,
    }

    impl MockImageStore {
        pub fn new(log: EventLog) -> Self {
            Self {
                fail_levels: Vec::new(),
                log,
            }
        }

        pub fn failing(fail_levels: Vec<u32>, log: EventLog) -> Self {
            Self { fail_levels, log }
        }
    }

    #[async_trait]
    impl ImageStore for MockImageStore {
        async fn ensure_available(
            &self,
            level: u32,
            progress: Option<&PullProgress>,
        ) -> Result<(), ImageError> {
            self.log.lock().unwrap().push(format!("ensure {level}"));
            if self.fail_levels.contains(&level) {
                return Err(ImageError::PullExhausted { level, attempts: 3 });
            }
            if let Some(progress) = progress {
                progress.record();
            }
            Ok(())
        }

        fn prefetch(&self, level: u32) {
            self.log.lock().unwrap().push(format!("prefetch {level}"));
        }
    }

    pub struct MockSandbox {
        pub fail_create: bool,
        pub log: EventLog,
    }

    impl MockSandbox {
        pub fn new(log: EventLog) -> Self {
            Self {
                fail_create: false,
                log,
            }
        }
    }

    #[async_trait]
    impl Sandbox for MockSandbox {
        async fn ensure_running(&self, level: u32, _user_id: &str) -> Result<(), SandboxError> {
            let name = Level::new(level).sandbox_name();
            self.log.lock().unwrap().push(format!("run {name}"));
            if self.fail_create {
                return Err(SandboxError::creation_failed(name, "scripted failure"));
            }
            Ok(())
        }

        async fn remove(&self, level: u32) {
            let name = Level::new(level).sandbox_name();
            self.log.lock().unwrap().push(format!("remove {name}"));
        }

        async fn attach(&self, level: u32) -> Result<(), SandboxError> {
            let name = Level::new(level).sandbox_name();
            self.log.lock().unwrap().push(format!("attach {name}"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_submit_takes_rest_of_line() {
        assert_eq!(
            Command::parse("submit FLAG{ok}\n"),
            Command::Submit("FLAG{ok}".to_string())
        );
        assert_eq!(
            Command::parse("  SUBMIT flag with spaces  "),
            Command::Submit("flag with spaces".to_string())
        );
    }

    #[test]
    fn test_parse_bare_submit_is_unknown() {
        assert_eq!(Command::parse("submit"), Command::Unknown);
        assert_eq!(Command::parse("submit "), Command::Unknown);
    }

    #[test]
    fn test_parse_verbs_case_insensitive() {
        assert_eq!(Command::parse("play"), Command::Play);
        assert_eq!(Command::parse("PLAY\n"), Command::Play);
        assert_eq!(Command::parse("Exit"), Command::Exit);
        assert_eq!(Command::parse("quit"), Command::Unknown);
        assert_eq!(Command::parse(""), Command::Unknown);
    }

    #[tokio::test]
    async fn test_correct_submission_advances_and_cleans_up() {
        let log = event_log();
        let backend = ScriptedBackend::new(3, log.clone());
        backend.push_submission(ScriptedBackend::correct(4));
        let images = MockImageStore::new(log.clone());
        let sandbox = MockSandbox::new(log.clone());
        let mut input = Cursor::new(b"submit FLAG{ok}\n".to_vec());

        let result = run_level(3, "LD42", 10, &backend, &images, &sandbox, &mut input)
            .await
            .unwrap();

        assert_eq!(result, 4);
        // Prefetch of level 5 is kicked off before the old sandbox goes away.
        assert_eq!(
            events(&log),
            vec!["submit FLAG{ok}", "prefetch 5", "remove ctf3"]
        );
    }

    #[tokio::test]
    async fn test_incorrect_submission_stays_on_level() {
        let log = event_log();
        let backend = ScriptedBackend::new(4, log.clone());
        backend.push_submission(ScriptedBackend::incorrect());
        let images = MockImageStore::new(log.clone());
        let sandbox = MockSandbox::new(log.clone());
        let mut input = Cursor::new(b"submit FLAG{bad}\nexit\n".to_vec());

        let result = run_level(4, "LD42", 10, &backend, &images, &sandbox, &mut input)
            .await
            .unwrap();

        assert_eq!(result, 4);
        // No prefetch, no removal; the sandbox stays untouched.
        assert_eq!(events(&log), vec!["submit FLAG{bad}"]);
    }

    #[tokio::test]
    async fn test_connectivity_error_treated_as_incorrect() {
        let log = event_log();
        let backend = ScriptedBackend::new(4, log.clone());
        backend.push_submission(Err(()));
        let images = MockImageStore::new(log.clone());
        let sandbox = MockSandbox::new(log.clone());
        let mut input = Cursor::new(b"submit FLAG{ok}\nexit\n".to_vec());

        let result = run_level(4, "LD42", 10, &backend, &images, &sandbox, &mut input)
            .await
            .unwrap();

        assert_eq!(result, 4);
        assert_eq!(events(&log), vec!["submit FLAG{ok}"]);
    }

    #[tokio::test]
    async fn test_no_prefetch_past_last_level() {
        let log = event_log();
        let backend = ScriptedBackend::new(9, log.clone());
        backend.push_submission(ScriptedBackend::correct(10));
        let images = MockImageStore::new(log.clone());
        let sandbox = MockSandbox::new(log.clone());
        let mut input = Cursor::new(b"submit FLAG{ok}\n".to_vec());

        let result = run_level(9, "LD42", 10, &backend, &images, &sandbox, &mut input)
            .await
            .unwrap();

        assert_eq!(result, 10);
        // new_level + 1 == 11 > total, so nothing is prefetched.
        assert_eq!(events(&log), vec!["submit FLAG{ok}", "remove ctf9"]);
    }

    #[tokio::test]
    async fn test_top_of_range_level_number_skips_prefetch() {
        let log = event_log();
        let backend = ScriptedBackend::new(5, log.clone());
        backend.push_submission(ScriptedBackend::correct(u32::MAX));
        let images = MockImageStore::new(log.clone());
        let sandbox = MockSandbox::new(log.clone());
        let mut input = Cursor::new(b"submit FLAG{ok}\n".to_vec());

        let result = run_level(5, "LD42", u32::MAX, &backend, &images, &sandbox, &mut input)
            .await
            .unwrap();

        // The level after next does not exist; no prefetch, no panic.
        assert_eq!(result, u32::MAX);
        assert_eq!(events(&log), vec!["submit FLAG{ok}", "remove ctf5"]);
    }

    #[tokio::test]
    async fn test_play_attaches_and_loops() {
        let log = event_log();
        let backend = ScriptedBackend::new(2, log.clone());
        let images = MockImageStore::new(log.clone());
        let sandbox = MockSandbox::new(log.clone());
        let mut input = Cursor::new(b"play\nexit\n".to_vec());

        let result = run_level(2, "LD42", 10, &backend, &images, &sandbox, &mut input)
            .await
            .unwrap();

        assert_eq!(result, 2);
        assert_eq!(events(&log), vec!["attach ctf2"]);
    }

    #[tokio::test]
    async fn test_unknown_command_then_eof() {
        let log = event_log();
        let backend = ScriptedBackend::new(2, log.clone());
        let images = MockImageStore::new(log.clone());
        let sandbox = MockSandbox::new(log.clone());
        let mut input = Cursor::new(b"frobnicate\n".to_vec());

        let result = run_level(2, "LD42", 10, &backend, &images, &sandbox, &mut input)
            .await
            .unwrap();

        // Unknown input leaves state unchanged; EOF exits with the same level.
        assert_eq!(result, 2);
        assert!(events(&log).is_empty());
    }
}
