//! Cursor command - inspect or change the committed cursor
//!
//! `reset` and `set` take the pipeline lock, so they fail while a run is
//! active. `unlock` removes a lock left by a crashed run.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ferry_config::Config;
use ferry_pipeline::{FileProgressStore, ProgressStore, RunLock};
use ferry_protocol::Cursor;
use tracing::info;

use super::load_config;

/// Cursor command arguments
#[derive(Args, Debug)]
pub struct CursorArgs {
    #[command(subcommand)]
    pub action: CursorAction,
}

#[derive(Subcommand, Debug)]
pub enum CursorAction {
    /// Print the committed cursor
    Show {
        /// Print the raw token instead of the readable form
        #[arg(long)]
        token: bool,
    },

    /// Forget the committed cursor; the next run starts from the beginning
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Replace the committed cursor with a token printed by `show --token`
    Set {
        /// Cursor token
        token: String,
    },

    /// Remove a lock left behind by a crashed run
    Unlock,
}

pub fn run(config_path: &Path, args: CursorArgs) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let name = config.pipeline.name.as_str();
    let store = FileProgressStore::new(&config.progress.dir);

    match args.action {
        CursorAction::Show { token } => {
            match store.load(name).context("failed to load cursor")? {
                Some(cursor) if token => println!("{}", cursor.to_token()),
                Some(cursor) => println!("{}", cursor),
                None => println!("no committed cursor (next run starts from the beginning)"),
            }
        }
        CursorAction::Reset { yes } => {
            if !yes {
                anyhow::bail!("refusing to reset the cursor of '{}' without --yes", name);
            }
            let _lock = lock(&config)?;
            store.clear(name).context("failed to clear cursor")?;
            info!(pipeline = name, "cursor reset");
            println!("cursor reset");
        }
        CursorAction::Set { token } => {
            let cursor = Cursor::from_token(&token).context("invalid cursor token")?;
            let _lock = lock(&config)?;
            store.save(name, &cursor).context("failed to save cursor")?;
            info!(pipeline = name, cursor = %cursor, "cursor set");
            println!("cursor set to {}", cursor);
        }
        CursorAction::Unlock => {
            if RunLock::break_stale(&config.progress.dir, name)? {
                println!("lock removed");
            } else {
                println!("no lock present");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn lock(config: &Config) -> Result<RunLock> {
    RunLock::acquire(&config.progress.dir, &config.pipeline.name)
        .context("pipeline is running; stop it before changing its cursor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("ferry.toml");
        let state = dir.path().join("state");
        std::fs::write(
            &path,
            format!(
                r#"
[pipeline]
name = "cli_test"

[source]
type = "files"
url = "{}"

[sink]
measurement_id = "G-TEST"
dry_run = true

[progress]
dir = "{}"
"#,
                dir.path().display(),
                state.display()
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_set_show_reset() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir);
        let token = Cursor::Offset { rows: 42 }.to_token();

        run(&path, CursorArgs { action: CursorAction::Set { token } }).unwrap();
        let store = FileProgressStore::new(dir.path().join("state"));
        assert_eq!(
            store.load("cli_test").unwrap(),
            Some(Cursor::Offset { rows: 42 })
        );

        assert!(run(&path, CursorArgs { action: CursorAction::Reset { yes: false } }).is_err());
        run(&path, CursorArgs { action: CursorAction::Reset { yes: true } }).unwrap();
        assert!(store.load("cli_test").unwrap().is_none());
    }

    #[test]
    fn test_set_refused_while_locked() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir);
        let _held = RunLock::acquire(&dir.path().join("state"), "cli_test").unwrap();

        let token = Cursor::Start.to_token();
        assert!(run(&path, CursorArgs { action: CursorAction::Set { token } }).is_err());

        run(&path, CursorArgs { action: CursorAction::Unlock }).unwrap();
    }
}
