// Library root
// -----------
// This crate exposes a small library surface for the menu. The binary
// (`main.rs`) parses flags, sets up logging and hands the pieces below to
// the interactive loop.
//
// Module responsibilities:
// - `auth`: Authentication menu and the tool flags for each method.
// - `batch`: Manifest loading and sequential batch downloads.
// - `cli`: Command-line flags and logging setup.
// - `config`: Settings file (tool path, directories, archive ledger).
// - `error`: Typed errors for sessions, credentials, manifests and settings.
// - `progress`: Percentage scraping and the terminal progress bar.
// - `prompt`: Interactive input behind a trait, backed by `dialoguer`.
// - `session`: Spawning the external tool and draining its output.
// - `ui`: The main menu state machine.
pub mod auth;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod progress;
pub mod prompt;
pub mod session;
pub mod ui;
