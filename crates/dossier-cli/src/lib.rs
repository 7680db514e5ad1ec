//! # dossier-cli: Command-Line Driver for the Dossier Service
//!
//! Provides the `dossier` command-line interface.
//!
//! ## Subcommands
//!
//! - `dossier run`: create, upload and submit a dossier described by a YAML
//!   manifest. Progress is saved to a JSON state file after every phase, so
//!   a run interrupted by a network failure or an expired token is resumed
//!   by running the same command again.
//! - `dossier status`: status of the caller's dossier.
//! - `dossier checklist`: documents required for a product type.
//!
//! ```bash
//! export DOSSIER_API_URL=https://dossier.example.org
//! export DOSSIER_API_TOKEN=exporter:<uuid>:<secret>
//! dossier run --manifest dossier.yaml
//! dossier checklist --product-type food --brand
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Submitted, or command succeeded |
//! | 1 | Error |
//! | 2 | Not submitted: uploads failed or the dossier is incomplete |
//! | 3 | Session expired: renew the token and run again |

pub mod checklist;
pub mod status;
pub mod submit;

use anyhow::{Context, Result};

/// Exit code for a dossier that could not be submitted yet.
pub const EXIT_NOT_SUBMITTED: u8 = 2;

/// Exit code for a rejected or expired token.
pub const EXIT_SESSION_EXPIRED: u8 = 3;

/// Single-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}
