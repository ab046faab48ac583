//! Git plumbing behind the clone activities.
//!
//! Everything that touches the network goes through [`process::CommandRunner`],
//! so resolution and fetch can be exercised against scripted output.

pub mod fetch;
pub mod process;
pub mod redact;
pub mod resolve;
pub mod workdir;

pub use fetch::SnapshotFetcher;
pub use process::{CommandRunner, CommandSpec, ProcessOutput, ScriptedRunner, SystemRunner};
pub use redact::mask_secrets;
pub use resolve::{RefResolution, RefResolver, Tier};
pub use workdir::WorkdirAllocator;

use std::time::Duration;

/// Default wall-clock limit for a single git invocation.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Build a hardened `git` invocation.
///
/// - `GIT_TERMINAL_PROMPT=0` so a credential prompt fails instead of hanging
/// - `GIT_LFS_SKIP_SMUDGE=1` so LFS objects are not downloaded on checkout
pub fn git<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("git", args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_LFS_SKIP_SMUDGE", "1")
}
