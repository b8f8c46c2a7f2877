//! Launching an external long-read aligner and streaming its SAM output.
//!
//! Two fixed profiles are supported, tuned for long, error-prone reads:
//!
//! ```text
//! bwa mem -t <threads> -k11 -W20 -r10 -A1 -B1 -O1 -E1 -L0 -a -Y -K 20000 <index> <input>
//! minimap2 -t <threads> -ax <preset> -K 20000 <index> <input>
//! ```
//!
//! An input of "-" makes the aligner read this process's own stdin. The aligner's
//! stderr is discarded so its progress messages never mix with the report stream.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::UsabilityRule;
use crate::source::{AlignmentFormat, AlignmentSource, SourceError};
use crate::utils::validation::is_stdin_path;

/// Mini-batch size passed as `-K`, small enough to stream partial results early
pub const BATCH_BASES: u32 = 20_000;

/// Which aligner to run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AlignerProfile {
    /// `bwa mem` with permissive long-read scoring
    #[default]
    Bwa,
    /// `minimap2 -ax <preset>`
    Minimap2,
}

impl AlignerProfile {
    #[must_use]
    pub fn default_executable(self) -> &'static str {
        match self {
            Self::Bwa => "bwa",
            Self::Minimap2 => "minimap2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    pub profile: AlignerProfile,

    /// Executable to run instead of the profile's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    pub threads: usize,

    /// Aligner index of the draft assembly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<PathBuf>,

    /// minimap2 `-x` preset, ignored by bwa
    pub preset: String,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            profile: AlignerProfile::Bwa,
            executable: None,
            threads: 4,
            index: None,
            preset: "map-ont".to_string(),
        }
    }
}

impl AlignerConfig {
    #[must_use]
    pub fn executable(&self) -> &str {
        self.executable
            .as_deref()
            .unwrap_or_else(|| self.profile.default_executable())
    }
}

/// Where the aligner's stdin comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinMode {
    /// Shared with this process, for "-" input
    Inherit,
    /// Closed; the input is passed as a path argument
    Null,
}

/// A fully resolved aligner command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignerInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: StdinMode,
}

impl AlignerInvocation {
    /// Build the command line for aligning `input` against `index`
    #[must_use]
    pub fn new(config: &AlignerConfig, index: &Path, input: &Path) -> Self {
        let threads = config.threads.to_string();
        let mut args: Vec<String> = match config.profile {
            AlignerProfile::Bwa => [
                "mem", "-t", threads.as_str(), "-k11", "-W20", "-r10", "-A1", "-B1", "-O1", "-E1", "-L0",
                "-a", "-Y", "-K",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            AlignerProfile::Minimap2 => ["-t", threads.as_str(), "-ax", config.preset.as_str(), "-K"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        };
        args.push(BATCH_BASES.to_string());
        args.push(index.display().to_string());

        let stdin = if is_stdin_path(input) {
            args.push("-".to_string());
            StdinMode::Inherit
        } else {
            args.push(input.display().to_string());
            StdinMode::Null
        };

        Self {
            program: config.executable().to_string(),
            args,
            stdin,
        }
    }

    /// Convert into a command with stdout piped and stderr discarded
    #[must_use]
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(match self.stdin {
                StdinMode::Inherit => Stdio::inherit(),
                StdinMode::Null => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        command
    }
}

/// A running aligner whose output is being streamed
#[derive(Debug)]
pub struct AlignerProcess {
    child: Child,
    program: String,
}

impl AlignerProcess {
    /// Reap the aligner.
    ///
    /// Call only once its output has been drained and the source closed, otherwise a
    /// child blocked on a full pipe never exits. A failing exit status is logged and
    /// returned; by this point every record it wrote has already been consumed.
    pub fn wait(mut self) -> Option<ExitStatus> {
        match self.child.wait() {
            Ok(status) if status.success() => {
                info!(program = %self.program, "Aligner finished");
                Some(status)
            }
            Ok(status) => {
                warn!(
                    program = %self.program,
                    %status,
                    "Aligner exited with failure; results may be incomplete"
                );
                Some(status)
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "Failed to wait for aligner");
                None
            }
        }
    }
}

/// Start the configured aligner on `input` and stream its SAM output.
///
/// # Errors
///
/// Returns `SourceError::MissingIndex` if no index is configured,
/// `SourceError::Spawn` if the aligner cannot be started, or
/// `SourceError::Header` if its output does not start with a valid SAM header.
pub fn launch(
    config: &AlignerConfig,
    input: &Path,
    rule: Arc<dyn UsabilityRule>,
) -> Result<(AlignmentSource, AlignerProcess), SourceError> {
    let index = config.index.as_deref().ok_or(SourceError::MissingIndex)?;
    let invocation = AlignerInvocation::new(config, index, input);

    info!(
        program = %invocation.program,
        args = %invocation.args.join(" "),
        "Starting aligner"
    );

    let mut child = invocation
        .command()
        .spawn()
        .map_err(|source| SourceError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

    let stdout: ChildStdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            abort(&mut child);
            return Err(SourceError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "aligner stdout was not captured",
            )));
        }
    };

    match AlignmentSource::from_reader(stdout, AlignmentFormat::Sam, rule) {
        Ok(source) => {
            info!(pid = child.id(), "Aligner started");
            Ok((
                source.with_description(invocation.program.clone()),
                AlignerProcess {
                    child,
                    program: invocation.program,
                },
            ))
        }
        Err(e) => {
            abort(&mut child);
            Err(e)
        }
    }
}

fn abort(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "Failed to kill aligner");
    }
    let _ = child.wait();
}
