//! Host tool collaborators
//!
//! Every invocation goes through [`run_tool`], which bounds the run with a
//! timeout and drains both pipes so a chatty tool cannot block on a full
//! pipe buffer.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ipadiff_core::{Error, Result};
use tracing::{debug, trace, warn};
use wait_timeout::ChildExt;

use super::{BinaryFormat, FormatDetector, PlistNormalizer};

/// Captured result of a finished tool
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Run `program` with `args`, killing it after `timeout`
pub fn run_tool<I, S>(program: &str, args: I, timeout: Duration) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(tool = program, command = ?command, "Running tool");

    let mut child = command
        .spawn()
        .map_err(|e| Error::tool_failure(program, format!("failed to spawn: {}", e)))?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    match child.wait_timeout(timeout)? {
        Some(status) => {
            let stdout = collect(stdout, program)?;
            let stderr = String::from_utf8_lossy(&collect(stderr, program)?).into_owned();

            if !status.success() {
                warn!(tool = program, status = %status, stderr = %stderr.trim(), "Tool reported failure");
            }

            Ok(ToolOutput { status, stdout, stderr })
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();

            warn!(tool = program, timeout_ms = %timeout.as_millis(), "Tool timed out");
            Err(Error::ToolTimeout {
                tool: program.to_string(),
                seconds: timeout.as_secs(),
            })
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn collect(handle: Option<JoinHandle<io::Result<Vec<u8>>>>, tool: &str) -> Result<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| Error::tool_failure(tool, "output reader panicked"))?
            .map_err(Error::from),
    }
}

fn ensure_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::NotFound(path.to_path_buf()))
    }
}

/// Format detection with `file -b`, encryption with `otool -l`
#[derive(Debug, Clone, Copy)]
pub struct FileCommandDetector {
    timeout: Duration,
}

impl FileCommandDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn is_encrypted(&self, path: &Path) -> Result<bool> {
        let output = run_tool("otool", [OsStr::new("-l"), path.as_os_str()], self.timeout)?;
        if !output.success() {
            return Err(Error::tool_failure("otool", output.stderr.trim()));
        }
        Ok(has_nonzero_cryptid(&output.stdout_text()))
    }
}

impl FormatDetector for FileCommandDetector {
    fn name(&self) -> &str {
        "file"
    }

    fn detect(&self, path: &Path) -> Result<BinaryFormat> {
        ensure_file(path)?;

        let output = run_tool("file", [OsStr::new("-b"), path.as_os_str()], self.timeout)?;
        if !output.success() {
            return Err(Error::ClassificationAmbiguous {
                path: path.to_path_buf(),
                reason: format!("file exited with {}: {}", output.status, output.stderr.trim()),
            });
        }

        if !output.stdout_text().contains("Mach-O") {
            return Ok(BinaryFormat::OTHER);
        }

        Ok(BinaryFormat::native(self.is_encrypted(path)?))
    }
}

/// `cryptid` lines in `otool -l` output, any of them non-zero
fn has_nonzero_cryptid(otool_output: &str) -> bool {
    otool_output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("cryptid"))
        .any(|value| value.trim() != "0")
}

/// Property list normalization with `plutil`
#[derive(Debug, Clone, Copy)]
pub struct PlutilNormalizer {
    timeout: Duration,
}

impl PlutilNormalizer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PlistNormalizer for PlutilNormalizer {
    fn name(&self) -> &str {
        "plutil"
    }

    fn normalize(&self, path: &Path, keys_to_strip: &[String]) -> Result<String> {
        ensure_file(path)?;

        // plutil edits in place; work on a private copy
        let scratch = tempfile::tempdir()?;
        let copy = scratch.path().join("normalized.plist");
        fs::copy(path, &copy)?;

        for key in keys_to_strip {
            let output = run_tool(
                "plutil",
                [OsStr::new("-remove"), OsStr::new(key), copy.as_os_str()],
                self.timeout,
            )?;
            if !output.success() {
                trace!(key = %key, path = %path.display(), "Key not present");
            }
        }

        let output = run_tool(
            "plutil",
            [
                OsStr::new("-convert"),
                OsStr::new("xml1"),
                OsStr::new("-o"),
                OsStr::new("-"),
                copy.as_os_str(),
            ],
            self.timeout,
        )?;

        if !output.success() {
            return Err(Error::tool_failure(
                "plutil",
                format!("{}: {}", path.display(), output.stderr.trim()),
            ));
        }

        Ok(output.stdout_text())
    }
}
