//! External conversion engine invocation
//!
//! The engine (LibreOffice-compatible CLI) runs as a subprocess so a crash
//! kills the conversion, not the server. The argument set is fixed; only
//! the binary path and the wall-clock timeout come from configuration. The
//! engine can hang on malformed input, so the child is awaited under a
//! timeout and killed on expiry.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::ConverterConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("failed to spawn conversion engine: {0}")]
    Spawn(std::io::Error),

    #[error("conversion engine exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),

    #[error("conversion engine reported success but produced no output file")]
    MissingOutput,

    #[error("conversion engine produced an empty output file")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to the external conversion engine.
#[derive(Clone)]
pub struct Converter {
    binary: PathBuf,
    timeout: Duration,
}

impl Converter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout,
        }
    }

    /// Best-effort probe so a missing or broken binary shows up in the log
    /// at startup instead of on the first upload.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Convert `source` to PDF inside `outdir`, returning the path of the
    /// produced file (`<outdir>/<source stem>.pdf`).
    pub async fn convert_to_pdf(
        &self,
        source: &Path,
        outdir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        let child = Command::new(&self.binary)
            .arg("--headless")
            .arg("--invisible")
            .arg("--nodefault")
            .arg("--view")
            .arg("--nolockcheck")
            .arg("--nologo")
            .arg("--norestore")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(outdir)
            .arg(source)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must take the engine down with it.
            .kill_on_drop(true)
            .spawn()
            .map_err(ConvertError::Spawn)?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::error!(
                    source = %source.display(),
                    timeout = ?self.timeout,
                    "conversion engine timed out, killing subprocess"
                );
                ConvertError::Timeout(self.timeout)
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                source = %source.display(),
                status = %output.status,
                stderr = %stderr,
                "conversion engine failed"
            );
            return Err(ConvertError::EngineFailed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let produced = expected_output(source, outdir);

        // The engine has been observed to exit zero without writing a file;
        // check before anything downstream tries to read it.
        let metadata = tokio::fs::metadata(&produced)
            .await
            .map_err(|_| ConvertError::MissingOutput)?;
        if metadata.len() == 0 {
            return Err(ConvertError::EmptyOutput);
        }

        tracing::debug!(
            source = %source.display(),
            output = %produced.display(),
            size = metadata.len(),
            "conversion complete"
        );

        Ok(produced)
    }
}

/// The engine derives the output name from the source basename.
fn expected_output(source: &Path, outdir: &Path) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default();
    let mut name = stem.to_os_string();
    name.push(".pdf");
    outdir.join(name)
}
