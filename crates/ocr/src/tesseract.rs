use crate::TextRecognizer;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::instrument;

const EXECUTABLE: &str = "tesseract";

/// A discovered Tesseract executable.
#[derive(Debug, Clone)]
pub struct Tesseract {
    executable: PathBuf,
}

impl Tesseract {
    /// Find `tesseract` on `PATH`.
    pub fn discover() -> Result<Self> {
        match which::which(EXECUTABLE) {
            Ok(executable) => {
                tracing::debug!(executable = %executable.display(), "Discovered OCR engine");
                Ok(Self { executable })
            },
            Err(_) => {
                tracing::info!("Tesseract executable not found in PATH");
                exn::bail!(ErrorKind::EngineNotFound);
            },
        }
    }

    /// Use an explicitly configured executable: an absolute path, or a name
    /// to look up on `PATH`.
    pub fn at(executable: impl AsRef<Path>) -> Result<Self> {
        let executable = executable.as_ref();
        match which::which(executable) {
            Ok(executable) => Ok(Self { executable }),
            Err(_) => {
                tracing::info!(executable = %executable.display(), "Configured OCR engine is not executable");
                exn::bail!(ErrorKind::EngineNotFound);
            },
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

/// Language codes are letters and underscores, joined by `+` (e.g.
/// `chi_sim+eng`). Anything else could be read as a command-line flag.
fn validate_language(language: &str) -> Result<()> {
    let valid = !language.is_empty()
        && language
            .split('+')
            .all(|code| !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !valid {
        exn::bail!(ErrorKind::InvalidLanguage(language.to_string()));
    }
    Ok(())
}

impl TextRecognizer for Tesseract {
    #[instrument(level = "debug", skip(self, image), fields(size = image.len()))]
    fn recognize(&self, image: &[u8], language: &str) -> Result<String> {
        validate_language(language)?;
        let mut input = tempfile::Builder::new().prefix("docshelf-ocr-").tempfile().or_raise(|| ErrorKind::Io)?;
        input.write_all(image).or_raise(|| ErrorKind::Io)?;
        input.flush().or_raise(|| ErrorKind::Io)?;
        let output = Command::new(&self.executable)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", language])
            .output()
            .or_raise(|| ErrorKind::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(code = ?output.status.code(), %stderr, "OCR engine failed");
            exn::bail!(ErrorKind::EngineFailed { code: output.status.code(), stderr });
        }
        let text = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        tracing::debug!(chars = text.len(), "Recognized text");
        Ok(text)
    }
}
