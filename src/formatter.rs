// src/formatter.rs
//! Source pretty-printing through an external formatter.
//!
//! The formatter reads source on stdin and writes the formatted result to
//! stdout (`black -q -` by default). Exit code 123 is black's "cannot parse
//! input", which is reported as [`FormatError::InvalidInput`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Exit status black uses when the input is not valid source.
const INVALID_INPUT_EXIT_CODE: i32 = 123;

/// Max formatted output kept (2 MB).
const MAX_OUTPUT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("input is not valid source: {details}")]
    InvalidInput { details: String },

    #[error("formatter exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("formatter timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SourceFormatter {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for SourceFormatter {
    fn default() -> Self {
        Self {
            program: "black".to_string(),
            args: vec!["-q".to_string(), "-".to_string()],
            timeout: Duration::from_secs(30),
        }
    }
}

impl SourceFormatter {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, timeout }
    }

    /// Format `raw` and return the formatted text.
    pub async fn format_str(&self, raw: &str) -> Result<String, FormatError> {
        let output = tokio::time::timeout(self.timeout, self.run(raw))
            .await
            .map_err(|_| FormatError::Timeout(self.timeout))??;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => {}
            Some(INVALID_INPUT_EXIT_CODE) => return Err(FormatError::InvalidInput { details: stderr }),
            Some(_) if stderr.contains("Cannot parse") => {
                return Err(FormatError::InvalidInput { details: stderr });
            }
            code => return Err(FormatError::Failed { code: code.unwrap_or(-1), stderr }),
        }

        if output.stdout.len() > MAX_OUTPUT_BYTES {
            return Err(FormatError::Failed {
                code: 0,
                stderr: format!("output exceeds {} bytes", MAX_OUTPUT_BYTES),
            });
        }
        String::from_utf8(output.stdout).map_err(|e| FormatError::Failed {
            code: 0,
            stderr: format!("formatter produced non-UTF-8 output: {}", e),
        })
    }

    async fn run(&self, raw: &str) -> Result<std::process::Output, FormatError> {
        let io_err = |source| FormatError::Io { path: self.program.clone(), source };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(io_err)?;

        // Feed stdin while draining stdout so neither pipe fills up.
        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                // A formatter that rejects input early may close stdin first.
                match stdin.write_all(raw.as_bytes()).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };

        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output.map_err(io_err)?;
        written.map_err(io_err)?;
        Ok(output)
    }

    /// Format `raw` and write it to `path`, creating parent directories.
    pub async fn format_to_file(&self, raw: &str, path: &Path) -> Result<PathBuf, FormatError> {
        let formatted = self.format_str(raw).await?;

        let io_err = |source| FormatError::Io { path: path.display().to_string(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, formatted.as_bytes()).await.map_err(io_err)?;

        tracing::info!(path = %path.display(), bytes = formatted.len(), "formatted code saved");
        Ok(path.to_path_buf())
    }

    /// Format and save, logging any failure instead of returning it.
    /// Returns `true` when the file was written.
    pub async fn format_and_save(&self, raw: &str, path: &Path) -> bool {
        match self.format_to_file(raw, path).await {
            Ok(_) => true,
            Err(FormatError::InvalidInput { details }) => {
                tracing::error!(
                    path = %path.display(),
                    "error formatting code: input does not look like valid source: {}",
                    details
                );
                false
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "error while formatting or writing file: {}", e);
                false
            }
        }
    }
}

/// Resolve a caller-supplied file name inside `dir`. Only a bare file name is
/// accepted: no separators, no `..`, no hidden files.
pub fn output_path(dir: &Path, filename: &str) -> Option<PathBuf> {
    let name = filename.trim();
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name.len() <= 255;
    ok.then(|| dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_accepts_bare_names() {
        let dir = Path::new("/tmp/out");
        assert_eq!(output_path(dir, "main.py"), Some(PathBuf::from("/tmp/out/main.py")));
        assert_eq!(output_path(dir, " agent.py "), Some(PathBuf::from("/tmp/out/agent.py")));
    }

    #[test]
    fn test_output_path_rejects_traversal() {
        let dir = Path::new("/tmp/out");
        for bad in ["", "../x.py", "..", "a/b.py", r"a\b.py", ".env", "/etc/passwd"] {
            assert!(output_path(dir, bad).is_none(), "{bad:?} should be rejected");
        }
    }

    #[cfg(unix)]
    fn sh(script: &str) -> SourceFormatter {
        SourceFormatter::new("sh", vec!["-c".into(), script.into()], Duration::from_secs(5))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_identity_formatter_round_trips() {
        let f = sh("cat");
        assert_eq!(f.format_str("x = 1\n").await.unwrap(), "x = 1\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_123_is_invalid_input() {
        let f = sh("cat >/dev/null; echo 'error: cannot format -: Cannot parse: 1:4' >&2; exit 123");
        let err = f.format_str("def (:").await.unwrap_err();
        assert!(matches!(err, FormatError::InvalidInput { ref details } if details.contains("Cannot parse")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_other_exit_is_failed() {
        let f = sh("cat >/dev/null; echo boom >&2; exit 2");
        let err = f.format_str("x").await.unwrap_err();
        assert!(matches!(err, FormatError::Failed { code: 2, ref stderr } if stderr == "boom"));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let f = SourceFormatter::new(
            "definitely-not-a-formatter-binary",
            vec![],
            Duration::from_secs(5),
        );
        assert!(matches!(f.format_str("x").await, Err(FormatError::Io { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let f = SourceFormatter::new("sh", vec!["-c".into(), "sleep 5".into()], Duration::from_millis(100));
        let err = f.format_str("x").await.unwrap_err();
        assert!(matches!(err, FormatError::Timeout(d) if d == Duration::from_millis(100)));
        assert_eq!(err.to_string(), "formatter timed out after 100ms");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_input_streams_through() {
        let raw = "x = 1\n".repeat(100_000);
        let formatted = sh("cat").format_str(&raw).await.unwrap();
        assert_eq!(formatted.len(), raw.len());
        assert_eq!(formatted, raw);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_format_to_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.py");
        let written = sh("tr a-z A-Z").format_to_file("print(1)\n", &path).await.unwrap();
        assert_eq!(written, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "PRINT(1)\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_format_and_save_swallows_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.py");
        let ok = sh("cat >/dev/null; exit 123").format_and_save("def (:", &path).await;
        assert!(!ok);
        assert!(!path.exists());

        assert!(sh("cat").format_and_save("x = 1\n", &path).await);
        assert!(path.exists());
    }
}
