//! Command engine: shells out to an external translator binary
//! (translate-shell compatible), feeding the text on stdin and reading
//! the translation from stdout.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::TranslateError;

pub struct CommandTranslator {
    program: String,
    source: String,
    target: String,
}

impl CommandTranslator {
    pub fn new(program: &str, source: &str, target: &str) -> Self {
        Self {
            program: program.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    /// Runs `{program} -b {source}:{target}` with the text on stdin.
    /// The binary is resolved per call so installing it does not
    /// require a restart.
    pub async fn translate(&self, text: &str) -> std::result::Result<String, TranslateError> {
        let program = which::which(&self.program).map_err(|_| {
            TranslateError::Command(format!(
                "translator command '{}' not found in PATH",
                self.program
            ))
        })?;

        let mut child = Command::new(program)
            .arg("-b")
            .arg(format!("{}:{}", self.source, self.target))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TranslateError::Command(format!("failed to start '{}': {e}", self.program))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                // A child that exits without draining stdin reports its
                // own failure through the exit status below.
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(TranslateError::Command(format!(
                        "failed to send text to '{}': {e}",
                        self.program
                    )));
                }
            }
        }

        let output = child.wait_with_output().await.map_err(|e| {
            TranslateError::Command(format!("'{}' did not finish: {e}", self.program))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranslateError::Command(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}
