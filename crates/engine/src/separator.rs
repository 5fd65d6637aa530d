//! Wrapper around the external stem-separation tool.
//!
//! The tool is driven as a child process. Progress is scraped from its
//! stderr line by line; output stems are collected from the directory
//! layout the tool writes: `<out>/<model>/<track>/<stem>.wav`.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::device::Device;
use crate::progress;

/// Number of trailing stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum SeparatorError {
    #[error("Input file does not exist: {0}")]
    InputMissing(PathBuf),

    #[error("Failed to start separation tool: {0}")]
    Spawn(io::Error),

    #[error("Separation tool exited with status {code:?}:\n{stderr_tail}")]
    NonZeroExit {
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Separation produced no output in {0}")]
    MissingOutput(PathBuf),

    #[error("I/O error during separation: {0}")]
    Io(#[from] io::Error),
}

/// How the external tool is invoked.
#[derive(Debug, Clone)]
pub struct SeparatorConfig {
    /// Tool binary name or path.
    pub binary: String,
    /// Model name, also the first directory level of the tool's output.
    pub model: String,
    pub device: Device,
    /// Segment length in seconds, bounds peak memory.
    pub segment: u32,
    /// Number of prediction shifts, trades quality for time.
    pub shifts: u32,
}

/// Runs separations one input at a time. Callers are expected to hold the
/// device gate for the duration of [`Separator::run`].
#[derive(Debug, Clone)]
pub struct Separator {
    config: SeparatorConfig,
}

impl Separator {
    pub fn new(config: SeparatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeparatorConfig {
        &self.config
    }

    /// Build the tool invocation. Two-stem jobs use the tool's dedicated
    /// vocals/accompaniment mode; anything else gets the full model split.
    fn command(&self, input_path: &Path, output_dir: &Path, stems: i32) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("--out")
            .arg(output_dir)
            .arg("-n")
            .arg(&self.config.model)
            .arg("--device")
            .arg(self.config.device.as_str())
            .arg("--segment")
            .arg(self.config.segment.to_string())
            .arg("--shifts")
            .arg(self.config.shifts.to_string());
        if stems == 2 {
            cmd.arg("--two-stems").arg("vocals");
        }
        cmd.arg(input_path);
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Separate one input file, streaming parsed progress values into
    /// `progress_tx` as the tool reports them. On success, returns the
    /// map of stem name to output file path.
    pub async fn run(
        &self,
        input_path: &Path,
        output_dir: &Path,
        stems: i32,
        progress_tx: mpsc::Sender<i16>,
    ) -> Result<BTreeMap<String, String>, SeparatorError> {
        if !input_path.exists() {
            return Err(SeparatorError::InputMissing(input_path.to_path_buf()));
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let mut child = self
            .command(input_path, output_dir, stems)
            .spawn()
            .map_err(SeparatorError::Spawn)?;

        // stderr is taken before waiting; the pipe must be drained or the
        // tool can block on a full buffer.
        let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(value) = progress::parse_line(&line) {
                    // The runner may have stopped listening; progress is
                    // advisory, so a closed channel is not an error.
                    let _ = progress_tx.send(value).await;
                }
                if stderr_tail.len() == STDERR_TAIL_LINES {
                    stderr_tail.pop_front();
                }
                stderr_tail.push_back(line);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(SeparatorError::NonZeroExit {
                code: status.code(),
                stderr_tail: stderr_tail.into_iter().collect::<Vec<_>>().join("\n"),
            });
        }

        self.collect_stems(input_path, output_dir).await
    }

    /// Gather the `.wav` files the tool wrote for this track.
    async fn collect_stems(
        &self,
        input_path: &Path,
        output_dir: &Path,
    ) -> Result<BTreeMap<String, String>, SeparatorError> {
        let track = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SeparatorError::InputMissing(input_path.to_path_buf()))?;
        let stem_dir = output_dir.join(&self.config.model).join(track);

        let mut entries = match tokio::fs::read_dir(&stem_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SeparatorError::MissingOutput(stem_dir));
            }
            Err(e) => return Err(e.into()),
        };

        let mut stems = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                stems.insert(name.to_string(), path.to_string_lossy().into_owned());
            }
        }

        if stems.is_empty() {
            return Err(SeparatorError::MissingOutput(stem_dir));
        }
        Ok(stems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_separator(device: Device) -> Separator {
        Separator::new(SeparatorConfig {
            binary: "demucs".to_string(),
            model: "htdemucs".to_string(),
            device,
            segment: 10,
            shifts: 1,
        })
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn two_stem_jobs_use_two_stems_mode() {
        let sep = test_separator(Device::Cuda);
        let cmd = sep.command(Path::new("/in/track.mp3"), Path::new("/out"), 2);
        let args = args_of(&cmd);

        assert_eq!(
            args,
            vec![
                "--out", "/out", "-n", "htdemucs", "--device", "cuda", "--segment", "10",
                "--shifts", "1", "--two-stems", "vocals", "/in/track.mp3",
            ]
        );
    }

    #[test]
    fn multi_stem_jobs_omit_two_stems_mode() {
        let sep = test_separator(Device::Cpu);
        let cmd = sep.command(Path::new("/in/track.mp3"), Path::new("/out"), 4);
        let args = args_of(&cmd);

        assert!(!args.contains(&"--two-stems".to_string()));
        assert!(args.contains(&"cpu".to_string()));
    }

    #[tokio::test]
    async fn missing_input_fails_before_spawn() {
        let sep = test_separator(Device::Cpu);
        let out = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);

        let result = sep
            .run(
                Path::new("/nonexistent/input.mp3"),
                out.path(),
                2,
                tx,
            )
            .await;
        assert!(matches!(result, Err(SeparatorError::InputMissing(_))));
    }
}
