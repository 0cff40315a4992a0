//! 调用外部放大工具（waifu2x-ncnn-vulkan 兼容的命令行）。

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::base_system::context::Config;

use super::models::PipelineError;
use super::source::Normalizer;

#[derive(Debug, Clone)]
pub struct ExternalNormalizer {
    program: PathBuf,
    noise_reduction: u8,
    scale_factor: u8,
}

impl ExternalNormalizer {
    pub fn new(program: impl Into<PathBuf>, noise_reduction: u8, scale_factor: u8) -> Self {
        Self {
            program: program.into(),
            noise_reduction,
            scale_factor,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            expand_home(&config.normalizer_path),
            config.noise_reduction,
            config.scale_factor,
        )
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-n")
            .arg(self.noise_reduction.to_string())
            .arg("-s")
            .arg(self.scale_factor.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Normalizer for ExternalNormalizer {
    /// 阻塞直到子进程退出。
    fn normalize(&self, input: &Path, output: &Path) -> Result<(), PipelineError> {
        let failure = |reason: String| PipelineError::Normalization {
            input: input.to_path_buf(),
            reason,
        };

        debug!(
            target: "engine",
            program = %self.program.display(),
            input = %input.display(),
            output = %output.display(),
            "run normalizer"
        );

        let out = self
            .command(input, output)
            .output()
            .map_err(|e| failure(format!("spawn {}: {e}", self.program.display())))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let tail: String = stderr.trim().lines().last().unwrap_or_default().to_string();
            return Err(failure(format!("exit {}: {tail}", out.status)));
        }
        Ok(())
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(raw)
}
