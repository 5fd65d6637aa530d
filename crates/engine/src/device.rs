//! Compute device selection for the separation tool.

use std::fmt;

/// Device passed to the separator via `--device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Mps,
    Cpu,
}

impl Device {
    /// The flag value the separation tool expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Mps => "mps",
            Device::Cpu => "cpu",
        }
    }

    pub fn is_gpu(self) -> bool {
        self != Device::Cpu
    }

    /// Probe the host for an accelerator, falling back to CPU.
    ///
    /// CUDA is detected by a successful `nvidia-smi -L` run; Apple
    /// silicon gets MPS. Probing happens once at startup.
    pub async fn detect() -> Device {
        if nvidia_gpu_present().await {
            return Device::Cuda;
        }
        if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            return Device::Mps;
        }
        Device::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

async fn nvidia_gpu_present() -> bool {
    match tokio::process::Command::new("nvidia-smi")
        .arg("-L")
        .output()
        .await
    {
        Ok(output) => output.status.success() && !output.stdout.is_empty(),
        Err(_) => false,
    }
}
