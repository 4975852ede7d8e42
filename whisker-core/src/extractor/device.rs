//! Inference device selection, resolved once when an extractor is built.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Device the model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    /// NVIDIA GPU via CUDA
    Cuda,
    /// Apple Neural Engine / GPU via CoreML
    CoreMl,
}

/// Requested device; `Auto` is resolved against the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
    CoreMl,
}

impl DevicePreference {
    /// Resolve to a concrete device.
    ///
    /// `Auto` picks CUDA when a GPU is visible, CoreML on macOS, and the CPU
    /// otherwise. Accelerator providers fall back to the CPU at session build
    /// time if the runtime lacks them.
    pub fn resolve(self) -> Device {
        match self {
            Self::Cpu => Device::Cpu,
            Self::Cuda => Device::Cuda,
            Self::CoreMl => Device::CoreMl,
            Self::Auto => {
                if cuda_visible() {
                    Device::Cuda
                } else if cfg!(target_os = "macos") {
                    Device::CoreMl
                } else {
                    Device::Cpu
                }
            }
        }
    }
}

fn cuda_visible() -> bool {
    match std::env::var("CUDA_VISIBLE_DEVICES") {
        Ok(devices) => {
            let devices = devices.trim();
            !devices.is_empty() && devices != "-1"
        }
        Err(_) => std::path::Path::new("/dev/nvidia0").exists(),
    }
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "coreml" | "mps" => Ok(Self::CoreMl),
            other => Err(format!("unknown device '{other}'")),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Cuda => write!(f, "CUDA"),
            Self::CoreMl => write!(f, "CoreML"),
        }
    }
}
