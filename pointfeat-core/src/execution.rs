//! Execution context selectors: where the computation runs and in which precision

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Numeric precision of intermediate and output values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dtype {
    #[default]
    Float32,
    Float64,
}

impl Dtype {
    /// Size in bytes of one scalar
    pub fn byte_size(&self) -> usize {
        match self {
            Dtype::Float32 => 4,
            Dtype::Float64 => 8,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Float32 => write!(f, "Float32"),
            Dtype::Float64 => write!(f, "Float64"),
        }
    }
}

impl FromStr for Dtype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float32" | "f32" => Ok(Dtype::Float32),
            "float64" | "f64" => Ok(Dtype::Float64),
            other => Err(Error::InvalidData(format!("unknown dtype '{}'", other))),
        }
    }
}

impl TryFrom<String> for Dtype {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Dtype> for String {
    fn from(value: Dtype) -> Self {
        value.to_string()
    }
}

/// Execution backend selector
///
/// String forms: `sequential`, `parallel`, `parallel:N`, `gpu`, `gpu:N`.
/// `cpu` and `cpu:N` select the parallel backend on the global pool (`N` is a
/// device ordinal, not a thread count) and `cuda:N` is an alias of `gpu:N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    /// Single-threaded reference backend
    Sequential,
    /// Multi-threaded CPU backend; `None` uses the global thread pool
    Parallel { threads: Option<usize> },
    /// GPU compute backend on the adapter with the given ordinal
    Accelerated { ordinal: usize },
}

impl Default for Device {
    fn default() -> Self {
        Device::Parallel { threads: None }
    }
}

impl Device {
    pub fn is_cpu(&self) -> bool {
        !matches!(self, Device::Accelerated { .. })
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Sequential => write!(f, "sequential"),
            Device::Parallel { threads: None } => write!(f, "parallel"),
            Device::Parallel { threads: Some(n) } => write!(f, "parallel:{}", n),
            Device::Accelerated { ordinal } => write!(f, "gpu:{}", ordinal),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let (kind, arg) = match lowered.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (lowered.as_str(), None),
        };

        let parse_number = |arg: &str| -> Result<usize> {
            arg.parse::<usize>()
                .map_err(|_| Error::InvalidData(format!("invalid device number in '{}'", s)))
        };

        match (kind, arg) {
            ("sequential", None) => Ok(Device::Sequential),
            ("parallel" | "cpu", None) => Ok(Device::Parallel { threads: None }),
            ("cpu", Some(arg)) => {
                parse_number(arg)?;
                Ok(Device::Parallel { threads: None })
            }
            ("parallel", Some(arg)) => {
                let threads = parse_number(arg)?;
                if threads == 0 {
                    return Err(Error::InvalidData("thread count must be positive".to_string()));
                }
                Ok(Device::Parallel { threads: Some(threads) })
            }
            ("gpu" | "cuda", None) => Ok(Device::Accelerated { ordinal: 0 }),
            ("gpu" | "cuda", Some(arg)) => Ok(Device::Accelerated { ordinal: parse_number(arg)? }),
            _ => Err(Error::InvalidData(format!("unknown device '{}'", s))),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(value: Device) -> Self {
        value.to_string()
    }
}

/// Device and precision a single computation runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub dtype: Dtype,
}

impl ExecutionContext {
    pub fn new(device: Device, dtype: Dtype) -> Self {
        Self { device, dtype }
    }

    /// Set the device
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Set the precision
    pub fn with_dtype(mut self, dtype: Dtype) -> Self {
        self.dtype = dtype;
        self
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.dtype)
    }
}
