use anyhow::{bail, Context, Result};
use log::{info, warn};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider as _, TensorRTExecutionProvider,
};
use ort::session::Session;
use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::str::FromStr;

const MAX_INTRA_THREADS: usize = 6;

pub struct OnnxSession {
    pub(crate) session: Session,
    pub(crate) executor: ExecutionProvider,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionProvider {
    /// Picked when a session is built, see [`ExecutionProvider::resolve`].
    Auto,
    CPU,
    CUDA(i32),
    TensorRT(i32),
}

impl ExecutionProvider {
    /// Turns `Auto` into CUDA device 0 when the CUDA provider can be loaded, otherwise CPU.
    pub fn resolve(self) -> Self {
        if self != ExecutionProvider::Auto {
            return self;
        }
        match CUDAExecutionProvider::default().is_available() {
            Ok(true) => ExecutionProvider::CUDA(0),
            Ok(false) => ExecutionProvider::CPU,
            Err(e) => {
                warn!("Cannot query CUDA availability, falling back to CPU: {}", e);
                ExecutionProvider::CPU
            }
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, device) = match s.split_once(':') {
            Some((kind, device)) => {
                let device = device
                    .parse::<i32>()
                    .with_context(|| format!("Invalid device index in '{}'", s))?;
                (kind, Some(device))
            }
            None => (s.as_str(), None),
        };

        match (kind, device) {
            ("auto", None) => Ok(ExecutionProvider::Auto),
            ("cpu", None) => Ok(ExecutionProvider::CPU),
            ("cuda", device) => Ok(ExecutionProvider::CUDA(device.unwrap_or(0))),
            ("tensorrt", device) => Ok(ExecutionProvider::TensorRT(device.unwrap_or(0))),
            _ => bail!("Unknown device '{}', expected auto, cpu, cuda[:N] or tensorrt[:N]", s),
        }
    }
}

impl Display for ExecutionProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionProvider::Auto => write!(f, "auto"),
            ExecutionProvider::CPU => write!(f, "cpu"),
            ExecutionProvider::CUDA(id) => write!(f, "cuda:{}", id),
            ExecutionProvider::TensorRT(id) => write!(f, "tensorrt:{}", id),
        }
    }
}

impl Deref for OnnxSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for OnnxSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl OnnxSession {
    pub fn new(url: impl AsRef<Path>, executor: ExecutionProvider) -> Result<Self> {
        let url = url.as_ref();
        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(MAX_INTRA_THREADS))
            .unwrap_or(1);
        let executor = executor.resolve();

        let session = Session::builder()?
            .with_intra_threads(threads)?
            .with_execution_providers([match executor {
                ExecutionProvider::CUDA(id) => CUDAExecutionProvider::default()
                    .with_device_id(id)
                    .build()
                    .error_on_failure(),
                ExecutionProvider::TensorRT(id) => TensorRTExecutionProvider::default()
                    .with_device_id(id)
                    .build()
                    .error_on_failure(),
                ExecutionProvider::CPU | ExecutionProvider::Auto => CPUExecutionProvider::default()
                    .build()
                    .error_on_failure(),
            }])?
            .commit_from_file(url)
            .with_context(|| format!("Failed to load model {}", url.display()))?;
        info!("Loaded {} on {}", url.display(), executor);

        Ok(OnnxSession { session, executor })
    }

    pub fn executor(&self) -> ExecutionProvider {
        self.executor
    }
}
