// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::device::DeviceError;

pub type FrameResult<T> = Result<T, FrameError>;

/// Fatal engine failures. Surface staleness never shows up here.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("surface capability query failed: {0}")]
    DeviceQuery(#[source] DeviceError),

    #[error("swapchain creation failed: {0}")]
    SwapchainCreation(#[source] DeviceError),

    #[error("graphics pipeline creation failed: {0}")]
    PipelineCreation(#[source] DeviceError),

    #[error("command recording failed: {0}")]
    CommandRecording(#[source] DeviceError),

    #[error("frame synchronization setup failed: {0}")]
    SyncCreation(#[source] DeviceError),

    #[error("fence wait failed: {0}")]
    FenceWait(#[source] DeviceError),

    #[error("image acquire failed: {0}")]
    Acquire(#[source] DeviceError),

    #[error("queue submit failed: {0}")]
    Submit(#[source] DeviceError),

    #[error("present failed: {0}")]
    Present(#[source] DeviceError),

    #[error("device drain failed: {0}")]
    Drain(#[source] DeviceError),

    #[error("swapchain rebuild failed: {0}")]
    SwapchainRebuild(#[source] Box<FrameError>),

    /// An earlier frame or rebuild failed; the presenter cannot present until
    /// restarted.
    #[error("presentation unavailable after a fatal error")]
    Unavailable,
}

impl FrameError {
    /// The innermost cause when this error wraps a failed rebuild.
    pub fn root(&self) -> &FrameError {
        match self {
            FrameError::SwapchainRebuild(inner) => inner.root(),
            other => other,
        }
    }
}
