// SPDX-License-Identifier: CEPL-1.0
//! Opaque GPU object handles.
//!
//! Every handle is a 64-bit value owned by the backend; zero is the null
//! handle. Backends convert their native handles through `from_raw` /
//! `as_raw`.

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub const NULL: Self = Self(0);

            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> u64 {
                self.0
            }

            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    )*};
}

define_handle!(
    /// A presentation chain.
    SwapchainHandle,
    /// A presentable image. Owned by the presentation engine, never destroyed here.
    ImageHandle,
    ImageViewHandle,
    RenderPassHandle,
    FramebufferHandle,
    CommandBufferHandle,
    /// GPU-side ordering primitive, invisible to the CPU.
    SemaphoreHandle,
    /// CPU-observable completion flag signalled by the GPU.
    FenceHandle,
    PipelineHandle,
    PipelineLayoutHandle,
);
