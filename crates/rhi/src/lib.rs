//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin ownership wrappers over `ash`: instance and device creation,
//! swapchain, per-frame synchronization, command recording, render passes,
//! framebuffers, attachments, pipelines and mesh buffers. Every wrapper holds
//! an `Arc<Device>` and releases its handle on drop.

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult, VkResultExt};

pub use ash::vk;
