use {
    crate::{
        format::Format,
        video::{Modifier, dmabuf::DmaBuf},
    },
    std::{error::Error, sync::Arc},
    thiserror::Error,
};

#[derive(Debug, Error)]
#[error(transparent)]
pub struct AllocatorError(#[from] pub Box<dyn Error + Send + Sync>);

bitflags! {
    BufferUsage: u32;
        BO_USE_SCANOUT = 1 << 0,
        BO_USE_RENDERING = 1 << 2,
        BO_USE_LINEAR = 1 << 4,
}

/// Allocates GPU images that can be shared as dma-bufs.
pub trait Allocator: Send + Sync {
    /// Allocates an image. The allocator picks the best of `modifiers`; an
    /// empty slice lets it pick any layout.
    fn create_bo(
        &self,
        width: i32,
        height: i32,
        format: &'static Format,
        modifiers: &[Modifier],
        usage: BufferUsage,
    ) -> Result<Arc<dyn BufferObject>, AllocatorError>;

    /// Creates a renderable image backed by an existing dma-buf.
    fn import_dmabuf(
        &self,
        dmabuf: &DmaBuf,
        usage: BufferUsage,
    ) -> Result<Arc<dyn BufferObject>, AllocatorError>;

    /// Copies the contents of `src` into `dst`. Both must have the same size.
    fn copy(&self, src: &dyn BufferObject, dst: &dyn BufferObject) -> Result<(), AllocatorError>;
}

/// An allocated image. The memory is released when the last reference is
/// dropped.
pub trait BufferObject: Send + Sync {
    fn dmabuf(&self) -> &DmaBuf;
}
