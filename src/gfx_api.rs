use {
    crate::{
        allocator::{Allocator, BufferObject},
        format::Format,
        video::{DeviceId, Modifier},
    },
    std::{error::Error, ops::Deref, sync::Arc},
    thiserror::Error,
    uapi::OwnedFd,
};

#[derive(Debug, Error)]
#[error(transparent)]
pub struct GfxError(#[from] pub Box<dyn Error + Send + Sync>);

/// A fence in the form of a sync file.
#[derive(Clone, Debug)]
pub struct SyncFile(pub Arc<OwnedFd>);

impl Deref for SyncFile {
    type Target = Arc<OwnedFd>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DriverModifier {
    pub modifier: Modifier,
    pub external_only: bool,
}

#[derive(Clone, Debug)]
pub struct DriverFormat {
    pub fourcc: u32,
    pub modifiers: Vec<DriverModifier>,
}

/// Invoked by the driver before it renders to a surface, possibly on a thread
/// the library does not control.
pub trait SurfaceUpdateHandler: Send + Sync {
    fn update(&self);
}

/// The GPU driver that renders into the color buffers.
pub trait GfxDriver: Send + Sync {
    /// The device ids of the nodes of the device the driver renders on.
    fn device_ids(&self) -> &[DeviceId];

    /// A DRM fd of the render device. Required for explicit sync.
    fn drm_fd(&self) -> Option<Arc<OwnedFd>>;

    fn formats(&self) -> Result<Vec<DriverFormat>, GfxError>;

    fn allocator(&self) -> Arc<dyn Allocator>;

    /// Whether the driver can export the completion of submitted work as a
    /// sync file.
    fn supports_native_fences(&self) -> bool;

    /// Creates a fence that signals when all work submitted so far has
    /// completed and flushes the work to the GPU.
    fn create_native_fence(&self) -> Result<SyncFile, GfxError>;

    /// Blocks until all submitted work has completed.
    fn finish(&self) -> Result<(), GfxError>;

    /// Makes subsequently submitted GPU work wait for the sync file.
    fn wait_sync_file(&self, sync_file: &SyncFile) -> Result<(), GfxError>;

    fn create_surface(
        &self,
        format: &'static Format,
        render_buffer: &Arc<dyn BufferObject>,
        handler: Arc<dyn SurfaceUpdateHandler>,
    ) -> Result<Arc<dyn DriverSurface>, GfxError>;
}

/// The driver's view of a window surface.
pub trait DriverSurface: Send + Sync {
    /// Makes `buffer` the back buffer that the driver renders into.
    fn set_color_buffer(&self, buffer: &Arc<dyn BufferObject>) -> Result<(), GfxError>;

    /// After this returns the driver no longer invokes the update handler.
    fn destroy(&self);
}
