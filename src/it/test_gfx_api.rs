use {
    crate::{
        allocator::{Allocator, AllocatorError, BufferObject, BufferUsage},
        format::Format,
        gfx_api::{
            DriverFormat, DriverModifier, DriverSurface, GfxDriver, GfxError, SurfaceUpdateHandler,
            SyncFile,
        },
        it::test_sync_obj::dummy_fd,
        video::{
            DeviceId, LINEAR_MODIFIER, Modifier,
            dmabuf::{DmaBuf, DmaBufPlane, PlaneVec},
        },
    },
    parking_lot::Mutex,
    std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering::Relaxed},
    },
    thiserror::Error,
    uapi::OwnedFd,
};

#[derive(Debug, Error)]
#[error("{0}")]
struct TestGfxError(&'static str);

fn gfx_error(msg: &'static str) -> GfxError {
    GfxError(Box::new(TestGfxError(msg)))
}

pub struct TestBo {
    dmabuf: DmaBuf,
    pub usage: BufferUsage,
    live: Arc<AtomicUsize>,
}

impl BufferObject for TestBo {
    fn dmabuf(&self) -> &DmaBuf {
        &self.dmabuf
    }
}

impl Drop for TestBo {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Relaxed);
    }
}

/// Allocates images backed by memfds.
#[derive(Default)]
pub struct TestAllocator {
    live: Arc<AtomicUsize>,
    pub allocated: AtomicUsize,
    pub imported: AtomicUsize,
    pub copies: AtomicUsize,
    pub fail: AtomicBool,
}

impl TestAllocator {
    /// The number of buffer objects that have not been dropped.
    pub fn live(&self) -> usize {
        self.live.load(Relaxed)
    }

    fn bo(&self, dmabuf: DmaBuf, usage: BufferUsage) -> Arc<dyn BufferObject> {
        self.live.fetch_add(1, Relaxed);
        Arc::new(TestBo {
            dmabuf,
            usage,
            live: self.live.clone(),
        })
    }
}

impl Allocator for TestAllocator {
    fn create_bo(
        &self,
        width: i32,
        height: i32,
        format: &'static Format,
        modifiers: &[Modifier],
        usage: BufferUsage,
    ) -> Result<Arc<dyn BufferObject>, AllocatorError> {
        if self.fail.load(Relaxed) {
            return Err(AllocatorError(Box::new(TestGfxError("allocation failed"))));
        }
        self.allocated.fetch_add(1, Relaxed);
        let mut planes = PlaneVec::new();
        planes.push(DmaBufPlane {
            offset: 0,
            stride: width as u32 * format.bpp / 8,
            fd: Arc::new(dummy_fd("bo")),
        });
        let dmabuf = DmaBuf {
            width,
            height,
            format,
            modifier: modifiers.first().copied().unwrap_or(LINEAR_MODIFIER),
            planes,
        };
        Ok(self.bo(dmabuf, usage))
    }

    fn import_dmabuf(
        &self,
        dmabuf: &DmaBuf,
        usage: BufferUsage,
    ) -> Result<Arc<dyn BufferObject>, AllocatorError> {
        self.imported.fetch_add(1, Relaxed);
        Ok(self.bo(dmabuf.clone(), usage))
    }

    fn copy(&self, src: &dyn BufferObject, dst: &dyn BufferObject) -> Result<(), AllocatorError> {
        let (src, dst) = (src.dmabuf(), dst.dmabuf());
        if (src.width, src.height) != (dst.width, dst.height) {
            return Err(AllocatorError(Box::new(TestGfxError("size mismatch"))));
        }
        self.copies.fetch_add(1, Relaxed);
        Ok(())
    }
}

pub struct TestDriverSurface {
    pub format: &'static Format,
    pub color_buffer: Mutex<Option<Arc<dyn BufferObject>>>,
    pub handler: Arc<dyn SurfaceUpdateHandler>,
    pub fail_next: AtomicBool,
    pub destroyed: AtomicBool,
}

impl TestDriverSurface {
    pub fn color_buffer_size(&self) -> Option<(i32, i32)> {
        let bo = self.color_buffer.lock();
        bo.as_ref().map(|bo| (bo.dmabuf().width, bo.dmabuf().height))
    }
}

impl DriverSurface for TestDriverSurface {
    fn set_color_buffer(&self, buffer: &Arc<dyn BufferObject>) -> Result<(), GfxError> {
        if self.fail_next.swap(false, Relaxed) {
            return Err(gfx_error("set_color_buffer failed"));
        }
        *self.color_buffer.lock() = Some(buffer.clone());
        Ok(())
    }

    fn destroy(&self) {
        self.destroyed.store(true, Relaxed);
        self.color_buffer.lock().take();
    }
}

pub struct TestDriver {
    pub device_ids: Vec<DeviceId>,
    pub formats: Vec<(u32, Vec<Modifier>)>,
    pub native_fences: bool,
    pub allocator: Arc<TestAllocator>,
    pub surfaces: Mutex<Vec<Arc<TestDriverSurface>>>,
    pub fences: AtomicUsize,
    pub finishes: AtomicUsize,
    pub gpu_waits: AtomicUsize,
}

impl TestDriver {
    pub fn new(device_ids: Vec<DeviceId>, formats: Vec<(u32, Vec<Modifier>)>) -> Self {
        Self {
            device_ids,
            formats,
            native_fences: true,
            allocator: Default::default(),
            surfaces: Default::default(),
            fences: Default::default(),
            finishes: Default::default(),
            gpu_waits: Default::default(),
        }
    }

    pub fn last_surface(&self) -> Option<Arc<TestDriverSurface>> {
        self.surfaces.lock().last().cloned()
    }
}

impl GfxDriver for TestDriver {
    fn device_ids(&self) -> &[DeviceId] {
        &self.device_ids
    }

    fn drm_fd(&self) -> Option<Arc<OwnedFd>> {
        None
    }

    fn formats(&self) -> Result<Vec<DriverFormat>, GfxError> {
        let formats = self
            .formats
            .iter()
            .map(|(fourcc, modifiers)| DriverFormat {
                fourcc: *fourcc,
                modifiers: modifiers
                    .iter()
                    .map(|m| DriverModifier {
                        modifier: *m,
                        external_only: false,
                    })
                    .collect(),
            })
            .collect();
        Ok(formats)
    }

    fn allocator(&self) -> Arc<dyn Allocator> {
        self.allocator.clone()
    }

    fn supports_native_fences(&self) -> bool {
        self.native_fences
    }

    fn create_native_fence(&self) -> Result<SyncFile, GfxError> {
        self.fences.fetch_add(1, Relaxed);
        Ok(SyncFile(Arc::new(dummy_fd("native_fence"))))
    }

    fn finish(&self) -> Result<(), GfxError> {
        self.finishes.fetch_add(1, Relaxed);
        Ok(())
    }

    fn wait_sync_file(&self, _sync_file: &SyncFile) -> Result<(), GfxError> {
        self.gpu_waits.fetch_add(1, Relaxed);
        Ok(())
    }

    fn create_surface(
        &self,
        format: &'static Format,
        render_buffer: &Arc<dyn BufferObject>,
        handler: Arc<dyn SurfaceUpdateHandler>,
    ) -> Result<Arc<dyn DriverSurface>, GfxError> {
        let surface = Arc::new(TestDriverSurface {
            format,
            color_buffer: Mutex::new(Some(render_buffer.clone())),
            handler,
            fail_next: Default::default(),
            destroyed: Default::default(),
        });
        self.surfaces.lock().push(surface.clone());
        Ok(surface)
    }
}
