use {
    crate::{
        gfx_api::SyncFile,
        utils::oserror::OsError,
        video::{
            dmabuf::DmaBufSync,
            drm::{
                DrmError,
                sync_obj::{SyncObjCtx, SyncObjHandle, SyncObjPoint, WaitMode},
            },
        },
    },
    ahash::AHashMap,
    parking_lot::Mutex,
    smallvec::SmallVec,
    std::{
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicUsize, Ordering::Relaxed},
        },
        time::Duration,
    },
    uapi::{OwnedFd, c},
};

/// Creates an fd that stands in for a kernel object.
pub fn dummy_fd(name: &str) -> OwnedFd {
    match uapi::memfd_create(name, c::MFD_CLOEXEC) {
        Ok(fd) => fd,
        Err(e) => panic!("Could not create a memfd: {}", e),
    }
}

fn inode(fd: &OwnedFd) -> u64 {
    match uapi::fstat(fd.raw()) {
        Ok(stat) => stat.st_ino as u64,
        Err(e) => panic!("Could not stat fd: {}", e),
    }
}

/// The inode of the sync file a fence was imported from. `None` for fences
/// that were signaled directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Fence(pub Option<u64>);

#[derive(Default)]
struct SyncObj {
    /// The fence of the binary point 0.
    binary: Option<Fence>,
    /// The highest point that has a fence. All fences have signaled.
    point: u64,
    fences: AHashMap<u64, Fence>,
    inode: Option<u64>,
}

/// Timeline sync objs whose fences signal as soon as they are attached.
#[derive(Default)]
pub struct TestSyncObjCtx {
    objs: Mutex<AHashMap<u32, SyncObj>>,
    next: AtomicUsize,
    pub no_timelines: AtomicBool,
    pub created: AtomicUsize,
    /// Fails the next import of a sync file.
    pub fail_import: AtomicBool,
    /// Fails the next transfer.
    pub fail_transfer: AtomicBool,
    exported: Mutex<Vec<Fence>>,
}

impl TestSyncObjCtx {
    pub fn live(&self) -> usize {
        self.objs.lock().len()
    }

    /// Signals `point` of the sync obj that was exported as `fd`.
    pub fn signal_fd(&self, fd: &OwnedFd, point: u64) -> bool {
        let inode = inode(fd);
        let mut objs = self.objs.lock();
        match objs.values_mut().find(|o| o.inode == Some(inode)) {
            Some(obj) => {
                obj.point = obj.point.max(point);
                true
            }
            None => false,
        }
    }

    pub fn signal(&self, handle: SyncObjHandle, point: u64) {
        if let Some(obj) = self.objs.lock().get_mut(&handle.0) {
            obj.point = obj.point.max(point);
        }
    }

    pub fn is_signaled(&self, handle: SyncObjHandle, point: u64) -> bool {
        self.objs
            .lock()
            .get(&handle.0)
            .is_some_and(|o| o.point >= point)
    }

    /// The fence that was last exported as a sync file.
    pub fn last_exported(&self) -> Option<Fence> {
        self.exported.lock().last().copied()
    }

    /// Whether `point` of the sync obj exported as `fd` has a fence.
    pub fn fd_point_available(&self, fd: &OwnedFd, point: u64) -> bool {
        let inode = inode(fd);
        self.objs
            .lock()
            .values()
            .any(|o| o.inode == Some(inode) && o.point >= point)
    }
}

/// The inode of the sync file.
pub fn sync_file_inode(sync_file: &SyncFile) -> u64 {
    inode(&sync_file.0)
}

fn not_found() -> OsError {
    OsError(c::ENOENT)
}

impl SyncObjCtx for TestSyncObjCtx {
    fn supports_timelines(&self) -> bool {
        !self.no_timelines.load(Relaxed)
    }

    fn create(&self) -> Result<SyncObjHandle, DrmError> {
        let handle = self.next.fetch_add(1, Relaxed) as u32 + 1;
        self.objs.lock().insert(handle, SyncObj::default());
        self.created.fetch_add(1, Relaxed);
        Ok(SyncObjHandle(handle))
    }

    fn destroy(&self, handle: SyncObjHandle) -> Result<(), DrmError> {
        match self.objs.lock().remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(DrmError::DestroySyncObj(not_found())),
        }
    }

    fn handle_to_fd(&self, handle: SyncObjHandle) -> Result<OwnedFd, DrmError> {
        let fd = dummy_fd("syncobj");
        let inode = inode(&fd);
        match self.objs.lock().get_mut(&handle.0) {
            Some(obj) => obj.inode = Some(inode),
            None => return Err(DrmError::ExportSyncObj(not_found())),
        }
        Ok(fd)
    }

    fn import_sync_file(
        &self,
        handle: SyncObjHandle,
        sync_file: &SyncFile,
    ) -> Result<(), DrmError> {
        if self.fail_import.swap(false, Relaxed) {
            return Err(DrmError::ImportSyncFile(OsError(c::EINVAL)));
        }
        match self.objs.lock().get_mut(&handle.0) {
            Some(obj) => {
                obj.binary = Some(Fence(Some(sync_file_inode(sync_file))));
                Ok(())
            }
            None => Err(DrmError::ImportSyncFile(not_found())),
        }
    }

    fn export_sync_file(&self, handle: SyncObjHandle) -> Result<SyncFile, DrmError> {
        match self.objs.lock().get(&handle.0) {
            Some(SyncObj {
                binary: Some(fence),
                ..
            }) => {
                self.exported.lock().push(*fence);
                Ok(SyncFile(Arc::new(dummy_fd("sync_file"))))
            }
            _ => Err(DrmError::ExportSyncFile(not_found())),
        }
    }

    fn transfer(
        &self,
        src: SyncObjHandle,
        src_point: SyncObjPoint,
        dst: SyncObjHandle,
        dst_point: SyncObjPoint,
    ) -> Result<(), DrmError> {
        if self.fail_transfer.swap(false, Relaxed) {
            return Err(DrmError::TransferPoint(OsError(c::EINVAL)));
        }
        let mut objs = self.objs.lock();
        let fence = match objs.get(&src.0) {
            Some(obj) if src_point.0 == 0 => obj.binary,
            Some(obj) if src_point.0 <= obj.point => {
                Some(obj.fences.get(&src_point.0).copied().unwrap_or(Fence(None)))
            }
            _ => None,
        };
        let Some(fence) = fence else {
            return Err(DrmError::TransferPoint(not_found()));
        };
        let Some(dst) = objs.get_mut(&dst.0) else {
            return Err(DrmError::TransferPoint(not_found()));
        };
        match dst_point.0 {
            0 => dst.binary = Some(fence),
            p => {
                dst.fences.insert(p, fence);
                dst.point = dst.point.max(p);
            }
        }
        Ok(())
    }

    fn wait_any(
        &self,
        points: &[(SyncObjHandle, SyncObjPoint)],
        timeout: Option<Duration>,
        _mode: WaitMode,
    ) -> Result<Option<usize>, DrmError> {
        let objs = self.objs.lock();
        let idx = points.iter().position(|(handle, point)| {
            objs.get(&handle.0).is_some_and(|o| o.point >= point.0)
        });
        match (idx, timeout) {
            (Some(idx), _) => Ok(Some(idx)),
            // Nothing else could signal the points.
            (None, None) => Err(DrmError::WaitPoint(OsError(c::EDEADLK))),
            (None, Some(_)) => Ok(None),
        }
    }
}

/// Implicit fences that have always signaled.
#[derive(Default)]
pub struct TestDmaBufSync {
    pub unsupported: AtomicBool,
    pub imports: AtomicUsize,
    pub exports: AtomicUsize,
}

impl DmaBufSync for TestDmaBufSync {
    fn supported(&self) -> bool {
        !self.unsupported.load(Relaxed)
    }

    fn export_sync_file(&self, _dmabuf: &OwnedFd, _flags: u32) -> Result<SyncFile, OsError> {
        self.exports.fetch_add(1, Relaxed);
        Ok(SyncFile(Arc::new(dummy_fd("implicit_fence"))))
    }

    fn import_sync_file(
        &self,
        _dmabuf: &OwnedFd,
        _flags: u32,
        _sync_file: &SyncFile,
    ) -> Result<(), OsError> {
        self.imports.fetch_add(1, Relaxed);
        Ok(())
    }

    fn poll_writable(
        &self,
        dmabufs: &[Arc<OwnedFd>],
        _timeout: Option<Duration>,
    ) -> Result<SmallVec<[bool; 4]>, OsError> {
        Ok(dmabufs.iter().map(|_| true).collect())
    }
}
