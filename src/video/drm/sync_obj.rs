use {
    crate::{
        gfx_api::SyncFile,
        utils::errorfmt::ErrorFmt,
        video::drm::{
            DrmError,
            sys::{
                DRM_CAP_SYNCOBJ_TIMELINE, DRM_SYNCOBJ_FD_TO_HANDLE_FLAGS_IMPORT_SYNC_FILE,
                DRM_SYNCOBJ_HANDLE_TO_FD_FLAGS_EXPORT_SYNC_FILE,
                DRM_SYNCOBJ_WAIT_FLAGS_WAIT_AVAILABLE, DRM_SYNCOBJ_WAIT_FLAGS_WAIT_FOR_SUBMIT,
                get_cap, sync_obj_create, sync_obj_destroy, sync_obj_fd_to_handle,
                sync_obj_handle_to_fd, sync_obj_timeline_wait, sync_obj_transfer,
            },
        },
    },
    std::{sync::Arc, time::Duration},
    uapi::{OwnedFd, c},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SyncObjHandle(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SyncObjPoint(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WaitMode {
    /// Wait until a fence has been attached to the point.
    Available,
    /// Wait until the fence attached to the point has signaled.
    Signaled,
}

/// Kernel timeline synchronization objects.
///
/// All handles are local to the context that created them.
pub trait SyncObjCtx: Send + Sync {
    fn supports_timelines(&self) -> bool;

    fn create(&self) -> Result<SyncObjHandle, DrmError>;

    fn destroy(&self, handle: SyncObjHandle) -> Result<(), DrmError>;

    /// Exports the whole object. The fd can be imported by other processes.
    fn handle_to_fd(&self, handle: SyncObjHandle) -> Result<OwnedFd, DrmError>;

    /// Replaces the fence of the binary point 0 with the fence of the sync file.
    fn import_sync_file(&self, handle: SyncObjHandle, sync_file: &SyncFile)
    -> Result<(), DrmError>;

    /// Exports the fence of the binary point 0 as a sync file.
    fn export_sync_file(&self, handle: SyncObjHandle) -> Result<SyncFile, DrmError>;

    fn transfer(
        &self,
        src: SyncObjHandle,
        src_point: SyncObjPoint,
        dst: SyncObjHandle,
        dst_point: SyncObjPoint,
    ) -> Result<(), DrmError>;

    /// Waits for any of the points.
    ///
    /// A timeout of `None` waits forever and `Some(Duration::ZERO)` only polls.
    /// Returns the index of the first point that satisfied the wait or `None`
    /// if the timeout expired.
    fn wait_any(
        &self,
        points: &[(SyncObjHandle, SyncObjPoint)],
        timeout: Option<Duration>,
        mode: WaitMode,
    ) -> Result<Option<usize>, DrmError>;
}

/// A sync obj that is destroyed when it goes out of scope.
pub struct TempSyncObj<'a> {
    ctx: &'a dyn SyncObjCtx,
    pub handle: SyncObjHandle,
}

impl<'a> TempSyncObj<'a> {
    pub fn new(ctx: &'a dyn SyncObjCtx) -> Result<Self, DrmError> {
        let handle = ctx.create()?;
        Ok(Self { ctx, handle })
    }
}

impl Drop for TempSyncObj<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.destroy(self.handle) {
            log::error!("Could not destroy temporary sync obj: {}", ErrorFmt(e));
        }
    }
}

pub struct DrmSyncObjCtx {
    drm: Arc<OwnedFd>,
    timelines: bool,
}

impl DrmSyncObjCtx {
    pub fn new(drm: &Arc<OwnedFd>) -> Self {
        let timelines = match get_cap(drm.raw(), DRM_CAP_SYNCOBJ_TIMELINE) {
            Ok(v) => v != 0,
            Err(e) => {
                log::debug!("Could not query timeline sync obj support: {}", ErrorFmt(e));
                false
            }
        };
        Self {
            drm: drm.clone(),
            timelines,
        }
    }
}

fn deadline(timeout: Option<Duration>) -> Result<i64, DrmError> {
    let Some(timeout) = timeout else {
        return Ok(i64::MAX);
    };
    if timeout.is_zero() {
        return Ok(0);
    }
    let mut now = uapi::pod_zeroed::<c::timespec>();
    uapi::clock_gettime(c::CLOCK_MONOTONIC, &mut now)
        .map_err(|e| DrmError::Clock(e.into()))?;
    let now = now.tv_sec as i64 * 1_000_000_000 + now.tv_nsec as i64;
    Ok(now.saturating_add(timeout.as_nanos().min(i64::MAX as u128) as i64))
}

impl SyncObjCtx for DrmSyncObjCtx {
    fn supports_timelines(&self) -> bool {
        self.timelines
    }

    fn create(&self) -> Result<SyncObjHandle, DrmError> {
        sync_obj_create(self.drm.raw(), 0)
            .map(SyncObjHandle)
            .map_err(DrmError::CreateSyncObj)
    }

    fn destroy(&self, handle: SyncObjHandle) -> Result<(), DrmError> {
        sync_obj_destroy(self.drm.raw(), handle.0).map_err(DrmError::DestroySyncObj)
    }

    fn handle_to_fd(&self, handle: SyncObjHandle) -> Result<OwnedFd, DrmError> {
        sync_obj_handle_to_fd(self.drm.raw(), handle.0, 0).map_err(DrmError::ExportSyncObj)
    }

    fn import_sync_file(
        &self,
        handle: SyncObjHandle,
        sync_file: &SyncFile,
    ) -> Result<(), DrmError> {
        sync_obj_fd_to_handle(
            self.drm.raw(),
            sync_file.raw(),
            DRM_SYNCOBJ_FD_TO_HANDLE_FLAGS_IMPORT_SYNC_FILE,
            handle.0,
        )
        .map_err(DrmError::ImportSyncFile)?;
        Ok(())
    }

    fn export_sync_file(&self, handle: SyncObjHandle) -> Result<SyncFile, DrmError> {
        sync_obj_handle_to_fd(
            self.drm.raw(),
            handle.0,
            DRM_SYNCOBJ_HANDLE_TO_FD_FLAGS_EXPORT_SYNC_FILE,
        )
        .map(|fd| SyncFile(Arc::new(fd)))
        .map_err(DrmError::ExportSyncFile)
    }

    fn transfer(
        &self,
        src: SyncObjHandle,
        src_point: SyncObjPoint,
        dst: SyncObjHandle,
        dst_point: SyncObjPoint,
    ) -> Result<(), DrmError> {
        sync_obj_transfer(self.drm.raw(), src.0, src_point.0, dst.0, dst_point.0, 0)
            .map_err(DrmError::TransferPoint)
    }

    fn wait_any(
        &self,
        points: &[(SyncObjHandle, SyncObjPoint)],
        timeout: Option<Duration>,
        mode: WaitMode,
    ) -> Result<Option<usize>, DrmError> {
        let handles: Vec<_> = points.iter().map(|p| p.0.0).collect();
        let values: Vec<_> = points.iter().map(|p| p.1.0).collect();
        let flags = match mode {
            WaitMode::Available => DRM_SYNCOBJ_WAIT_FLAGS_WAIT_AVAILABLE,
            WaitMode::Signaled => DRM_SYNCOBJ_WAIT_FLAGS_WAIT_FOR_SUBMIT,
        };
        let deadline = deadline(timeout)?;
        match sync_obj_timeline_wait(self.drm.raw(), &handles, &values, deadline, flags) {
            Ok(idx) => Ok(Some(idx as usize)),
            Err(e) if e.is_timeout() => Ok(None),
            Err(e) => Err(DrmError::WaitPoint(e)),
        }
    }
}
