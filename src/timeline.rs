use {
    crate::{
        gfx_api::SyncFile,
        utils::errorfmt::ErrorFmt,
        video::drm::{
            DrmError,
            sync_obj::{SyncObjCtx, SyncObjHandle, SyncObjPoint, TempSyncObj},
        },
        wire::{Request, WpLinuxDrmSyncobjManagerV1Id, WpLinuxDrmSyncobjTimelineV1Id},
        wl_usr::{UsrConError, UsrQueue, WlTransport},
    },
    std::sync::Arc,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Could not create a timeline sync obj")]
    Create(#[source] DrmError),
    #[error("Could not export the timeline")]
    Export(#[source] DrmError),
    #[error("Could not create a temporary sync obj")]
    CreateTemp(#[source] DrmError),
    #[error("Could not import the sync file")]
    ImportSyncFile(#[source] DrmError),
    #[error("Could not transfer the fence to point {0}")]
    TransferTo(u64, #[source] DrmError),
    #[error("Could not transfer the fence of point {0}")]
    TransferFrom(u64, #[source] DrmError),
    #[error("Could not export the sync file")]
    ExportSyncFile(#[source] DrmError),
    #[error("Could not share the timeline with the compositor")]
    Share(#[source] UsrConError),
}

/// A timeline sync obj shared with the compositor.
///
/// `point` is the last point that a fence has been attached to.
pub struct Timeline {
    ctx: Arc<dyn SyncObjCtx>,
    con: Arc<dyn WlTransport>,
    pub handle: SyncObjHandle,
    pub id: WpLinuxDrmSyncobjTimelineV1Id,
    pub point: u64,
}

impl Timeline {
    /// Creates the sync obj and imports it into the compositor.
    pub fn init(
        ctx: &Arc<dyn SyncObjCtx>,
        queue: &UsrQueue,
        manager: WpLinuxDrmSyncobjManagerV1Id,
    ) -> Result<Self, TimelineError> {
        let handle = ctx.create().map_err(TimelineError::Create)?;
        let destroy = |e| {
            if let Err(e) = ctx.destroy(handle) {
                log::error!("Could not destroy a sync obj: {}", ErrorFmt(e));
            }
            e
        };
        let fd = match ctx.handle_to_fd(handle) {
            Ok(fd) => Arc::new(fd),
            Err(e) => return Err(destroy(TimelineError::Export(e))),
        };
        let id = queue.new_id();
        let res = queue.request(Request::WpLinuxDrmSyncobjManagerV1ImportTimeline {
            self_id: manager,
            id,
            fd,
        });
        if let Err(e) = res {
            queue.forget(id);
            return Err(destroy(TimelineError::Share(e)));
        }
        Ok(Self {
            ctx: ctx.clone(),
            con: queue.con.clone(),
            handle,
            id,
            point: 0,
        })
    }

    /// Attaches the fence of the sync file to the next point.
    ///
    /// `point` is only advanced if the fence was attached.
    pub fn attach_sync_file(&mut self, sync_file: &SyncFile) -> Result<(), TimelineError> {
        let tmp = TempSyncObj::new(&*self.ctx).map_err(TimelineError::CreateTemp)?;
        self.ctx
            .import_sync_file(tmp.handle, sync_file)
            .map_err(TimelineError::ImportSyncFile)?;
        let next = self.point + 1;
        self.ctx
            .transfer(tmp.handle, SyncObjPoint(0), self.handle, SyncObjPoint(next))
            .map_err(|e| TimelineError::TransferTo(next, e))?;
        self.point = next;
        Ok(())
    }

    /// Returns a sync file that signals together with `point`.
    ///
    /// A fence must already have been attached to the point.
    pub fn point_to_sync_file(&self, point: u64) -> Result<SyncFile, TimelineError> {
        let tmp = TempSyncObj::new(&*self.ctx).map_err(TimelineError::CreateTemp)?;
        self.ctx
            .transfer(self.handle, SyncObjPoint(point), tmp.handle, SyncObjPoint(0))
            .map_err(|e| TimelineError::TransferFrom(point, e))?;
        self.ctx
            .export_sync_file(tmp.handle)
            .map_err(TimelineError::ExportSyncFile)
    }

    pub fn current(&self) -> (SyncObjHandle, SyncObjPoint) {
        (self.handle, SyncObjPoint(self.point))
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        let res = self
            .con
            .send(Request::WpLinuxDrmSyncobjTimelineV1Destroy { self_id: self.id });
        if let Err(e) = res {
            log::warn!("Could not destroy timeline {}: {}", self.id, ErrorFmt(e));
        }
        self.con.forget(self.id.into());
        if let Err(e) = self.ctx.destroy(self.handle) {
            log::error!("Could not destroy a timeline sync obj: {}", ErrorFmt(e));
        }
    }
}
