pub mod sync_obj;
pub mod sys;

use {
    crate::{utils::oserror::OsError, video::DeviceId},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum DrmError {
    #[error("Could not create a sync obj")]
    CreateSyncObj(#[source] OsError),
    #[error("Could not destroy a sync obj")]
    DestroySyncObj(#[source] OsError),
    #[error("Could not export a sync obj")]
    ExportSyncObj(#[source] OsError),
    #[error("Could not import a sync file into a sync obj")]
    ImportSyncFile(#[source] OsError),
    #[error("Could not export a sync file from a sync obj")]
    ExportSyncFile(#[source] OsError),
    #[error("Could not transfer a sync obj point")]
    TransferPoint(#[source] OsError),
    #[error("Could not wait for a sync obj point")]
    WaitPoint(#[source] OsError),
    #[error("Could not read the monotonic clock")]
    Clock(#[source] OsError),
    #[error("Could not stat the drm device")]
    Stat(#[source] OsError),
}

/// Returns the device id of a DRM node given by path, e.g. `/dev/dri/renderD128`.
pub fn device_id_of_path(path: &str) -> Result<DeviceId, DrmError> {
    let stat = uapi::stat(path).map_err(|e| DrmError::Stat(e.into()))?;
    Ok(stat.st_rdev as DeviceId)
}
