use {
    crate::{
        format::Format,
        gfx_api::SyncFile,
        utils::{errorfmt::ErrorFmt, oserror::OsError},
        video::{Modifier, drm::sys::ioctl},
    },
    arrayvec::ArrayVec,
    smallvec::SmallVec,
    std::{sync::Arc, time::Duration},
    uapi::{_IOW, _IOWR, OwnedFd, c},
};

#[derive(Clone, Debug)]
pub struct DmaBufPlane {
    pub offset: u32,
    pub stride: u32,
    pub fd: Arc<OwnedFd>,
}

#[derive(Debug, Clone)]
pub struct DmaBuf {
    pub width: i32,
    pub height: i32,
    pub format: &'static Format,
    pub modifier: Modifier,
    pub planes: PlaneVec<DmaBufPlane>,
}

pub const MAX_PLANES: usize = 4;

pub type PlaneVec<T> = ArrayVec<T, MAX_PLANES>;

impl DmaBuf {
    /// The fd through which implicit fences of the buffer are reached.
    pub fn fd(&self) -> Option<&Arc<OwnedFd>> {
        self.planes.first().map(|p| &p.fd)
    }
}

const DMA_BUF_BASE: u64 = b'b' as _;

#[allow(non_camel_case_types)]
#[repr(C)]
struct dma_buf_export_sync_file {
    flags: u32,
    fd: i32,
}

#[allow(non_camel_case_types)]
#[repr(C)]
struct dma_buf_import_sync_file {
    flags: u32,
    fd: i32,
}

pub const DMA_BUF_SYNC_READ: u32 = 1 << 0;
pub const DMA_BUF_SYNC_WRITE: u32 = 1 << 1;

const DMA_BUF_IOCTL_EXPORT_SYNC_FILE: u64 = _IOWR::<dma_buf_export_sync_file>(DMA_BUF_BASE, 2);
const DMA_BUF_IOCTL_IMPORT_SYNC_FILE: u64 = _IOW::<dma_buf_import_sync_file>(DMA_BUF_BASE, 3);

pub fn dma_buf_export_sync_file(dmabuf: &OwnedFd, flags: u32) -> Result<OwnedFd, OsError> {
    let mut data = dma_buf_export_sync_file { flags, fd: -1 };
    unsafe {
        ioctl(dmabuf.raw(), DMA_BUF_IOCTL_EXPORT_SYNC_FILE, &mut data)?;
    }
    Ok(OwnedFd::new(data.fd))
}

pub fn dma_buf_import_sync_file(
    dmabuf: &OwnedFd,
    flags: u32,
    sync_file: &OwnedFd,
) -> Result<(), OsError> {
    let mut data = dma_buf_import_sync_file {
        flags,
        fd: sync_file.raw(),
    };
    unsafe {
        ioctl(dmabuf.raw(), DMA_BUF_IOCTL_IMPORT_SYNC_FILE, &mut data)?;
    }
    Ok(())
}

/// Access to the implicit fences attached to dma-bufs.
pub trait DmaBufSync: Send + Sync {
    /// Whether the kernel can import and export implicit fences.
    fn supported(&self) -> bool;

    fn export_sync_file(&self, dmabuf: &OwnedFd, flags: u32) -> Result<SyncFile, OsError>;

    fn import_sync_file(
        &self,
        dmabuf: &OwnedFd,
        flags: u32,
        sync_file: &SyncFile,
    ) -> Result<(), OsError>;

    /// Waits until pending accesses to at least one of the buffers have
    /// completed and returns which buffers are writable.
    ///
    /// `None` blocks without a timeout.
    fn poll_writable(
        &self,
        dmabufs: &[Arc<OwnedFd>],
        timeout: Option<Duration>,
    ) -> Result<SmallVec<[bool; 4]>, OsError>;
}

pub struct KernelDmaBufSync {
    supported: bool,
}

impl KernelDmaBufSync {
    pub fn new() -> Self {
        let supported = match kernel_release() {
            Ok(release) => kernel_supports_sync_file_ioctls(&release),
            Err(e) => {
                log::warn!("Could not read the kernel release: {}", ErrorFmt(e));
                false
            }
        };
        Self { supported }
    }
}

fn kernel_release() -> Result<String, OsError> {
    let uts = uapi::uname()?;
    let release: Vec<u8> = uts
        .release
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    Ok(String::from_utf8_lossy(&release).into_owned())
}

/// The sync file ioctls were added in linux 5.20, released as 6.0.
fn kernel_supports_sync_file_ioctls(release: &str) -> bool {
    let mut parts = release.trim().split(['.', '-']);
    let major = parts.next().and_then(|v| v.parse::<u32>().ok());
    let minor = parts.next().and_then(|v| v.parse::<u32>().ok());
    match (major, minor) {
        (Some(major), Some(minor)) => (major, minor) >= (5, 20),
        _ => false,
    }
}

impl DmaBufSync for KernelDmaBufSync {
    fn supported(&self) -> bool {
        self.supported
    }

    fn export_sync_file(&self, dmabuf: &OwnedFd, flags: u32) -> Result<SyncFile, OsError> {
        dma_buf_export_sync_file(dmabuf, flags).map(|fd| SyncFile(Arc::new(fd)))
    }

    fn import_sync_file(
        &self,
        dmabuf: &OwnedFd,
        flags: u32,
        sync_file: &SyncFile,
    ) -> Result<(), OsError> {
        dma_buf_import_sync_file(dmabuf, flags, sync_file)
    }

    fn poll_writable(
        &self,
        dmabufs: &[Arc<OwnedFd>],
        timeout: Option<Duration>,
    ) -> Result<SmallVec<[bool; 4]>, OsError> {
        let timeout = match timeout {
            None => -1,
            Some(t) => t.as_millis().min(c::c_int::MAX as u128) as c::c_int,
        };
        let mut fds: SmallVec<[c::pollfd; 4]> = dmabufs
            .iter()
            .map(|fd| c::pollfd {
                fd: fd.raw(),
                events: c::POLLOUT,
                revents: 0,
            })
            .collect();
        loop {
            match uapi::poll(&mut fds, timeout) {
                Ok(_) => break,
                Err(e) if e.0 == c::EINTR || e.0 == c::EAGAIN => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(fds.iter().map(|p| p.revents & c::POLLOUT != 0).collect())
    }
}
