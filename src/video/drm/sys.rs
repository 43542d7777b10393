#![allow(non_camel_case_types)]

use {
    crate::utils::{compat::IoctlNumber, oserror::OsError},
    uapi::{OwnedFd, c},
};

pub unsafe fn ioctl<T>(fd: c::c_int, request: c::c_ulong, t: &mut T) -> Result<c::c_int, OsError> {
    let mut ret;
    loop {
        ret = unsafe { c::ioctl(fd, request as IoctlNumber, &mut *t) };
        if ret != -1 {
            return Ok(ret);
        }
        let err = uapi::get_errno();
        if !matches!(err, c::EINTR | c::EAGAIN) {
            return Err(OsError(err));
        }
    }
}

pub const DRM_IOCTL_BASE: u64 = b'd' as u64;

pub const fn drm_iowr<T>(nr: u64) -> u64 {
    uapi::_IOWR::<T>(DRM_IOCTL_BASE, nr)
}

pub const DRM_CAP_SYNCOBJ_TIMELINE: u64 = 0x14;

#[repr(C)]
struct drm_get_cap {
    capability: u64,
    value: u64,
}

const DRM_IOCTL_GET_CAP: u64 = drm_iowr::<drm_get_cap>(0x0c);

pub fn get_cap(fd: c::c_int, capability: u64) -> Result<u64, OsError> {
    let mut cap = drm_get_cap {
        capability,
        value: 0,
    };
    unsafe {
        ioctl(fd, DRM_IOCTL_GET_CAP, &mut cap)?;
    }
    Ok(cap.value)
}

#[repr(C)]
struct drm_syncobj_create {
    handle: u32,
    flags: u32,
}

const DRM_IOCTL_SYNCOBJ_CREATE: u64 = drm_iowr::<drm_syncobj_create>(0xBF);

pub fn sync_obj_create(drm: c::c_int, flags: u32) -> Result<u32, OsError> {
    let mut res = drm_syncobj_create { handle: 0, flags };
    unsafe {
        ioctl(drm, DRM_IOCTL_SYNCOBJ_CREATE, &mut res)?;
    }
    Ok(res.handle)
}

#[repr(C)]
struct drm_syncobj_destroy {
    handle: u32,
    pad: u32,
}

const DRM_IOCTL_SYNCOBJ_DESTROY: u64 = drm_iowr::<drm_syncobj_destroy>(0xC0);

pub fn sync_obj_destroy(drm: c::c_int, handle: u32) -> Result<(), OsError> {
    let mut res = drm_syncobj_destroy { handle, pad: 0 };
    unsafe {
        ioctl(drm, DRM_IOCTL_SYNCOBJ_DESTROY, &mut res)?;
    }
    Ok(())
}

pub const DRM_SYNCOBJ_FD_TO_HANDLE_FLAGS_IMPORT_SYNC_FILE: u32 = 1 << 0;
pub const DRM_SYNCOBJ_HANDLE_TO_FD_FLAGS_EXPORT_SYNC_FILE: u32 = 1 << 0;

#[repr(C)]
struct drm_syncobj_handle {
    handle: u32,
    flags: u32,
    fd: i32,
    pad: u32,
}

const DRM_IOCTL_SYNCOBJ_HANDLE_TO_FD: u64 = drm_iowr::<drm_syncobj_handle>(0xC1);
const DRM_IOCTL_SYNCOBJ_FD_TO_HANDLE: u64 = drm_iowr::<drm_syncobj_handle>(0xC2);

pub fn sync_obj_handle_to_fd(drm: c::c_int, handle: u32, flags: u32) -> Result<OwnedFd, OsError> {
    let mut res = drm_syncobj_handle {
        handle,
        flags,
        fd: -1,
        pad: 0,
    };
    unsafe {
        ioctl(drm, DRM_IOCTL_SYNCOBJ_HANDLE_TO_FD, &mut res)?;
    }
    Ok(OwnedFd::new(res.fd))
}

pub fn sync_obj_fd_to_handle(
    drm: c::c_int,
    fd: c::c_int,
    flags: u32,
    handle: u32,
) -> Result<u32, OsError> {
    let mut res = drm_syncobj_handle {
        handle,
        flags,
        fd,
        pad: 0,
    };
    unsafe {
        ioctl(drm, DRM_IOCTL_SYNCOBJ_FD_TO_HANDLE, &mut res)?;
    }
    Ok(res.handle)
}

pub const DRM_SYNCOBJ_WAIT_FLAGS_WAIT_FOR_SUBMIT: u32 = 1 << 1;
pub const DRM_SYNCOBJ_WAIT_FLAGS_WAIT_AVAILABLE: u32 = 1 << 2;

#[repr(C)]
struct drm_syncobj_timeline_wait {
    handles: u64,
    points: u64,
    timeout_nsec: i64,
    count_handles: u32,
    flags: u32,
    first_signaled: u32,
    pad: u32,
}

const DRM_IOCTL_SYNCOBJ_TIMELINE_WAIT: u64 = drm_iowr::<drm_syncobj_timeline_wait>(0xCA);

/// Waits until one of the points has materialized or signaled.
///
/// `timeout_nsec` is an absolute `CLOCK_MONOTONIC` time. Returns the index of
/// the first signaled point.
pub fn sync_obj_timeline_wait(
    drm: c::c_int,
    handles: &[u32],
    points: &[u64],
    timeout_nsec: i64,
    flags: u32,
) -> Result<u32, OsError> {
    debug_assert_eq!(handles.len(), points.len());
    let mut res = drm_syncobj_timeline_wait {
        handles: handles.as_ptr() as u64,
        points: points.as_ptr() as u64,
        timeout_nsec,
        count_handles: handles.len() as u32,
        flags,
        first_signaled: 0,
        pad: 0,
    };
    unsafe {
        ioctl(drm, DRM_IOCTL_SYNCOBJ_TIMELINE_WAIT, &mut res)?;
    }
    Ok(res.first_signaled)
}

#[repr(C)]
struct drm_syncobj_transfer {
    src_handle: u32,
    dst_handle: u32,
    src_point: u64,
    dst_point: u64,
    flags: u32,
    pad: u32,
}

const DRM_IOCTL_SYNCOBJ_TRANSFER: u64 = drm_iowr::<drm_syncobj_transfer>(0xCC);

pub fn sync_obj_transfer(
    drm: c::c_int,
    src_handle: u32,
    src_point: u64,
    dst_handle: u32,
    dst_point: u64,
    flags: u32,
) -> Result<(), OsError> {
    let mut res = drm_syncobj_transfer {
        src_handle,
        dst_handle,
        src_point,
        dst_point,
        flags,
        pad: 0,
    };
    unsafe {
        ioctl(drm, DRM_IOCTL_SYNCOBJ_TRANSFER, &mut res)?;
    }
    Ok(())
}
