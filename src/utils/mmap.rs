use {
    crate::utils::oserror::OsError,
    std::{ptr, slice},
    uapi::c,
};

/// A read-only shared mapping that is unmapped on drop.
pub struct Mmapped {
    ptr: *mut c::c_void,
    len: usize,
}

unsafe impl Send for Mmapped {}
unsafe impl Sync for Mmapped {}

pub fn mmap_read_only(len: usize, fd: c::c_int) -> Result<Mmapped, OsError> {
    let res = unsafe {
        c::mmap(
            ptr::null_mut(),
            len,
            c::PROT_READ,
            c::MAP_PRIVATE,
            fd,
            0,
        )
    };
    if res == c::MAP_FAILED {
        return Err(OsError::default());
    }
    Ok(Mmapped { ptr: res, len })
}

impl Mmapped {
    pub fn bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.cast(), self.len) }
    }
}

impl Drop for Mmapped {
    fn drop(&mut self) {
        unsafe {
            c::munmap(self.ptr, self.len);
        }
    }
}
