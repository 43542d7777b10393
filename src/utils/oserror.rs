use {
    std::{
        error::Error,
        fmt::{Display, Formatter},
    },
    uapi::{Errno, c},
};

static MSGS: &[(c::c_int, &str)] = &[
    (c::EPERM, "Operation not permitted"),
    (c::ENOENT, "No such file or directory"),
    (c::EINTR, "Interrupted system call"),
    (c::EIO, "Input/output error"),
    (c::EBADF, "Bad file descriptor"),
    (c::EAGAIN, "Resource temporarily unavailable"),
    (c::ENOMEM, "Cannot allocate memory"),
    (c::EACCES, "Permission denied"),
    (c::EFAULT, "Bad address"),
    (c::EBUSY, "Device or resource busy"),
    (c::EEXIST, "File exists"),
    (c::ENODEV, "No such device"),
    (c::EINVAL, "Invalid argument"),
    (c::EMFILE, "Too many open files"),
    (c::ENOTTY, "Inappropriate ioctl for device"),
    (c::EPIPE, "Broken pipe"),
    (c::ENOSYS, "Function not implemented"),
    (c::ETIME, "Timer expired"),
    (c::EPROTO, "Protocol error"),
    (c::EOPNOTSUPP, "Operation not supported"),
    (c::ECONNRESET, "Connection reset by peer"),
    (c::ETIMEDOUT, "Connection timed out"),
];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OsError(pub c::c_int);

impl OsError {
    /// Whether the error only means that a bounded wait ran out of time.
    pub fn is_timeout(self) -> bool {
        matches!(self.0, c::ETIME | c::ETIMEDOUT | c::EINTR)
    }
}

impl From<Errno> for OsError {
    fn from(e: Errno) -> Self {
        Self(e.0)
    }
}

impl From<c::c_int> for OsError {
    fn from(v: c::c_int) -> Self {
        Self(v)
    }
}

impl Default for OsError {
    fn default() -> Self {
        Errno::default().into()
    }
}

impl Error for OsError {}

impl Display for OsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let msg = MSGS
            .iter()
            .find(|(errno, _)| *errno == self.0)
            .map(|(_, msg)| *msg)
            .unwrap_or("unknown error");
        write!(f, "{} (os error {})", msg, self.0)
    }
}
