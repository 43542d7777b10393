pub mod dmabuf;
pub mod drm;

pub type Modifier = u64;

pub const LINEAR_MODIFIER: Modifier = 0;
pub const INVALID_MODIFIER: Modifier = 0x00ff_ffff_ffff_ffff;

/// The `dev_t` of a DRM device node.
pub type DeviceId = u64;
