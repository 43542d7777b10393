//! The subset of the display protocol used to share buffers and pace frames.
//!
//! Messages are kept in decoded form. Serialization is the job of the
//! transport.

use {
    std::{fmt, sync::Arc},
    uapi::OwnedFd,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectId(u32);

impl ObjectId {
    pub const NONE: Self = ObjectId(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

id!(WlDisplayId);
id!(WlRegistryId);
id!(WlCallbackId);
id!(WlSurfaceId);
id!(WlBufferId);
id!(ZwpLinuxDmabufV1Id);
id!(ZwpLinuxBufferParamsV1Id);
id!(ZwpLinuxDmabufFeedbackV1Id);
id!(WpLinuxDrmSyncobjManagerV1Id);
id!(WpLinuxDrmSyncobjSurfaceV1Id);
id!(WpLinuxDrmSyncobjTimelineV1Id);
id!(WpFifoManagerV1Id);
id!(WpFifoV1Id);
id!(WpCommitTimingManagerV1Id);
id!(WpCommitTimerV1Id);
id!(WpPresentationId);
id!(WpPresentationFeedbackId);

pub const WL_DISPLAY_ID: WlDisplayId = WlDisplayId::from_raw(1);

pub mod wl_surface {
    pub const DAMAGE_BUFFER_SINCE: u32 = 4;
}

pub mod zwp_linux_dmabuf_v1 {
    pub const NAME: &str = "zwp_linux_dmabuf_v1";
    pub const MIN_VERSION: u32 = 3;
    pub const MAX_VERSION: u32 = 4;
    pub const GET_DEFAULT_FEEDBACK_SINCE: u32 = 4;
    pub const GET_SURFACE_FEEDBACK_SINCE: u32 = 4;
}

pub mod wp_linux_drm_syncobj_manager_v1 {
    pub const NAME: &str = "wp_linux_drm_syncobj_manager_v1";
    pub const MAX_VERSION: u32 = 1;
}

pub mod wp_fifo_manager_v1 {
    pub const NAME: &str = "wp_fifo_manager_v1";
    pub const MAX_VERSION: u32 = 1;
}

pub mod wp_commit_timing_manager_v1 {
    pub const NAME: &str = "wp_commit_timing_manager_v1";
    pub const MAX_VERSION: u32 = 1;
}

pub mod wp_presentation {
    pub const NAME: &str = "wp_presentation";
    pub const MAX_VERSION: u32 = 1;
}

pub mod zwp_linux_dmabuf_feedback_v1 {
    pub const TRANCHE_FLAGS_SCANOUT: u32 = 1;
}

#[derive(Clone, Debug)]
pub enum Request {
    WlDisplaySync {
        self_id: WlDisplayId,
        callback: WlCallbackId,
    },
    WlDisplayGetRegistry {
        self_id: WlDisplayId,
        registry: WlRegistryId,
    },
    WlRegistryBind {
        self_id: WlRegistryId,
        name: u32,
        interface: &'static str,
        version: u32,
        id: ObjectId,
    },
    WlSurfaceAttach {
        self_id: WlSurfaceId,
        buffer: WlBufferId,
        x: i32,
        y: i32,
    },
    WlSurfaceDamage {
        self_id: WlSurfaceId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    WlSurfaceDamageBuffer {
        self_id: WlSurfaceId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    WlSurfaceFrame {
        self_id: WlSurfaceId,
        callback: WlCallbackId,
    },
    WlSurfaceCommit {
        self_id: WlSurfaceId,
    },
    WlBufferDestroy {
        self_id: WlBufferId,
    },
    ZwpLinuxDmabufV1CreateParams {
        self_id: ZwpLinuxDmabufV1Id,
        params_id: ZwpLinuxBufferParamsV1Id,
    },
    ZwpLinuxDmabufV1GetDefaultFeedback {
        self_id: ZwpLinuxDmabufV1Id,
        id: ZwpLinuxDmabufFeedbackV1Id,
    },
    ZwpLinuxDmabufV1GetSurfaceFeedback {
        self_id: ZwpLinuxDmabufV1Id,
        id: ZwpLinuxDmabufFeedbackV1Id,
        surface: WlSurfaceId,
    },
    ZwpLinuxBufferParamsV1Add {
        self_id: ZwpLinuxBufferParamsV1Id,
        fd: Arc<OwnedFd>,
        plane_idx: u32,
        offset: u32,
        stride: u32,
        modifier_hi: u32,
        modifier_lo: u32,
    },
    ZwpLinuxBufferParamsV1Create {
        self_id: ZwpLinuxBufferParamsV1Id,
        width: i32,
        height: i32,
        format: u32,
        flags: u32,
    },
    ZwpLinuxBufferParamsV1Destroy {
        self_id: ZwpLinuxBufferParamsV1Id,
    },
    ZwpLinuxDmabufFeedbackV1Destroy {
        self_id: ZwpLinuxDmabufFeedbackV1Id,
    },
    WpLinuxDrmSyncobjManagerV1GetSurface {
        self_id: WpLinuxDrmSyncobjManagerV1Id,
        id: WpLinuxDrmSyncobjSurfaceV1Id,
        surface: WlSurfaceId,
    },
    WpLinuxDrmSyncobjManagerV1ImportTimeline {
        self_id: WpLinuxDrmSyncobjManagerV1Id,
        id: WpLinuxDrmSyncobjTimelineV1Id,
        fd: Arc<OwnedFd>,
    },
    WpLinuxDrmSyncobjTimelineV1Destroy {
        self_id: WpLinuxDrmSyncobjTimelineV1Id,
    },
    WpLinuxDrmSyncobjSurfaceV1SetAcquirePoint {
        self_id: WpLinuxDrmSyncobjSurfaceV1Id,
        timeline: WpLinuxDrmSyncobjTimelineV1Id,
        point_hi: u32,
        point_lo: u32,
    },
    WpLinuxDrmSyncobjSurfaceV1SetReleasePoint {
        self_id: WpLinuxDrmSyncobjSurfaceV1Id,
        timeline: WpLinuxDrmSyncobjTimelineV1Id,
        point_hi: u32,
        point_lo: u32,
    },
    WpLinuxDrmSyncobjSurfaceV1Destroy {
        self_id: WpLinuxDrmSyncobjSurfaceV1Id,
    },
    WpFifoManagerV1GetFifo {
        self_id: WpFifoManagerV1Id,
        id: WpFifoV1Id,
        surface: WlSurfaceId,
    },
    WpFifoV1SetBarrier {
        self_id: WpFifoV1Id,
    },
    WpFifoV1WaitBarrier {
        self_id: WpFifoV1Id,
    },
    WpFifoV1Destroy {
        self_id: WpFifoV1Id,
    },
    WpCommitTimingManagerV1GetTimer {
        self_id: WpCommitTimingManagerV1Id,
        id: WpCommitTimerV1Id,
        surface: WlSurfaceId,
    },
    WpCommitTimerV1SetTimestamp {
        self_id: WpCommitTimerV1Id,
        tv_sec_hi: u32,
        tv_sec_lo: u32,
        tv_nsec: u32,
    },
    WpCommitTimerV1Destroy {
        self_id: WpCommitTimerV1Id,
    },
    WpPresentationFeedback {
        self_id: WpPresentationId,
        surface: WlSurfaceId,
        callback: WpPresentationFeedbackId,
    },
}

impl Request {
    /// The object the request is sent to.
    pub fn target(&self) -> ObjectId {
        use Request::*;
        match self {
            WlDisplaySync { self_id, .. } | WlDisplayGetRegistry { self_id, .. } => {
                (*self_id).into()
            }
            WlRegistryBind { self_id, .. } => (*self_id).into(),
            WlSurfaceAttach { self_id, .. }
            | WlSurfaceDamage { self_id, .. }
            | WlSurfaceDamageBuffer { self_id, .. }
            | WlSurfaceFrame { self_id, .. }
            | WlSurfaceCommit { self_id } => (*self_id).into(),
            WlBufferDestroy { self_id } => (*self_id).into(),
            ZwpLinuxDmabufV1CreateParams { self_id, .. }
            | ZwpLinuxDmabufV1GetDefaultFeedback { self_id, .. }
            | ZwpLinuxDmabufV1GetSurfaceFeedback { self_id, .. } => (*self_id).into(),
            ZwpLinuxBufferParamsV1Add { self_id, .. }
            | ZwpLinuxBufferParamsV1Create { self_id, .. }
            | ZwpLinuxBufferParamsV1Destroy { self_id } => (*self_id).into(),
            ZwpLinuxDmabufFeedbackV1Destroy { self_id } => (*self_id).into(),
            WpLinuxDrmSyncobjManagerV1GetSurface { self_id, .. }
            | WpLinuxDrmSyncobjManagerV1ImportTimeline { self_id, .. } => (*self_id).into(),
            WpLinuxDrmSyncobjTimelineV1Destroy { self_id } => (*self_id).into(),
            WpLinuxDrmSyncobjSurfaceV1SetAcquirePoint { self_id, .. }
            | WpLinuxDrmSyncobjSurfaceV1SetReleasePoint { self_id, .. }
            | WpLinuxDrmSyncobjSurfaceV1Destroy { self_id } => (*self_id).into(),
            WpFifoManagerV1GetFifo { self_id, .. } => (*self_id).into(),
            WpFifoV1SetBarrier { self_id }
            | WpFifoV1WaitBarrier { self_id }
            | WpFifoV1Destroy { self_id } => (*self_id).into(),
            WpCommitTimingManagerV1GetTimer { self_id, .. } => (*self_id).into(),
            WpCommitTimerV1SetTimestamp { self_id, .. } | WpCommitTimerV1Destroy { self_id } => {
                (*self_id).into()
            }
            WpPresentationFeedback { self_id, .. } => (*self_id).into(),
        }
    }

    /// Whether the request destroys its target.
    pub fn is_destructor(&self) -> bool {
        use Request::*;
        matches!(
            self,
            WlBufferDestroy { .. }
                | ZwpLinuxBufferParamsV1Destroy { .. }
                | ZwpLinuxDmabufFeedbackV1Destroy { .. }
                | WpLinuxDrmSyncobjTimelineV1Destroy { .. }
                | WpLinuxDrmSyncobjSurfaceV1Destroy { .. }
                | WpFifoV1Destroy { .. }
                | WpCommitTimerV1Destroy { .. }
        )
    }
}

#[derive(Debug)]
pub struct Event {
    pub object: ObjectId,
    pub body: EventBody,
}

#[derive(Debug)]
pub enum EventBody {
    WlCallbackDone {
        callback_data: u32,
    },
    WlRegistryGlobal {
        name: u32,
        interface: String,
        version: u32,
    },
    WlRegistryGlobalRemove {
        name: u32,
    },
    WlBufferRelease,
    ZwpLinuxDmabufV1Format {
        format: u32,
    },
    ZwpLinuxDmabufV1Modifier {
        format: u32,
        modifier_hi: u32,
        modifier_lo: u32,
    },
    ZwpLinuxBufferParamsV1Created {
        buffer: WlBufferId,
    },
    ZwpLinuxBufferParamsV1Failed,
    ZwpLinuxDmabufFeedbackV1Done,
    ZwpLinuxDmabufFeedbackV1FormatTable {
        fd: Arc<OwnedFd>,
        size: u32,
    },
    ZwpLinuxDmabufFeedbackV1MainDevice {
        device: Vec<u8>,
    },
    ZwpLinuxDmabufFeedbackV1TrancheDone,
    ZwpLinuxDmabufFeedbackV1TrancheTargetDevice {
        device: Vec<u8>,
    },
    ZwpLinuxDmabufFeedbackV1TrancheFormats {
        indices: Vec<u16>,
    },
    ZwpLinuxDmabufFeedbackV1TrancheFlags {
        flags: u32,
    },
    WpPresentationClockId {
        clk_id: u32,
    },
    WpPresentationFeedbackSyncOutput,
    WpPresentationFeedbackPresented {
        tv_sec_hi: u32,
        tv_sec_lo: u32,
        tv_nsec: u32,
        refresh: u32,
        seq_hi: u32,
        seq_lo: u32,
        flags: u32,
    },
    WpPresentationFeedbackDiscarded,
}

impl EventBody {
    /// Whether the event destroys the object it is sent to.
    pub fn is_destructor(&self) -> bool {
        matches!(
            self,
            EventBody::WlCallbackDone { .. }
                | EventBody::WpPresentationFeedbackPresented { .. }
                | EventBody::WpPresentationFeedbackDiscarded
        )
    }
}
