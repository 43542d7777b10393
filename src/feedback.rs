use {
    crate::{
        format_list::FormatList,
        utils::{errorfmt::ErrorFmt, mmap::mmap_read_only, oserror::OsError},
        video::{DeviceId, INVALID_MODIFIER, LINEAR_MODIFIER, Modifier},
        wire::{
            Event, EventBody, Request, ZwpLinuxDmabufFeedbackV1Id, ZwpLinuxDmabufV1Id,
            zwp_linux_dmabuf_v1,
        },
        wl_usr::{UsrConError, UsrQueue},
    },
    byteorder::{NativeEndian, ReadBytesExt},
    isnt::std_1::vec::IsntVecExt,
    smallvec::SmallVec,
    std::mem,
    thiserror::Error,
    uapi::OwnedFd,
};

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Could not map the format table")]
    MapFormatTable(#[source] OsError),
    #[error("The compositor does not support dma-buf modifiers")]
    UnsupportedVersion,
    #[error("The compositor did not advertise any usable formats")]
    NoFormats,
    #[error(transparent)]
    UsrConError(#[from] UsrConError),
}

const TABLE_ENTRY_SIZE: usize = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableEntry {
    pub fourcc: u32,
    pub modifier: Modifier,
}

const INVALID_ENTRY: TableEntry = TableEntry {
    fourcc: 0,
    modifier: INVALID_MODIFIER,
};

fn read_device(device: &[u8]) -> Option<DeviceId> {
    let mut device = device;
    device.read_u64::<NativeEndian>().ok()
}

/// The state of a feedback object that does not depend on what the feedback
/// is used for.
#[derive(Default)]
pub struct FeedbackCommon {
    pub format_table: Vec<TableEntry>,
    pub main_device: Option<DeviceId>,
    pub tranche_target_device: Option<DeviceId>,
    pub tranche_flags: u32,
    pub error: Option<FeedbackError>,
}

impl FeedbackCommon {
    fn format_table(&mut self, fd: &OwnedFd, size: u32) {
        self.format_table.clear();
        let len = size as usize / TABLE_ENTRY_SIZE;
        if len == 0 {
            return;
        }
        let map = match mmap_read_only(len * TABLE_ENTRY_SIZE, fd.raw()) {
            Ok(m) => m,
            Err(e) => {
                log::error!("Could not map the format table: {}", ErrorFmt(e));
                self.error = Some(FeedbackError::MapFormatTable(e));
                return;
            }
        };
        let mut bytes = map.bytes();
        self.format_table.reserve(len);
        for _ in 0..len {
            let fourcc = bytes.read_u32::<NativeEndian>();
            let _pad = bytes.read_u32::<NativeEndian>();
            let modifier = bytes.read_u64::<NativeEndian>();
            match (fourcc, modifier) {
                (Ok(fourcc), Ok(modifier)) => self
                    .format_table
                    .push(TableEntry { fourcc, modifier }),
                _ => break,
            }
        }
    }

    fn entry(&self, idx: u16) -> TableEntry {
        self.format_table
            .get(idx as usize)
            .copied()
            .unwrap_or(INVALID_ENTRY)
    }

    /// Handles the events that all feedback objects treat the same. Returns
    /// the event back if it is not one of them.
    fn handle_event(&mut self, body: EventBody) -> Option<EventBody> {
        match body {
            EventBody::ZwpLinuxDmabufFeedbackV1FormatTable { fd, size } => {
                self.format_table(&fd, size);
            }
            EventBody::ZwpLinuxDmabufFeedbackV1MainDevice { device } => {
                if let Some(dev) = read_device(&device) {
                    self.main_device = Some(dev);
                }
            }
            EventBody::ZwpLinuxDmabufFeedbackV1TrancheTargetDevice { device } => {
                if let Some(dev) = read_device(&device) {
                    self.tranche_target_device = Some(dev);
                }
            }
            EventBody::ZwpLinuxDmabufFeedbackV1TrancheFlags { flags } => {
                self.tranche_flags = flags;
            }
            body => return Some(body),
        }
        None
    }

    fn tranche_done(&mut self) {
        self.tranche_target_device = None;
        self.tranche_flags = 0;
    }

    fn done(&mut self) {
        self.tranche_done();
        self.error = None;
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tranche {
    pub target_device: Option<DeviceId>,
    pub flags: u32,
    pub formats: Vec<TableEntry>,
}

/// The formats the compositor accepts from any client.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DefaultFormats {
    pub formats: FormatList,
    /// `None` if the compositor did not say which device it uses.
    pub main_device: Option<DeviceId>,
}

/// Collects the tranches of the default feedback object.
#[derive(Default)]
pub struct DefaultFeedback {
    pub common: FeedbackCommon,
    tranche_formats: Vec<TableEntry>,
    pub tranches: Vec<Tranche>,
    pub done: bool,
}

impl DefaultFeedback {
    pub fn handle_event(&mut self, body: EventBody) {
        let Some(body) = self.common.handle_event(body) else {
            return;
        };
        match body {
            EventBody::ZwpLinuxDmabufFeedbackV1Done => self.done = true,
            EventBody::ZwpLinuxDmabufFeedbackV1TrancheFormats { indices } => {
                self.tranche_formats(&indices)
            }
            EventBody::ZwpLinuxDmabufFeedbackV1TrancheDone => self.tranche_done(),
            _ => {}
        }
    }

    fn tranche_formats(&mut self, indices: &[u16]) {
        if self.common.error.is_some() || self.common.format_table.is_empty() {
            return;
        }
        self.tranche_formats
            .extend(indices.iter().map(|idx| self.common.entry(*idx)));
    }

    fn tranche_done(&mut self) {
        if self.common.error.is_none() && self.tranche_formats.is_not_empty() {
            self.tranches.push(Tranche {
                target_device: self.common.tranche_target_device,
                flags: self.common.tranche_flags,
                formats: mem::take(&mut self.tranche_formats),
            });
        }
        self.common.tranche_done();
    }

    /// Flattens the tranches that target the main device into a format list.
    ///
    /// The result contains every pair received so far, so a batch that only
    /// repeats known pairs does not change it.
    pub fn finish(&mut self) -> Result<DefaultFormats, FeedbackError> {
        if let Some(e) = self.common.error.take() {
            return Err(e);
        }
        let main_device = self.common.main_device;
        let pairs = self
            .tranches
            .iter()
            .filter(|t| t.target_device == main_device)
            .flat_map(|t| t.formats.iter())
            .filter(|e| e.fourcc != INVALID_ENTRY.fourcc)
            .map(|e| (e.fourcc, e.modifier));
        let formats = FormatList::from_pairs(pairs);
        if formats.is_empty() {
            return Err(FeedbackError::NoFormats);
        }
        Ok(DefaultFormats {
            formats,
            main_device,
        })
    }
}

/// Collects the `modifier` events of a version 3 dma-buf global as a single
/// tranche for an unknown device.
#[derive(Default)]
pub struct LegacyFormats {
    feedback: DefaultFeedback,
}

impl LegacyFormats {
    pub fn handle_event(&mut self, body: EventBody) {
        if let EventBody::ZwpLinuxDmabufV1Modifier {
            format,
            modifier_hi,
            modifier_lo,
        } = body
        {
            let modifier = (modifier_hi as u64) << 32 | modifier_lo as u64;
            if modifier != INVALID_MODIFIER {
                self.feedback.tranche_formats.push(TableEntry {
                    fourcc: format,
                    modifier,
                });
            }
        }
    }

    pub fn finish(mut self) -> Result<DefaultFormats, FeedbackError> {
        self.feedback.tranche_done();
        self.feedback.finish()
    }
}

/// How the formats of the compositor are discovered. Chosen once from the
/// version of the dma-buf global.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FeedbackStrategy {
    /// `format` and `modifier` events sent when the global is bound.
    Legacy,
    /// Feedback objects with tranches, also available per surface.
    Tranches,
}

impl FeedbackStrategy {
    pub fn for_version(version: u32) -> Result<Self, FeedbackError> {
        if version >= zwp_linux_dmabuf_v1::GET_DEFAULT_FEEDBACK_SINCE {
            Ok(Self::Tranches)
        } else if version >= zwp_linux_dmabuf_v1::MIN_VERSION {
            Ok(Self::Legacy)
        } else {
            Err(FeedbackError::UnsupportedVersion)
        }
    }

    pub fn supports_surface_feedback(self) -> bool {
        self == Self::Tranches
    }

    /// Fetches the default formats.
    ///
    /// `bound` are the events received in the first round trip after the
    /// global was bound.
    pub fn fetch_default(
        self,
        queue: &UsrQueue,
        dmabuf: ZwpLinuxDmabufV1Id,
        bound: Vec<Event>,
    ) -> Result<DefaultFormats, FeedbackError> {
        match self {
            FeedbackStrategy::Legacy => {
                let mut legacy = LegacyFormats::default();
                for event in bound {
                    if event.object == dmabuf.into() {
                        legacy.handle_event(event.body);
                    }
                }
                legacy.finish()
            }
            FeedbackStrategy::Tranches => {
                let id: ZwpLinuxDmabufFeedbackV1Id = queue.new_id();
                queue.request(Request::ZwpLinuxDmabufV1GetDefaultFeedback {
                    self_id: dmabuf,
                    id,
                })?;
                let mut feedback = DefaultFeedback::default();
                let res = (|| {
                    while !feedback.done {
                        for event in queue.roundtrip()? {
                            if event.object == id.into() {
                                feedback.handle_event(event.body);
                            }
                        }
                    }
                    Ok::<_, UsrConError>(())
                })();
                let destroyed = queue.request(Request::ZwpLinuxDmabufFeedbackV1Destroy {
                    self_id: id,
                });
                res?;
                destroyed?;
                feedback.finish()
            }
        }
    }
}

/// The result of a completed batch of per-surface feedback.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SurfaceModifiers {
    /// Driver modifiers of the render format that the compositor prefers
    /// for this surface.
    pub modifiers: Vec<Modifier>,
    /// Whether the chosen tranche accepts linear buffers.
    pub linear: bool,
}

/// Tracks the per-surface feedback of one surface.
pub struct SurfaceFeedback {
    pub id: ZwpLinuxDmabufFeedbackV1Id,
    pub common: FeedbackCommon,
    present_fourcc: u32,
    driver_modifiers: Vec<Modifier>,
    render_devices: SmallVec<[DeviceId; 2]>,
    supported: Vec<bool>,
    tranche_supported: Vec<bool>,
    linear: bool,
    tranche_linear: bool,
}

impl SurfaceFeedback {
    pub fn new(
        id: ZwpLinuxDmabufFeedbackV1Id,
        present_fourcc: u32,
        driver_modifiers: &[Modifier],
        render_devices: &[DeviceId],
    ) -> Self {
        Self {
            id,
            common: Default::default(),
            present_fourcc,
            driver_modifiers: driver_modifiers.to_vec(),
            render_devices: render_devices.iter().copied().collect(),
            supported: vec![false; driver_modifiers.len()],
            tranche_supported: vec![false; driver_modifiers.len()],
            linear: false,
            tranche_linear: false,
        }
    }

    /// Once a tranche has been chosen, later tranches of the batch have
    /// lower priority and are ignored.
    fn has_modifiers(&self) -> bool {
        self.linear || self.supported.iter().any(|s| *s)
    }

    /// Returns the new modifiers when a batch of feedback completes.
    pub fn handle_event(&mut self, body: EventBody) -> Option<SurfaceModifiers> {
        let body = self.common.handle_event(body)?;
        match body {
            EventBody::ZwpLinuxDmabufFeedbackV1TrancheFormats { indices } => {
                self.tranche_formats(&indices);
                None
            }
            EventBody::ZwpLinuxDmabufFeedbackV1TrancheDone => {
                self.tranche_done();
                None
            }
            EventBody::ZwpLinuxDmabufFeedbackV1Done => Some(self.done()),
            _ => None,
        }
    }

    fn tranche_formats(&mut self, indices: &[u16]) {
        if self.common.error.is_some()
            || self.common.format_table.is_empty()
            || self.has_modifiers()
        {
            return;
        }
        for idx in indices {
            let entry = self.common.entry(*idx);
            if entry.fourcc != self.present_fourcc {
                continue;
            }
            if entry.modifier == LINEAR_MODIFIER {
                self.tranche_linear = true;
            } else if let Some(pos) = self
                .driver_modifiers
                .iter()
                .position(|m| *m == entry.modifier)
            {
                self.tranche_supported[pos] = true;
            }
        }
    }

    fn tranche_done(&mut self) {
        let target = self.common.tranche_target_device;
        let use_tranche = self.common.error.is_none()
            && !self.has_modifiers()
            && self.render_devices.iter().any(|d| Some(*d) != target);
        if use_tranche {
            self.supported.copy_from_slice(&self.tranche_supported);
            self.linear = self.tranche_linear;
        }
        self.tranche_supported.fill(false);
        self.tranche_linear = false;
        self.common.tranche_done();
    }

    fn done(&mut self) -> SurfaceModifiers {
        let modifiers = self
            .driver_modifiers
            .iter()
            .zip(self.supported.iter())
            .filter(|(_, s)| **s)
            .map(|(m, _)| *m)
            .collect();
        let res = SurfaceModifiers {
            modifiers,
            linear: self.linear,
        };
        self.supported.fill(false);
        self.tranche_supported.fill(false);
        self.linear = false;
        self.tranche_linear = false;
        self.common.done();
        res
    }
}
