use {
    crate::{
        it::test_sync_obj::{TestSyncObjCtx, dummy_fd},
        video::{DeviceId, LINEAR_MODIFIER, Modifier},
        wire::{
            Event, EventBody, ObjectId, Request, WlBufferId, WlCallbackId, WlSurfaceId,
            WpLinuxDrmSyncobjTimelineV1Id, WpPresentationFeedbackId, ZwpLinuxDmabufFeedbackV1Id,
            zwp_linux_dmabuf_v1,
        },
        wl_usr::{QueueId, UsrConError, WlTransport},
    },
    ahash::AHashMap,
    byteorder::{NativeEndian, WriteBytesExt},
    parking_lot::Mutex,
    std::{collections::VecDeque, io::Write, mem, sync::Arc, time::Duration},
    uapi::{OwnedFd, c},
};

pub const REFRESH_NSEC: u32 = 16_666_666;
pub const PRESENTED_SEC: u64 = 1000;

/// How the in-memory compositor is set up. Changes after the display has been
/// created only affect later requests.
#[derive(Clone, Debug)]
pub struct CompositorConfig {
    /// 0 if the global does not exist.
    pub dmabuf_version: u32,
    pub syncobj: bool,
    pub fifo: bool,
    pub commit_timing: bool,
    pub presentation: bool,
    pub surface_version: u32,
    pub main_device: DeviceId,
    pub formats: Vec<(u32, Modifier)>,
    /// The tranches of per-surface feedback. By default a single tranche for
    /// the main device with all formats.
    pub surface_tranches: Option<Vec<(DeviceId, Vec<(u32, Modifier)>)>>,
    /// Release the previously attached buffer when a new one is committed.
    pub release_previous: bool,
    /// Release buffers as soon as they are committed.
    pub release_immediately: bool,
    /// Fails the next request with this name without processing it.
    pub reject_next: Option<&'static str>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            dmabuf_version: zwp_linux_dmabuf_v1::MAX_VERSION,
            syncobj: true,
            fifo: true,
            commit_timing: true,
            presentation: true,
            surface_version: 6,
            main_device: 0,
            formats: vec![],
            surface_tranches: None,
            release_previous: true,
            release_immediately: false,
            reject_next: None,
        }
    }
}

/// A buffer as seen by the compositor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TestBuffer {
    pub width: i32,
    pub height: i32,
    pub format: u32,
    pub modifier: Modifier,
}

type Point = (WpLinuxDrmSyncobjTimelineV1Id, u64);

#[derive(Clone)]
enum Kind {
    Unknown,
    Registry,
    Dmabuf,
    Params {
        modifier: Option<Modifier>,
        planes: usize,
    },
    Feedback,
    SyncobjManager,
    SyncobjSurface(WlSurfaceId),
    Timeline(Arc<OwnedFd>),
    Fifo,
    Timer,
    Presentation,
}

struct Object {
    queue: QueueId,
    version: u32,
    kind: Kind,
}

#[derive(Default)]
struct SurfaceState {
    pending_buffer: Option<WlBufferId>,
    acquire: Option<Point>,
    release: Option<Point>,
    frame_callbacks: Vec<WlCallbackId>,
    presentation_feedbacks: Vec<WpPresentationFeedbackId>,
    current: Option<(WlBufferId, Option<Point>)>,
    committed: Vec<WlBufferId>,
    feedbacks: Vec<ZwpLinuxDmabufFeedbackV1Id>,
    acquire_points: Vec<u64>,
}

#[derive(Default)]
struct State {
    config: CompositorConfig,
    next_queue: u32,
    queues: AHashMap<QueueId, VecDeque<Event>>,
    next_client_id: u32,
    next_server_id: u32,
    objects: AHashMap<ObjectId, Object>,
    surfaces: AHashMap<WlSurfaceId, SurfaceState>,
    buffers: AHashMap<WlBufferId, TestBuffer>,
    timestamps: Vec<u64>,
    log: Vec<&'static str>,
    errors: Vec<String>,
    flushes: usize,
    test_queue: Option<QueueId>,
}

/// A compositor that processes requests as soon as they are sent.
///
/// Reading from an empty queue without a timeout fails with
/// `UsrConError::Closed` since nothing could ever fill it.
pub struct TestCompositor {
    sync_obj: Arc<TestSyncObjCtx>,
    state: Mutex<State>,
}

const GLOBALS: [(&str, u32); 6] = [
    ("wl_compositor", 6),
    (zwp_linux_dmabuf_v1::NAME, 0),
    ("wp_linux_drm_syncobj_manager_v1", 1),
    ("wp_fifo_manager_v1", 1),
    ("wp_commit_timing_manager_v1", 1),
    ("wp_presentation", 1),
];

impl TestCompositor {
    pub fn new(config: CompositorConfig, sync_obj: &Arc<TestSyncObjCtx>) -> Arc<Self> {
        Arc::new(Self {
            sync_obj: sync_obj.clone(),
            state: Mutex::new(State {
                config,
                next_client_id: 2,
                next_server_id: 0xff00_0000,
                ..Default::default()
            }),
        })
    }

    pub fn configure(&self, f: impl FnOnce(&mut CompositorConfig)) {
        f(&mut self.state.lock().config);
    }

    /// Creates a `wl_surface` that the client can use.
    pub fn create_surface(&self) -> WlSurfaceId {
        let state = &mut *self.state.lock();
        let queue = match state.test_queue {
            Some(q) => q,
            None => {
                let q = state.create_queue();
                state.test_queue = Some(q);
                q
            }
        };
        let id = state.new_object(queue);
        if let Some(obj) = state.objects.get_mut(&id) {
            obj.version = state.config.surface_version;
        }
        let id = WlSurfaceId::from(id);
        state.surfaces.insert(id, SurfaceState::default());
        id
    }

    /// Returns and clears the names of the requests received so far.
    pub fn take_log(&self) -> Vec<&'static str> {
        mem::take(&mut self.state.lock().log)
    }

    pub fn take_errors(&self) -> Vec<String> {
        mem::take(&mut self.state.lock().errors)
    }

    pub fn flushes(&self) -> usize {
        self.state.lock().flushes
    }

    /// The buffers that have not been destroyed by the client.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn buffer(&self, buffer: WlBufferId) -> Option<TestBuffer> {
        self.state.lock().buffers.get(&buffer).copied()
    }

    /// The buffers committed to the surface, oldest first.
    pub fn committed(&self, surface: WlSurfaceId) -> Vec<WlBufferId> {
        let state = self.state.lock();
        match state.surfaces.get(&surface) {
            Some(s) => s.committed.clone(),
            None => vec![],
        }
    }

    /// The acquire points of the commits of the surface.
    pub fn acquire_points(&self, surface: WlSurfaceId) -> Vec<u64> {
        let state = self.state.lock();
        match state.surfaces.get(&surface) {
            Some(s) => s.acquire_points.clone(),
            None => vec![],
        }
    }

    /// The commit timer targets, in nanoseconds.
    pub fn timestamps(&self) -> Vec<u64> {
        self.state.lock().timestamps.clone()
    }

    /// Sends `wl_buffer.release`.
    pub fn release(&self, buffer: WlBufferId) {
        self.state.lock().event(buffer, EventBody::WlBufferRelease);
    }

    /// Sends new per-surface feedback to every feedback object of the surface.
    pub fn send_surface_feedback(
        &self,
        surface: WlSurfaceId,
        tranches: Vec<(DeviceId, Vec<(u32, Modifier)>)>,
    ) {
        let state = &mut *self.state.lock();
        let feedbacks = match state.surfaces.get(&surface) {
            Some(s) => s.feedbacks.clone(),
            None => return,
        };
        for feedback in feedbacks {
            state.send_feedback(feedback.into(), &tranches);
        }
    }

    fn release_buffer(&self, state: &mut State, buffer: WlBufferId, release: Option<Point>) {
        if let Some((timeline, point)) = release {
            if let Some(Kind::Timeline(fd)) = state.objects.get(&ObjectId::from(timeline)).map(|o| &o.kind)
                && !self.sync_obj.signal_fd(fd, point)
            {
                state.errors.push(format!("Release point {point} cannot be signaled"));
            }
        }
        state.event(buffer, EventBody::WlBufferRelease);
    }

    fn commit(&self, state: &mut State, surface: WlSurfaceId) {
        let Some(ss) = state.surfaces.get_mut(&surface) else {
            state.errors.push(format!("Commit of unknown surface {surface}"));
            return;
        };
        let frame_callbacks = mem::take(&mut ss.frame_callbacks);
        let presentation_feedbacks = mem::take(&mut ss.presentation_feedbacks);
        let mut to_release = vec![];
        let mut errors = vec![];
        if let Some(buffer) = ss.pending_buffer.take() {
            let acquire = ss.acquire.take();
            let release = ss.release.take();
            if let Some((timeline, point)) = acquire {
                ss.acquire_points.push(point);
                if let Some(Kind::Timeline(fd)) =
                    state.objects.get(&ObjectId::from(timeline)).map(|o| &o.kind)
                    && !self.sync_obj.fd_point_available(fd, point)
                {
                    errors.push(format!("Acquire point {point} has no fence"));
                }
            }
            if let (Some((_, a)), Some((_, r))) = (acquire, release)
                && r <= a
            {
                errors.push(format!("Release point {r} is not after acquire point {a}"));
            }
            ss.committed.push(buffer);
            let previous = ss.current.replace((buffer, release));
            if let Some((prev, prev_release)) = previous
                && prev != buffer
                && state.config.release_previous
            {
                to_release.push((prev, prev_release));
            }
            if state.config.release_immediately {
                to_release.push((buffer, release));
                ss.current = None;
            }
        }
        state.errors.extend(errors);
        for (buffer, release) in to_release {
            self.release_buffer(state, buffer, release);
        }
        for callback in frame_callbacks {
            state.event(callback, EventBody::WlCallbackDone { callback_data: 0 });
        }
        for feedback in presentation_feedbacks {
            state.event(
                feedback,
                EventBody::WpPresentationFeedbackPresented {
                    tv_sec_hi: (PRESENTED_SEC >> 32) as u32,
                    tv_sec_lo: PRESENTED_SEC as u32,
                    tv_nsec: 0,
                    refresh: REFRESH_NSEC,
                    seq_hi: 0,
                    seq_lo: 0,
                    flags: 0,
                },
            );
        }
    }

    fn handle_request(&self, state: &mut State, request: Request) {
        use Request::*;
        state.log.push(request_name(&request));
        match request {
            WlDisplaySync { callback, .. } => {
                state.event(callback, EventBody::WlCallbackDone { callback_data: 0 });
            }
            WlDisplayGetRegistry { registry, .. } => {
                state.set_kind(registry, Kind::Registry, 1);
                for (idx, (interface, version)) in GLOBALS.iter().enumerate() {
                    let version = match *interface {
                        zwp_linux_dmabuf_v1::NAME => state.config.dmabuf_version,
                        "wp_linux_drm_syncobj_manager_v1" if !state.config.syncobj => 0,
                        "wp_fifo_manager_v1" if !state.config.fifo => 0,
                        "wp_commit_timing_manager_v1" if !state.config.commit_timing => 0,
                        "wp_presentation" if !state.config.presentation => 0,
                        _ => *version,
                    };
                    if version == 0 {
                        continue;
                    }
                    state.event(
                        registry,
                        EventBody::WlRegistryGlobal {
                            name: idx as u32 + 1,
                            interface: interface.to_string(),
                            version,
                        },
                    );
                }
            }
            WlRegistryBind {
                interface,
                version,
                id,
                ..
            } => self.bind(state, interface, version, id),
            WlSurfaceAttach {
                self_id, buffer, ..
            } => {
                if !state.buffers.contains_key(&buffer) {
                    state.errors.push(format!("Attach of unknown buffer {buffer}"));
                }
                if let Some(ss) = state.surfaces.get_mut(&self_id) {
                    ss.pending_buffer = Some(buffer);
                }
            }
            WlSurfaceDamage { .. } => {}
            WlSurfaceDamageBuffer { self_id, .. } => {
                let version = state.objects.get(&ObjectId::from(self_id)).map(|o| o.version);
                if version.unwrap_or(0) < 4 {
                    state.errors.push("damage_buffer requires version 4".to_string());
                }
            }
            WlSurfaceFrame { self_id, callback } => {
                if let Some(ss) = state.surfaces.get_mut(&self_id) {
                    ss.frame_callbacks.push(callback);
                }
            }
            WlSurfaceCommit { self_id } => self.commit(state, self_id),
            WlBufferDestroy { self_id } => {
                if state.buffers.remove(&self_id).is_none() {
                    state.errors.push(format!("Destroy of unknown buffer {self_id}"));
                }
            }
            ZwpLinuxDmabufV1CreateParams { params_id, .. } => {
                let kind = Kind::Params {
                    modifier: None,
                    planes: 0,
                };
                state.set_kind(params_id, kind, 0);
            }
            ZwpLinuxDmabufV1GetDefaultFeedback { id, .. } => {
                state.set_kind(id, Kind::Feedback, 0);
                let tranches = vec![(state.config.main_device, state.config.formats.clone())];
                state.send_feedback(id.into(), &tranches);
            }
            ZwpLinuxDmabufV1GetSurfaceFeedback { id, surface, .. } => {
                state.set_kind(id, Kind::Feedback, 0);
                if let Some(ss) = state.surfaces.get_mut(&surface) {
                    ss.feedbacks.push(id);
                }
                let tranches = match &state.config.surface_tranches {
                    Some(t) => t.clone(),
                    None => vec![(state.config.main_device, state.config.formats.clone())],
                };
                state.send_feedback(id.into(), &tranches);
            }
            ZwpLinuxBufferParamsV1Add {
                self_id,
                modifier_hi,
                modifier_lo,
                ..
            } => {
                if let Some(Object {
                    kind: Kind::Params { modifier, planes },
                    ..
                }) = state.objects.get_mut(&ObjectId::from(self_id))
                {
                    *modifier = Some((modifier_hi as u64) << 32 | modifier_lo as u64);
                    *planes += 1;
                }
            }
            ZwpLinuxBufferParamsV1Create {
                self_id,
                width,
                height,
                format,
                ..
            } => {
                let params = ObjectId::from(self_id);
                let (modifier, planes, queue) = match state.objects.get(&params) {
                    Some(Object {
                        kind: Kind::Params { modifier, planes },
                        queue,
                        ..
                    }) => (*modifier, *planes, *queue),
                    _ => {
                        state.errors.push(format!("Create on unknown params {self_id}"));
                        return;
                    }
                };
                let modifier = modifier.unwrap_or(LINEAR_MODIFIER);
                let supported = state.config.formats.contains(&(format, modifier));
                if planes == 0 || !supported {
                    state.event(self_id, EventBody::ZwpLinuxBufferParamsV1Failed);
                    return;
                }
                let buffer = WlBufferId::from(ObjectId::from_raw(state.next_server_id));
                state.next_server_id += 1;
                state.objects.insert(
                    buffer.into(),
                    Object {
                        queue,
                        version: 1,
                        kind: Kind::Unknown,
                    },
                );
                state.buffers.insert(
                    buffer,
                    TestBuffer {
                        width,
                        height,
                        format,
                        modifier,
                    },
                );
                state.event(self_id, EventBody::ZwpLinuxBufferParamsV1Created { buffer });
            }
            ZwpLinuxBufferParamsV1Destroy { .. } | ZwpLinuxDmabufFeedbackV1Destroy { .. } => {}
            WpLinuxDrmSyncobjManagerV1GetSurface { id, surface, .. } => {
                state.set_kind(id, Kind::SyncobjSurface(surface), 1);
            }
            WpLinuxDrmSyncobjManagerV1ImportTimeline { id, fd, .. } => {
                state.set_kind(id, Kind::Timeline(fd), 1);
            }
            WpLinuxDrmSyncobjTimelineV1Destroy { .. } => {}
            WpLinuxDrmSyncobjSurfaceV1SetAcquirePoint {
                self_id,
                timeline,
                point_hi,
                point_lo,
            } => {
                let point = (point_hi as u64) << 32 | point_lo as u64;
                if let Some(ss) = state.syncobj_surface(self_id.into()) {
                    ss.acquire = Some((timeline, point));
                }
            }
            WpLinuxDrmSyncobjSurfaceV1SetReleasePoint {
                self_id,
                timeline,
                point_hi,
                point_lo,
            } => {
                let point = (point_hi as u64) << 32 | point_lo as u64;
                if let Some(ss) = state.syncobj_surface(self_id.into()) {
                    ss.release = Some((timeline, point));
                }
            }
            WpLinuxDrmSyncobjSurfaceV1Destroy { .. } => {}
            WpFifoManagerV1GetFifo { id, .. } => {
                state.set_kind(id, Kind::Fifo, 1);
            }
            WpFifoV1SetBarrier { .. } | WpFifoV1WaitBarrier { .. } | WpFifoV1Destroy { .. } => {}
            WpCommitTimingManagerV1GetTimer { id, .. } => {
                state.set_kind(id, Kind::Timer, 1);
            }
            WpCommitTimerV1SetTimestamp {
                tv_sec_hi,
                tv_sec_lo,
                tv_nsec,
                ..
            } => {
                let sec = (tv_sec_hi as u64) << 32 | tv_sec_lo as u64;
                state.timestamps.push(sec * 1_000_000_000 + tv_nsec as u64);
            }
            WpCommitTimerV1Destroy { .. } => {}
            WpPresentationFeedback {
                surface, callback, ..
            } => {
                if let Some(ss) = state.surfaces.get_mut(&surface) {
                    ss.presentation_feedbacks.push(callback);
                }
            }
        }
    }

    fn bind(&self, state: &mut State, interface: &str, version: u32, id: ObjectId) {
        let kind = match interface {
            zwp_linux_dmabuf_v1::NAME => Kind::Dmabuf,
            "wp_linux_drm_syncobj_manager_v1" => Kind::SyncobjManager,
            "wp_presentation" => Kind::Presentation,
            _ => Kind::Unknown,
        };
        state.set_kind(id, kind.clone(), version);
        match kind {
            Kind::Dmabuf if version < zwp_linux_dmabuf_v1::GET_DEFAULT_FEEDBACK_SINCE => {
                let formats = state.config.formats.clone();
                for (format, modifier) in formats {
                    state.event(id, EventBody::ZwpLinuxDmabufV1Format { format });
                    state.event(
                        id,
                        EventBody::ZwpLinuxDmabufV1Modifier {
                            format,
                            modifier_hi: (modifier >> 32) as u32,
                            modifier_lo: modifier as u32,
                        },
                    );
                }
            }
            Kind::Presentation => {
                let clk_id = c::CLOCK_MONOTONIC as u32;
                state.event(id, EventBody::WpPresentationClockId { clk_id });
            }
            _ => {}
        }
    }
}

impl State {
    fn create_queue(&mut self) -> QueueId {
        self.next_queue += 1;
        let id = QueueId(self.next_queue);
        self.queues.insert(id, VecDeque::new());
        id
    }

    fn new_object(&mut self, queue: QueueId) -> ObjectId {
        let id = ObjectId::from_raw(self.next_client_id);
        self.next_client_id += 1;
        self.objects.insert(
            id,
            Object {
                queue,
                version: 0,
                kind: Kind::Unknown,
            },
        );
        id
    }

    fn set_kind(&mut self, id: impl Into<ObjectId>, kind: Kind, version: u32) {
        let id = id.into();
        match self.objects.get_mut(&id) {
            Some(obj) => {
                obj.kind = kind;
                obj.version = version;
            }
            None => self.errors.push(format!("Unknown new object {id}")),
        }
    }

    fn syncobj_surface(&mut self, id: ObjectId) -> Option<&mut SurfaceState> {
        let surface = match self.objects.get(&id)?.kind {
            Kind::SyncobjSurface(s) => s,
            _ => return None,
        };
        self.surfaces.get_mut(&surface)
    }

    fn event(&mut self, object: impl Into<ObjectId>, body: EventBody) {
        let object = object.into();
        let Some(obj) = self.objects.get(&object) else {
            return;
        };
        if let Some(queue) = self.queues.get_mut(&obj.queue) {
            queue.push_back(Event { object, body });
        }
    }

    fn send_feedback(&mut self, id: ObjectId, tranches: &[(DeviceId, Vec<(u32, Modifier)>)]) {
        let mut table = vec![];
        for (_, formats) in tranches {
            for format in formats {
                if !table.contains(format) {
                    table.push(*format);
                }
            }
        }
        let mut data = vec![];
        for (format, modifier) in &table {
            let _ = data.write_u32::<NativeEndian>(*format);
            let _ = data.write_u32::<NativeEndian>(0);
            let _ = data.write_u64::<NativeEndian>(*modifier);
        }
        let mut fd = dummy_fd("format_table");
        if let Err(e) = fd.write_all(&data) {
            self.errors.push(format!("Could not write the format table: {e}"));
        }
        self.event(
            id,
            EventBody::ZwpLinuxDmabufFeedbackV1FormatTable {
                fd: Arc::new(fd),
                size: data.len() as u32,
            },
        );
        let main_device = self.config.main_device.to_ne_bytes().to_vec();
        self.event(
            id,
            EventBody::ZwpLinuxDmabufFeedbackV1MainDevice {
                device: main_device,
            },
        );
        for (device, formats) in tranches {
            let indices = formats
                .iter()
                .filter_map(|f| table.iter().position(|t| t == f))
                .map(|idx| idx as u16)
                .collect();
            self.event(
                id,
                EventBody::ZwpLinuxDmabufFeedbackV1TrancheTargetDevice {
                    device: device.to_ne_bytes().to_vec(),
                },
            );
            self.event(
                id,
                EventBody::ZwpLinuxDmabufFeedbackV1TrancheFormats { indices },
            );
            self.event(id, EventBody::ZwpLinuxDmabufFeedbackV1TrancheDone);
        }
        self.event(id, EventBody::ZwpLinuxDmabufFeedbackV1Done);
    }
}

impl WlTransport for TestCompositor {
    fn create_queue(&self, _name: &str) -> Result<QueueId, UsrConError> {
        Ok(self.state.lock().create_queue())
    }

    fn destroy_queue(&self, queue: QueueId) {
        self.state.lock().queues.remove(&queue);
    }

    fn new_object(&self, queue: QueueId) -> ObjectId {
        self.state.lock().new_object(queue)
    }

    fn forget(&self, id: ObjectId) {
        self.state.lock().objects.remove(&id);
    }

    fn version(&self, id: ObjectId) -> u32 {
        self.state
            .lock()
            .objects
            .get(&id)
            .map(|o| o.version)
            .unwrap_or(0)
    }

    fn send(&self, request: Request) -> Result<(), UsrConError> {
        let state = &mut *self.state.lock();
        let target = request.target();
        if !state.objects.contains_key(&target) && target != ObjectId::from_raw(1) {
            state.errors.push(format!("Request to unknown object {target}"));
            return Err(UsrConError::Protocol {
                object: target,
                message: "unknown object".to_string(),
            });
        }
        if state.config.reject_next == Some(request_name(&request)) {
            state.config.reject_next = None;
            return Err(UsrConError::Protocol {
                object: target,
                message: "rejected".to_string(),
            });
        }
        self.handle_request(state, request);
        Ok(())
    }

    fn flush(&self) -> Result<(), UsrConError> {
        self.state.lock().flushes += 1;
        Ok(())
    }

    fn read_events(
        &self,
        queue: QueueId,
        timeout: Option<Duration>,
    ) -> Result<Vec<Event>, UsrConError> {
        let state = &mut *self.state.lock();
        let Some(events) = state.queues.get_mut(&queue) else {
            return Err(UsrConError::Closed);
        };
        let events: Vec<_> = events.drain(..).collect();
        let events: Vec<_> = events
            .into_iter()
            .filter(|e| state.objects.contains_key(&e.object))
            .collect();
        if events.is_empty() && timeout.is_none() {
            return Err(UsrConError::Closed);
        }
        Ok(events)
    }
}

fn request_name(request: &Request) -> &'static str {
    use Request::*;
    match request {
        WlDisplaySync { .. } => "wl_display.sync",
        WlDisplayGetRegistry { .. } => "wl_display.get_registry",
        WlRegistryBind { .. } => "wl_registry.bind",
        WlSurfaceAttach { .. } => "wl_surface.attach",
        WlSurfaceDamage { .. } => "wl_surface.damage",
        WlSurfaceDamageBuffer { .. } => "wl_surface.damage_buffer",
        WlSurfaceFrame { .. } => "wl_surface.frame",
        WlSurfaceCommit { .. } => "wl_surface.commit",
        WlBufferDestroy { .. } => "wl_buffer.destroy",
        ZwpLinuxDmabufV1CreateParams { .. } => "zwp_linux_dmabuf_v1.create_params",
        ZwpLinuxDmabufV1GetDefaultFeedback { .. } => "zwp_linux_dmabuf_v1.get_default_feedback",
        ZwpLinuxDmabufV1GetSurfaceFeedback { .. } => "zwp_linux_dmabuf_v1.get_surface_feedback",
        ZwpLinuxBufferParamsV1Add { .. } => "zwp_linux_buffer_params_v1.add",
        ZwpLinuxBufferParamsV1Create { .. } => "zwp_linux_buffer_params_v1.create",
        ZwpLinuxBufferParamsV1Destroy { .. } => "zwp_linux_buffer_params_v1.destroy",
        ZwpLinuxDmabufFeedbackV1Destroy { .. } => "zwp_linux_dmabuf_feedback_v1.destroy",
        WpLinuxDrmSyncobjManagerV1GetSurface { .. } => "wp_linux_drm_syncobj_manager_v1.get_surface",
        WpLinuxDrmSyncobjManagerV1ImportTimeline { .. } => {
            "wp_linux_drm_syncobj_manager_v1.import_timeline"
        }
        WpLinuxDrmSyncobjTimelineV1Destroy { .. } => "wp_linux_drm_syncobj_timeline_v1.destroy",
        WpLinuxDrmSyncobjSurfaceV1SetAcquirePoint { .. } => {
            "wp_linux_drm_syncobj_surface_v1.set_acquire_point"
        }
        WpLinuxDrmSyncobjSurfaceV1SetReleasePoint { .. } => {
            "wp_linux_drm_syncobj_surface_v1.set_release_point"
        }
        WpLinuxDrmSyncobjSurfaceV1Destroy { .. } => "wp_linux_drm_syncobj_surface_v1.destroy",
        WpFifoManagerV1GetFifo { .. } => "wp_fifo_manager_v1.get_fifo",
        WpFifoV1SetBarrier { .. } => "wp_fifo_v1.set_barrier",
        WpFifoV1WaitBarrier { .. } => "wp_fifo_v1.wait_barrier",
        WpFifoV1Destroy { .. } => "wp_fifo_v1.destroy",
        WpCommitTimingManagerV1GetTimer { .. } => "wp_commit_timing_manager_v1.get_timer",
        WpCommitTimerV1SetTimestamp { .. } => "wp_commit_timer_v1.set_timestamp",
        WpCommitTimerV1Destroy { .. } => "wp_commit_timer_v1.destroy",
        WpPresentationFeedback { .. } => "wp_presentation.feedback",
    }
}
