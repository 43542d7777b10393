use {
    crate::{
        allocator::AllocatorError,
        display::Display,
        error::ErrorKind,
        feedback::{SurfaceFeedback, SurfaceModifiers},
        format::{Format, find_opaque},
        gfx_api::{DriverSurface, GfxError, SurfaceUpdateHandler},
        swapchain::{PresentBuffer, Swapchain, SwapchainError, needs_realloc},
        timeline::TimelineError,
        utils::errorfmt::ErrorFmt,
        video::{Modifier, dmabuf::DMA_BUF_SYNC_WRITE},
        wire::{
            Event, EventBody, ObjectId, Request, WlCallbackId, WlSurfaceId, WpCommitTimerV1Id,
            WpFifoV1Id, WpLinuxDrmSyncobjSurfaceV1Id, WpPresentationFeedbackId,
            WpPresentationId, wl_surface, zwp_linux_dmabuf_v1,
        },
        wl_usr::{UsrConError, UsrQueue},
    },
    isnt::std_1::{primitive::IsntSliceExt, vec::IsntVecExt},
    parking_lot::Mutex,
    std::sync::{Arc, Weak},
    thiserror::Error,
    uapi::c,
};

/// Commits are scheduled this long before the expected presentation time.
pub const FRAME_TIMESTAMP_PADDING: u64 = 500_000;

/// The refresh interval assumed until the compositor reports one.
pub const DEFAULT_REFRESH_NSEC: u64 = 1_000_000_000 / 60;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("The surface has been destroyed")]
    Destroyed,
    #[error("The native window has been destroyed")]
    WindowDestroyed,
    #[error("There already is a surface for wl_surface {0}")]
    AlreadyExists(WlSurfaceId),
    #[error("Format {0:#x} cannot be used for windows")]
    UnsupportedFormat(u32),
    #[error("Format {0} has no opaque counterpart")]
    NoOpaqueFormat(&'static str),
    #[error("The compositor supports no modifiers for format {0}")]
    NoModifiers(&'static str),
    #[error("Could not create an event queue")]
    CreateQueue(#[source] UsrConError),
    #[error(transparent)]
    UsrConError(#[from] UsrConError),
    #[error(transparent)]
    Swapchain(#[from] SwapchainError),
    #[error("Could not copy the render buffer into a present buffer")]
    Copy(#[source] AllocatorError),
    #[error("Could not wait for the driver to finish rendering")]
    Finish(#[source] GfxError),
    #[error("Could not create a fence for the rendering")]
    CreateFence(#[source] GfxError),
    #[error("Could not attach the rendering fence to the timeline")]
    AttachFence(#[source] TimelineError),
    #[error("Could not create the driver surface")]
    CreateDriverSurface(#[source] GfxError),
    #[error("The swapchain has no back buffer")]
    NoBackBuffer,
}

impl SurfaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SurfaceError::Destroyed
            | SurfaceError::WindowDestroyed
            | SurfaceError::AlreadyExists(_)
            | SurfaceError::UnsupportedFormat(_) => ErrorKind::BadParameter,
            SurfaceError::NoModifiers(_) => ErrorKind::NotSupported,
            SurfaceError::CreateQueue(_) | SurfaceError::UsrConError(_) => ErrorKind::Protocol,
            SurfaceError::Swapchain(e) => e.kind(),
            SurfaceError::Copy(_) | SurfaceError::AttachFence(_) => ErrorKind::OutOfMemory,
            SurfaceError::NoOpaqueFormat(_)
            | SurfaceError::Finish(_)
            | SurfaceError::CreateFence(_)
            | SurfaceError::CreateDriverSurface(_)
            | SurfaceError::NoBackBuffer => ErrorKind::Driver,
        }
    }
}

/// A damaged rectangle in buffer coordinates.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Damage {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Receives the changes of a native window.
pub trait WindowListener: Send + Sync {
    fn resized(&self, width: i32, height: i32);

    fn destroyed(&self);
}

#[derive(Default)]
struct WindowState {
    width: i32,
    height: i32,
    attached_width: i32,
    attached_height: i32,
    listener: Option<Weak<dyn WindowListener>>,
}

/// The application's handle of a window, wrapping the `wl_surface`.
///
/// The application may resize and destroy it from any thread.
pub struct NativeWindow {
    pub surface: WlSurfaceId,
    state: Mutex<WindowState>,
}

impl NativeWindow {
    pub fn new(surface: WlSurfaceId, width: i32, height: i32) -> Arc<Self> {
        Arc::new(Self {
            surface,
            state: Mutex::new(WindowState {
                width,
                height,
                ..Default::default()
            }),
        })
    }

    pub fn resize(&self, width: i32, height: i32) {
        let listener = {
            let mut state = self.state.lock();
            state.width = width;
            state.height = height;
            state.listener.as_ref().and_then(|l| l.upgrade())
        };
        if let Some(listener) = listener {
            listener.resized(width, height);
        }
    }

    pub fn size(&self) -> (i32, i32) {
        let state = self.state.lock();
        (state.width, state.height)
    }

    /// The size of the buffer that was last committed.
    pub fn attached_size(&self) -> (i32, i32) {
        let state = self.state.lock();
        (state.attached_width, state.attached_height)
    }

    pub fn destroy(&self) {
        let listener = self.state.lock().listener.take();
        if let Some(listener) = listener.and_then(|l| l.upgrade()) {
            listener.destroyed();
        }
    }

    fn set_listener(&self, listener: Option<Weak<dyn WindowListener>>) {
        self.state.lock().listener = listener;
    }

    fn set_attached_size(&self, width: i32, height: i32) {
        let mut state = self.state.lock();
        state.attached_width = width;
        state.attached_height = height;
    }
}

/// The state that can be changed from any thread.
///
/// The lock must never be held while calling into the driver.
struct Params {
    pending_width: i32,
    pending_height: i32,
    swap_interval: i32,
    window: Option<Arc<NativeWindow>>,
    /// While non-zero, update requests from the driver are ignored.
    skip_update: u32,
}

/// The state that is only used by the thread that renders to the surface.
struct Current {
    display: Arc<Display>,
    surface: WlSurfaceId,
    render_format: &'static Format,
    present_format: &'static Format,
    driver_surface: Option<Arc<dyn DriverSurface>>,
    swapchain: Option<Swapchain>,
    feedback: Option<SurfaceFeedback>,
    /// Empty if the compositor only accepts linear buffers.
    surface_modifiers: Vec<Modifier>,
    modifiers_changed: bool,
    force_realloc: bool,
    syncobj: Option<WpLinuxDrmSyncobjSurfaceV1Id>,
    fifo: Option<WpFifoV1Id>,
    commit_timer: Option<WpCommitTimerV1Id>,
    presentation: Option<WpPresentationId>,
    frame_callback: Option<WlCallbackId>,
    last_swap_sync: Option<WlCallbackId>,
    presentation_feedback: Option<WpPresentationFeedbackId>,
    last_present_timestamp: u64,
    last_present_refresh: u64,
    attached_width: i32,
    attached_height: i32,
    queue: UsrQueue,
}

/// A window surface that the driver renders to and that presents to the
/// compositor.
pub struct Surface {
    display: Arc<Display>,
    pub surface: WlSurfaceId,
    pub render_format: &'static Format,
    pub present_format: &'static Format,
    params: Mutex<Params>,
    current: Mutex<Option<Current>>,
}

struct UpdateHandler {
    surface: Weak<Surface>,
}

impl SurfaceUpdateHandler for UpdateHandler {
    fn update(&self) {
        if let Some(surface) = self.surface.upgrade() {
            surface.driver_update();
        }
    }
}

impl WindowListener for Surface {
    fn resized(&self, width: i32, height: i32) {
        self.resize(width, height);
    }

    fn destroyed(&self) {
        self.params.lock().window = None;
    }
}

impl Surface {
    /// Creates a surface for a window.
    ///
    /// With `present_opaque`, buffers are shared with the compositor using
    /// the variant of the format without alpha.
    pub fn create(
        display: &Arc<Display>,
        window: &Arc<NativeWindow>,
        fourcc: u32,
        present_opaque: bool,
    ) -> Result<Arc<Self>, SurfaceError> {
        if !display.surfaces.lock().insert(window.surface) {
            return Err(SurfaceError::AlreadyExists(window.surface));
        }
        let res = Self::create_current(display, window, fourcc, present_opaque);
        let current = match res {
            Ok(c) => c,
            Err(e) => {
                display.surfaces.lock().remove(&window.surface);
                return Err(e);
            }
        };
        let (width, height) = window.size();
        let slf = Arc::new(Self {
            display: display.clone(),
            surface: window.surface,
            render_format: current.render_format,
            present_format: current.present_format,
            params: Mutex::new(Params {
                pending_width: width.max(1),
                pending_height: height.max(1),
                swap_interval: 1,
                window: Some(window.clone()),
                skip_update: 0,
            }),
            current: Mutex::new(Some(current)),
        });
        let render_buffer = {
            let current = slf.current.lock();
            current
                .as_ref()
                .and_then(|c| c.swapchain.as_ref())
                .map(|s| s.render_buffer.clone())
        };
        let Some(render_buffer) = render_buffer else {
            slf.destroy();
            return Err(SurfaceError::NoBackBuffer);
        };
        let handler = Arc::new(UpdateHandler {
            surface: Arc::downgrade(&slf),
        });
        let driver_surface =
            display
                .driver
                .create_surface(slf.render_format, &render_buffer, handler);
        let driver_surface = match driver_surface {
            Ok(s) => s,
            Err(e) => {
                slf.destroy();
                return Err(SurfaceError::CreateDriverSurface(e));
            }
        };
        if let Some(current) = &mut *slf.current.lock() {
            current.driver_surface = Some(driver_surface);
        }
        let listener = Arc::downgrade(&slf) as Weak<dyn WindowListener>;
        window.set_listener(Some(listener));
        Ok(slf)
    }

    fn create_current(
        display: &Arc<Display>,
        window: &Arc<NativeWindow>,
        fourcc: u32,
        present_opaque: bool,
    ) -> Result<Current, SurfaceError> {
        let render_format = match display.window_format(fourcc) {
            Some(f) if f.supported => f.format,
            _ => return Err(SurfaceError::UnsupportedFormat(fourcc)),
        };
        let mut present_format = render_format;
        if present_opaque {
            present_format = find_opaque(render_format)
                .ok_or(SurfaceError::NoOpaqueFormat(render_format.name))?;
        }
        let surface = window.surface;
        let queue = UsrQueue::new(&display.con, &format!("surface({surface})"))
            .map_err(SurfaceError::CreateQueue)?;
        let mut current = Current {
            display: display.clone(),
            surface,
            render_format,
            present_format,
            driver_surface: None,
            swapchain: None,
            feedback: None,
            surface_modifiers: vec![],
            modifiers_changed: false,
            force_realloc: false,
            syncobj: None,
            fifo: None,
            commit_timer: None,
            presentation: None,
            frame_callback: None,
            last_swap_sync: None,
            presentation_feedback: None,
            last_present_timestamp: 0,
            last_present_refresh: DEFAULT_REFRESH_NSEC,
            attached_width: 0,
            attached_height: 0,
            queue,
        };
        let globals = &display.globals;
        if let Some(es) = &display.explicit_sync {
            let id = current.queue.new_id();
            current
                .queue
                .request(Request::WpLinuxDrmSyncobjManagerV1GetSurface {
                    self_id: es.manager,
                    id,
                    surface,
                })?;
            current.syncobj = Some(id);
        }
        if let (Some(fifo_manager), Some(presentation)) = (globals.fifo, globals.presentation) {
            current.presentation = Some(presentation);
            let id = current.queue.new_id();
            current.queue.request(Request::WpFifoManagerV1GetFifo {
                self_id: fifo_manager,
                id,
                surface,
            })?;
            current.fifo = Some(id);
            if let Some(commit_timing) = globals.commit_timing {
                let id = current.queue.new_id();
                current
                    .queue
                    .request(Request::WpCommitTimingManagerV1GetTimer {
                        self_id: commit_timing,
                        id,
                        surface,
                    })?;
                current.commit_timer = Some(id);
            }
        }
        let defaults = display.default_modifiers(render_format.drm, present_format.drm);
        if defaults.modifiers.is_empty() && !defaults.linear {
            return Err(SurfaceError::NoModifiers(present_format.name));
        }
        current.surface_modifiers = defaults.modifiers;
        let surface_feedback = !display.force_prime
            && display.feedback_strategy.supports_surface_feedback()
            && display.dmabuf_version >= zwp_linux_dmabuf_v1::GET_SURFACE_FEEDBACK_SINCE;
        if surface_feedback {
            let id = current.queue.new_id();
            current
                .queue
                .request(Request::ZwpLinuxDmabufV1GetSurfaceFeedback {
                    self_id: globals.dmabuf,
                    id,
                    surface,
                })?;
            current.feedback = Some(SurfaceFeedback::new(
                id,
                present_format.drm,
                display.driver_modifiers(render_format.drm),
                display.driver.device_ids(),
            ));
            for event in current.queue.roundtrip()? {
                current.handle_event(event);
            }
        }
        let (width, height) = window.size();
        let swapchain = current.realloc(width.max(1), height.max(1), false)?;
        current.swapchain = swapchain;
        current.modifiers_changed = false;
        Ok(current)
    }

    fn pending_size(&self) -> (i32, i32) {
        let params = self.params.lock();
        (params.pending_width, params.pending_height)
    }

    /// Presents the contents of the back buffer.
    pub fn swap_buffers(&self, damage: &[Damage]) -> Result<(), SurfaceError> {
        let swap_interval = {
            let mut params = self.params.lock();
            if params.window.is_none() {
                return Err(SurfaceError::WindowDestroyed);
            }
            params.skip_update += 1;
            params.swap_interval
        };
        let res = match &mut *self.current.lock() {
            Some(current) => self.swap(current, swap_interval, damage),
            None => Err(SurfaceError::Destroyed),
        };
        self.params.lock().skip_update -= 1;
        res
    }

    fn swap(
        &self,
        cur: &mut Current,
        swap_interval: i32,
        damage: &[Damage],
    ) -> Result<(), SurfaceError> {
        for event in cur.queue.dispatch_pending()? {
            cur.handle_event(event);
        }
        let (width, height) = self.pending_size();
        let new_swapchain = cur.realloc(width, height, true)?;
        let present_idx = cur.present_buffer()?;
        let Some(swapchain) = &mut cur.swapchain else {
            return Err(SurfaceError::NoBackBuffer);
        };
        self.sync_rendering(swapchain.buffer_mut(present_idx))?;
        let presented = swapchain.buffers()[present_idx].wl_buffer;
        if swap_interval > 0 {
            cur.wait_previous_frames()?;
        } else {
            if cur.presentation_feedback.is_some() {
                cur.discard_presentation_feedback();
            }
            if let Some(cb) = cur.frame_callback.take() {
                cur.queue.forget(cb);
            }
            if let Some(cb) = cur.last_swap_sync.take() {
                cur.queue.forget(cb);
            }
        }
        cur.commit(present_idx, swap_interval, damage)?;
        if let Some(window) = &self.params.lock().window {
            window.set_attached_size(cur.attached_width, cur.attached_height);
        }
        cur.last_swap_sync = Some(cur.queue.sync()?);
        cur.queue.flush()?;
        if let Some(new) = new_swapchain {
            cur.set_window_swapchain(new);
            return Ok(());
        }
        let Some(swapchain) = &mut cur.swapchain else {
            return Ok(());
        };
        if swapchain.prime {
            return Ok(());
        }
        let next = match swapchain.find_free() {
            Ok(idx) => &swapchain.buffers()[idx],
            Err(e) => {
                cur.force_realloc = true;
                return Err(e.into());
            }
        };
        let (next_id, next_bo) = (next.wl_buffer, next.bo.clone());
        if let Some(driver_surface) = &cur.driver_surface
            && let Err(e) = driver_surface.set_color_buffer(&next_bo)
        {
            log::error!(
                "The driver could not switch to the next back buffer: {}",
                ErrorFmt(e)
            );
            cur.force_realloc = true;
            return Ok(());
        }
        swapchain.current_back = Some(next_id);
        swapchain.render_buffer = next_bo;
        swapchain.update_buffer_age(presented);
        Ok(())
    }

    /// Makes sure that the compositor does not read the buffer before the
    /// rendering has completed.
    fn sync_rendering(&self, buffer: &mut PresentBuffer) -> Result<(), SurfaceError> {
        let driver = &self.display.driver;
        if !driver.supports_native_fences() {
            return driver.finish().map_err(SurfaceError::Finish);
        }
        let sync_file = driver
            .create_native_fence()
            .map_err(SurfaceError::CreateFence)?;
        if let Some(timeline) = &mut buffer.timeline {
            return timeline
                .attach_sync_file(&sync_file)
                .map_err(SurfaceError::AttachFence);
        }
        let mut imported = false;
        if let Some(dmabuf) = &buffer.dmabuf
            && self.display.implicit_sync
        {
            match self
                .display
                .dmabuf_sync
                .import_sync_file(dmabuf, DMA_BUF_SYNC_WRITE, &sync_file)
            {
                Ok(()) => imported = true,
                Err(e) => log::debug!("Could not import the rendering fence: {}", ErrorFmt(e)),
            }
        }
        if !imported {
            driver.finish().map_err(SurfaceError::Finish)?;
        }
        Ok(())
    }

    /// Sets the size that the next swapchain will have.
    ///
    /// Sizes that are not positive are ignored.
    pub fn resize(&self, width: i32, height: i32) {
        if width > 0 && height > 0 {
            let mut params = self.params.lock();
            params.pending_width = width;
            params.pending_height = height;
        }
    }

    /// Called by the driver before it renders to the surface.
    ///
    /// Replaces the swapchain if the window has been resized. Never waits for
    /// the render state. If it is busy, the next swap applies the size.
    pub fn driver_update(&self) {
        let (width, height) = {
            let params = self.params.lock();
            if params.skip_update != 0 || params.window.is_none() {
                return;
            }
            (params.pending_width, params.pending_height)
        };
        let Some(mut current) = self.current.try_lock() else {
            log::debug!("Surface {} is busy, deferring the update", self.surface);
            return;
        };
        let Some(cur) = &mut *current else {
            return;
        };
        match cur.realloc(width, height, false) {
            Ok(Some(new)) => cur.set_window_swapchain(new),
            Ok(None) => {}
            Err(e) => log::error!("Could not reallocate the swapchain: {}", ErrorFmt(e)),
        }
    }

    pub fn set_swap_interval(&self, interval: i32) {
        self.params.lock().swap_interval = interval.max(0);
    }

    pub fn swap_interval(&self) -> i32 {
        self.params.lock().swap_interval
    }

    /// The number of frames since the back buffer was presented. 0 if its
    /// contents are undefined.
    pub fn buffer_age(&self) -> u32 {
        let current = self.current.lock();
        let Some(swapchain) = current.as_ref().and_then(|c| c.swapchain.as_ref()) else {
            return 0;
        };
        if swapchain.prime {
            return 0;
        }
        swapchain.current_back().map(|b| b.age).unwrap_or(0)
    }

    /// Waits until the compositor has received the last frame and, if
    /// presentation feedback is used, presented it.
    pub fn wait_gl(&self) -> Result<(), SurfaceError> {
        self.display.driver.finish().map_err(SurfaceError::Finish)?;
        let mut current = self.current.lock();
        let Some(cur) = &mut *current else {
            return Ok(());
        };
        while cur.presentation_feedback.is_some() || cur.last_swap_sync.is_some() {
            for event in cur.queue.dispatch(None)? {
                cur.handle_event(event);
            }
        }
        Ok(())
    }

    /// The size of the last committed buffer.
    pub fn size(&self) -> (i32, i32) {
        match &*self.current.lock() {
            Some(cur) => (cur.attached_width, cur.attached_height),
            None => (0, 0),
        }
    }

    /// The size of the current swapchain.
    pub fn buffer_size(&self) -> Option<(i32, i32)> {
        let current = self.current.lock();
        let swapchain = current.as_ref()?.swapchain.as_ref()?;
        Some((swapchain.width, swapchain.height))
    }

    /// Destroys the surface. Calling this more than once has no effect.
    pub fn destroy(&self) {
        let window = {
            let mut params = self.params.lock();
            params.skip_update += 1;
            params.window.take()
        };
        let driver_surface = self
            .current
            .lock()
            .as_mut()
            .and_then(|c| c.driver_surface.take());
        if let Some(driver_surface) = driver_surface {
            driver_surface.destroy();
        }
        if let Some(window) = window {
            window.set_listener(None);
        }
        let current = self.current.lock().take();
        if current.is_some() {
            drop(current);
            self.display.surfaces.lock().remove(&self.surface);
        }
    }

    #[cfg(test)]
    pub(crate) fn while_busy<T>(&self, f: impl FnOnce() -> T) -> T {
        let _current = self.current.lock();
        f()
    }

    #[cfg(test)]
    pub(crate) fn with_swapchain<T>(&self, f: impl FnOnce(&Swapchain) -> T) -> Option<T> {
        let current = self.current.lock();
        current.as_ref()?.swapchain.as_ref().map(f)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl Current {
    fn handle_event(&mut self, event: Event) {
        let object = event.object;
        match event.body {
            EventBody::WlCallbackDone { .. } => {
                if self.frame_callback.map(ObjectId::from) == Some(object) {
                    self.frame_callback = None;
                }
                if self.last_swap_sync.map(ObjectId::from) == Some(object) {
                    self.last_swap_sync = None;
                }
                self.queue.forget(object);
            }
            EventBody::WpPresentationFeedbackPresented {
                tv_sec_hi,
                tv_sec_lo,
                tv_nsec,
                refresh,
                ..
            } => {
                if self.presentation_feedback.map(ObjectId::from) == Some(object) {
                    self.last_present_timestamp =
                        presentation_timestamp(tv_sec_hi, tv_sec_lo, tv_nsec);
                    self.last_present_refresh = refresh as u64;
                    self.presentation_feedback = None;
                }
                self.queue.forget(object);
            }
            EventBody::WpPresentationFeedbackDiscarded => {
                if self.presentation_feedback.map(ObjectId::from) == Some(object) {
                    self.discard_presentation_feedback();
                } else {
                    self.queue.forget(object);
                }
            }
            body => {
                let Some(feedback) = &mut self.feedback else {
                    return;
                };
                if ObjectId::from(feedback.id) != object {
                    return;
                }
                if let Some(modifiers) = feedback.handle_event(body) {
                    self.apply_surface_modifiers(modifiers);
                }
            }
        }
    }

    fn apply_surface_modifiers(&mut self, modifiers: SurfaceModifiers) {
        self.surface_modifiers = modifiers.modifiers;
        if self.surface_modifiers.is_empty() && !modifiers.linear {
            self.surface_modifiers = self
                .display
                .default_modifiers(self.render_format.drm, self.present_format.drm)
                .modifiers;
        }
        log::debug!(
            "Surface {} modifiers changed: {:x?}",
            self.surface,
            self.surface_modifiers,
        );
        self.modifiers_changed = true;
    }

    /// Treats the outstanding frame as presented now.
    fn discard_presentation_feedback(&mut self) {
        let mut now = uapi::pod_zeroed::<c::timespec>();
        match uapi::clock_gettime(self.display.presentation_clock, &mut now) {
            Ok(()) => {
                self.last_present_timestamp =
                    now.tv_sec as u64 * 1_000_000_000 + now.tv_nsec as u64;
            }
            Err(e) => log::warn!("Could not read the presentation clock: {}", e),
        }
        if let Some(feedback) = self.presentation_feedback.take() {
            self.queue.forget(feedback);
        }
    }

    /// Returns a new swapchain if the current one cannot be used anymore.
    fn realloc(
        &mut self,
        width: i32,
        height: i32,
        allow_modifier_realloc: bool,
    ) -> Result<Option<Swapchain>, SwapchainError> {
        let changed = (allow_modifier_realloc && self.modifiers_changed)
            .then_some(&self.surface_modifiers[..]);
        let shape = self.swapchain.as_ref().map(|s| s.shape());
        if !needs_realloc(shape, self.force_realloc, width, height, changed) {
            if allow_modifier_realloc {
                self.modifiers_changed = false;
            }
            return Ok(None);
        }
        let (prime, modifiers) = match self.surface_modifiers.is_not_empty() {
            true => (false, &self.surface_modifiers[..]),
            false => (
                true,
                self.display.driver_modifiers(self.render_format.drm),
            ),
        };
        Swapchain::create(
            &self.display,
            self.surface,
            width,
            height,
            self.render_format,
            self.present_format,
            prime,
            modifiers,
        )
        .map(Some)
    }

    /// Makes the driver render into a new swapchain and replaces the
    /// current one.
    fn set_window_swapchain(&mut self, new: Swapchain) {
        if let Some(driver_surface) = &self.driver_surface
            && let Err(e) = driver_surface.set_color_buffer(&new.render_buffer)
        {
            log::warn!("The driver rejected the new swapchain: {}", ErrorFmt(e));
            self.force_realloc = true;
            return;
        }
        self.swapchain = Some(new);
        self.force_realloc = false;
        self.modifiers_changed = false;
    }

    /// Returns the index of the buffer that will be committed.
    ///
    /// With PRIME, the render buffer is copied into a free present buffer.
    fn present_buffer(&mut self) -> Result<usize, SurfaceError> {
        let Some(swapchain) = &mut self.swapchain else {
            return Err(SurfaceError::NoBackBuffer);
        };
        if !swapchain.prime {
            return swapchain
                .current_back
                .and_then(|b| swapchain.find_buffer(b))
                .ok_or(SurfaceError::NoBackBuffer);
        }
        let idx = swapchain.find_free()?;
        self.display
            .allocator
            .copy(&*swapchain.render_buffer, &*swapchain.buffers()[idx].bo)
            .map_err(SurfaceError::Copy)?;
        Ok(idx)
    }

    /// Waits until the previous frame has been handled by the compositor.
    fn wait_previous_frames(&mut self) -> Result<(), SurfaceError> {
        while self.frame_callback.is_some()
            || self.last_swap_sync.is_some()
            || self.presentation_feedback.is_some()
        {
            for event in self.queue.dispatch(None)? {
                self.handle_event(event);
            }
        }
        Ok(())
    }

    /// Sends the requests that present a buffer.
    fn commit(
        &mut self,
        present_idx: usize,
        swap_interval: i32,
        damage: &[Damage],
    ) -> Result<(), SurfaceError> {
        let Some(swapchain) = &mut self.swapchain else {
            return Err(SurfaceError::NoBackBuffer);
        };
        let (width, height) = (swapchain.width, swapchain.height);
        let buffer = swapchain.buffer_mut(present_idx);
        let queue = &self.queue;
        let surface = self.surface;
        if let (Some(syncobj), Some(timeline)) = (self.syncobj, &mut buffer.timeline) {
            let acquire = timeline.point;
            queue.request(Request::WpLinuxDrmSyncobjSurfaceV1SetAcquirePoint {
                self_id: syncobj,
                timeline: timeline.id,
                point_hi: (acquire >> 32) as u32,
                point_lo: acquire as u32,
            })?;
            timeline.point += 1;
            let release = timeline.point;
            queue.request(Request::WpLinuxDrmSyncobjSurfaceV1SetReleasePoint {
                self_id: syncobj,
                timeline: timeline.id,
                point_hi: (release >> 32) as u32,
                point_lo: release as u32,
            })?;
        }
        queue.request(Request::WlSurfaceAttach {
            self_id: surface,
            buffer: buffer.wl_buffer,
            x: 0,
            y: 0,
        })?;
        let fifo = match (self.fifo, self.presentation) {
            (Some(fifo), Some(presentation)) => Some((fifo, presentation)),
            _ => None,
        };
        if let Some((fifo, _)) = fifo {
            queue.request(Request::WpFifoV1SetBarrier { self_id: fifo })?;
        }
        if damage.is_not_empty() && queue.version(surface) >= wl_surface::DAMAGE_BUFFER_SINCE {
            for d in damage {
                queue.request(Request::WlSurfaceDamageBuffer {
                    self_id: surface,
                    x: d.x,
                    y: d.y,
                    width: d.width,
                    height: d.height,
                })?;
            }
        } else {
            queue.request(Request::WlSurfaceDamage {
                self_id: surface,
                x: 0,
                y: 0,
                width: i32::MAX,
                height: i32::MAX,
            })?;
        }
        match fifo {
            Some((fifo, presentation)) => {
                if swap_interval > 0 {
                    if let Some(timer) = self.commit_timer
                        && let Some(ts) = commit_timestamp(
                            self.last_present_timestamp,
                            self.last_present_refresh,
                            swap_interval,
                        )
                    {
                        let sec = ts / 1_000_000_000;
                        queue.request(Request::WpCommitTimerV1SetTimestamp {
                            self_id: timer,
                            tv_sec_hi: (sec >> 32) as u32,
                            tv_sec_lo: sec as u32,
                            tv_nsec: (ts % 1_000_000_000) as u32,
                        })?;
                    }
                    let feedback = queue.new_id();
                    queue.request(Request::WpPresentationFeedback {
                        self_id: presentation,
                        surface,
                        callback: feedback,
                    })?;
                    self.presentation_feedback = Some(feedback);
                    queue.request(Request::WpFifoV1WaitBarrier { self_id: fifo })?;
                    // Lets the compositor discard the frame in finite time
                    // if the surface is not visible.
                    queue.request(Request::WlSurfaceCommit { self_id: surface })?;
                    queue.request(Request::WpFifoV1WaitBarrier { self_id: fifo })?;
                }
            }
            None => {
                let callback = queue.new_id();
                queue.request(Request::WlSurfaceFrame {
                    self_id: surface,
                    callback,
                })?;
                self.frame_callback = Some(callback);
            }
        }
        queue.request(Request::WlSurfaceCommit { self_id: surface })?;
        buffer.status = crate::swapchain::BufferStatus::InUse;
        self.attached_width = width;
        self.attached_height = height;
        Ok(())
    }
}

/// Converts a presentation time to nanoseconds. Saturates at `u64::MAX`.
fn presentation_timestamp(tv_sec_hi: u32, tv_sec_lo: u32, tv_nsec: u32) -> u64 {
    let sec = (tv_sec_hi as u64) << 32 | tv_sec_lo as u64;
    sec.saturating_mul(1_000_000_000).saturating_add(tv_nsec as u64)
}

/// Returns the time at which the next frame should be committed.
fn commit_timestamp(last_timestamp: u64, refresh: u64, swap_interval: i32) -> Option<u64> {
    if last_timestamp == 0 {
        return None;
    }
    let delay = (swap_interval as u64).saturating_mul(refresh);
    if delay < FRAME_TIMESTAMP_PADDING {
        return None;
    }
    Some(last_timestamp.saturating_add(delay - FRAME_TIMESTAMP_PADDING))
}

impl Drop for Current {
    fn drop(&mut self) {
        self.swapchain = None;
        let mut requests = vec![];
        if let Some(feedback) = self.feedback.take() {
            requests.push(Request::ZwpLinuxDmabufFeedbackV1Destroy {
                self_id: feedback.id,
            });
        }
        if let Some(syncobj) = self.syncobj.take() {
            requests.push(Request::WpLinuxDrmSyncobjSurfaceV1Destroy { self_id: syncobj });
        }
        for cb in [self.frame_callback.take(), self.last_swap_sync.take()]
            .into_iter()
            .flatten()
        {
            self.queue.forget(cb);
        }
        if let Some(feedback) = self.presentation_feedback.take() {
            self.queue.forget(feedback);
        }
        if let Some(fifo) = self.fifo.take() {
            requests.push(Request::WpFifoV1Destroy { self_id: fifo });
        }
        if let Some(timer) = self.commit_timer.take() {
            requests.push(Request::WpCommitTimerV1Destroy { self_id: timer });
        }
        for request in requests {
            if let Err(e) = self.queue.request(request) {
                log::warn!("Could not destroy a surface object: {}", ErrorFmt(e));
            }
        }
        if let Err(e) = self.queue.flush() {
            log::warn!("Could not flush the connection: {}", ErrorFmt(e));
        }
    }
}
