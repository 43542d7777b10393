use {
    crate::{
        allocator::{
            AllocatorError, BO_USE_LINEAR, BO_USE_RENDERING, BO_USE_SCANOUT, BufferObject,
        },
        display::Display,
        error::ErrorKind,
        format::Format,
        timeline::{Timeline, TimelineError},
        utils::{errorfmt::ErrorFmt, oserror::OsError},
        video::{
            LINEAR_MODIFIER, Modifier,
            dmabuf::{DMA_BUF_SYNC_WRITE, DmaBuf},
            drm::{
                DrmError,
                sync_obj::{SyncObjHandle, SyncObjPoint, WaitMode},
            },
        },
        wire::{
            Event, EventBody, Request, WlBufferId, WlSurfaceId, ZwpLinuxBufferParamsV1Id,
        },
        wl_usr::{UsrConError, UsrQueue, WlTransport},
    },
    isnt::std_1::primitive::IsntSliceExt,
    smallvec::SmallVec,
    std::{sync::Arc, time::Duration},
    thiserror::Error,
    uapi::OwnedFd,
};

pub const MAX_PRESENT_BUFFERS: usize = 4;

/// How long to wait for an implicit fence before checking for new events.
pub const RELEASE_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SwapchainError {
    #[error("Could not create an event queue")]
    CreateQueue(#[source] UsrConError),
    #[error("Could not allocate the render buffer")]
    AllocateRenderBuffer(#[source] AllocatorError),
    #[error("Could not import the render buffer")]
    ImportRenderBuffer(#[source] AllocatorError),
    #[error("Could not allocate a present buffer")]
    AllocatePresentBuffer(#[source] AllocatorError),
    #[error("Could not create the timeline of a present buffer")]
    Timeline(#[source] TimelineError),
    #[error("The compositor could not import a present buffer")]
    ImportFailed,
    #[error("Could not share a present buffer with the compositor")]
    Share(#[source] UsrConError),
    #[error("Could not wait for a buffer release")]
    WaitRelease(#[source] DrmError),
    #[error("Could not poll the present buffers")]
    Poll(#[source] OsError),
    #[error("Could not dispatch events")]
    Dispatch(#[source] UsrConError),
}

impl SwapchainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwapchainError::CreateQueue(_)
            | SwapchainError::Share(_)
            | SwapchainError::Dispatch(_) => ErrorKind::Protocol,
            SwapchainError::Timeline(TimelineError::Share(_)) => ErrorKind::Protocol,
            SwapchainError::AllocateRenderBuffer(_)
            | SwapchainError::ImportRenderBuffer(_)
            | SwapchainError::AllocatePresentBuffer(_)
            | SwapchainError::Timeline(_)
            | SwapchainError::ImportFailed
            | SwapchainError::WaitRelease(_)
            | SwapchainError::Poll(_) => ErrorKind::OutOfMemory,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferStatus {
    Idle,
    /// The compositor might still read from the buffer.
    InUse,
    /// The compositor has released the buffer but its implicit fences might
    /// not have signaled yet.
    IdleNotified,
}

/// A buffer that has been shared with the compositor.
pub struct PresentBuffer {
    pub bo: Arc<dyn BufferObject>,
    pub wl_buffer: WlBufferId,
    pub status: BufferStatus,
    /// Acquire and release points. Only used with explicit sync.
    pub timeline: Option<Timeline>,
    /// Only kept if the buffer is released via implicit fences.
    pub dmabuf: Option<Arc<OwnedFd>>,
    /// The number of frames since the contents were presented. 0 if the
    /// contents are undefined.
    pub age: u32,
    con: Arc<dyn WlTransport>,
}

impl Drop for PresentBuffer {
    fn drop(&mut self) {
        let res = self.con.send(Request::WlBufferDestroy {
            self_id: self.wl_buffer,
        });
        if let Err(e) = res {
            log::warn!("Could not destroy buffer {}: {}", self.wl_buffer, ErrorFmt(e));
        }
        self.con.forget(self.wl_buffer.into());
    }
}

/// The properties of a swapchain that decide whether it has to be replaced.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SwapchainShape {
    pub width: i32,
    pub height: i32,
    pub modifier: Modifier,
    pub prime: bool,
}

/// Returns whether a swapchain has to be reallocated before the next frame.
///
/// `changed_modifiers` are the new surface modifiers if the compositor sent
/// new feedback since the last check.
pub fn needs_realloc(
    current: Option<SwapchainShape>,
    force: bool,
    width: i32,
    height: i32,
    changed_modifiers: Option<&[Modifier]>,
) -> bool {
    let Some(current) = current else {
        return true;
    };
    if force || current.width != width || current.height != height {
        return true;
    }
    match changed_modifiers {
        None => false,
        Some(modifiers) if current.prime => modifiers.is_not_empty(),
        Some(modifiers) => !modifiers.contains(&current.modifier),
    }
}

/// The buffers of one surface.
///
/// In direct mode the render buffer is also the first present buffer and
/// every present buffer can be rendered to. In PRIME mode the render buffer
/// is private and its contents are copied into linear present buffers.
pub struct Swapchain {
    display: Arc<Display>,
    queue: UsrQueue,
    pub width: i32,
    pub height: i32,
    pub render_format: &'static Format,
    pub present_format: &'static Format,
    pub modifier: Modifier,
    pub prime: bool,
    pub render_buffer: Arc<dyn BufferObject>,
    /// Ordered by preference for reuse.
    buffers: Vec<PresentBuffer>,
    /// The present buffer that is currently being rendered to. Always `None`
    /// in PRIME mode.
    pub current_back: Option<WlBufferId>,
}

impl Swapchain {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        display: &Arc<Display>,
        surface: WlSurfaceId,
        width: i32,
        height: i32,
        render_format: &'static Format,
        present_format: &'static Format,
        prime: bool,
        modifiers: &[Modifier],
    ) -> Result<Self, SwapchainError> {
        let queue = UsrQueue::new(&display.con, &format!("swapchain({surface})"))
            .map_err(SwapchainError::CreateQueue)?;
        let mut usage = BO_USE_RENDERING;
        if !prime {
            usage |= BO_USE_SCANOUT;
        }
        let bo = display
            .allocator
            .create_bo(width, height, render_format, modifiers, usage)
            .map_err(SwapchainError::AllocateRenderBuffer)?;
        let render_buffer = display
            .allocator
            .import_dmabuf(bo.dmabuf(), usage)
            .map_err(SwapchainError::ImportRenderBuffer)?;
        let mut slf = Self {
            display: display.clone(),
            queue,
            width,
            height,
            render_format,
            present_format,
            modifier: LINEAR_MODIFIER,
            prime,
            render_buffer: render_buffer.clone(),
            buffers: vec![],
            current_back: None,
        };
        if !prime {
            slf.modifier = bo.dmabuf().modifier;
            let back = slf.append_present_buffer(render_buffer)?;
            slf.current_back = Some(back);
        }
        log::debug!(
            "Created a {}x{} swapchain with modifier 0x{:x}, prime = {}",
            width,
            height,
            slf.modifier,
            prime,
        );
        Ok(slf)
    }

    pub fn shape(&self) -> SwapchainShape {
        SwapchainShape {
            width: self.width,
            height: self.height,
            modifier: self.modifier,
            prime: self.prime,
        }
    }

    pub fn buffers(&self) -> &[PresentBuffer] {
        &self.buffers
    }

    pub fn buffer_mut(&mut self, idx: usize) -> &mut PresentBuffer {
        &mut self.buffers[idx]
    }

    pub fn find_buffer(&self, wl_buffer: WlBufferId) -> Option<usize> {
        self.buffers.iter().position(|b| b.wl_buffer == wl_buffer)
    }

    pub fn current_back(&self) -> Option<&PresentBuffer> {
        let idx = self.find_buffer(self.current_back?)?;
        Some(&self.buffers[idx])
    }

    /// Shares a buffer with the compositor and adds it to the front of the
    /// pool.
    fn append_present_buffer(
        &mut self,
        bo: Arc<dyn BufferObject>,
    ) -> Result<WlBufferId, SwapchainError> {
        let timeline = match &self.display.explicit_sync {
            Some(es) => Some(
                Timeline::init(&es.ctx, &self.queue, es.manager)
                    .map_err(SwapchainError::Timeline)?,
            ),
            None => None,
        };
        let wl_buffer = self.share(bo.dmabuf())?;
        let mut dmabuf = None;
        if self.display.explicit_sync.is_none() && self.display.implicit_sync {
            dmabuf = bo.dmabuf().fd().cloned();
        }
        self.buffers.insert(
            0,
            PresentBuffer {
                bo,
                wl_buffer,
                status: BufferStatus::Idle,
                timeline,
                dmabuf,
                age: 0,
                con: self.queue.con.clone(),
            },
        );
        Ok(wl_buffer)
    }

    fn share(&mut self, dmabuf: &DmaBuf) -> Result<WlBufferId, SwapchainError> {
        let params: ZwpLinuxBufferParamsV1Id = self.queue.new_id();
        self.queue
            .request(Request::ZwpLinuxDmabufV1CreateParams {
                self_id: self.display.globals.dmabuf,
                params_id: params,
            })
            .map_err(SwapchainError::Share)?;
        let res = self.create_wl_buffer(params, dmabuf);
        let destroyed = self
            .queue
            .request(Request::ZwpLinuxBufferParamsV1Destroy { self_id: params });
        let wl_buffer = res?;
        if let Err(e) = destroyed {
            let res = self.queue.request(Request::WlBufferDestroy { self_id: wl_buffer });
            if let Err(e) = res {
                log::warn!("Could not destroy buffer {}: {}", wl_buffer, ErrorFmt(e));
            }
            return Err(SwapchainError::Share(e));
        }
        Ok(wl_buffer)
    }

    fn create_wl_buffer(
        &mut self,
        params: ZwpLinuxBufferParamsV1Id,
        dmabuf: &DmaBuf,
    ) -> Result<WlBufferId, SwapchainError> {
        for (plane_idx, plane) in dmabuf.planes.iter().enumerate() {
            self.queue
                .request(Request::ZwpLinuxBufferParamsV1Add {
                    self_id: params,
                    fd: plane.fd.clone(),
                    plane_idx: plane_idx as u32,
                    offset: plane.offset,
                    stride: plane.stride,
                    modifier_hi: (self.modifier >> 32) as u32,
                    modifier_lo: self.modifier as u32,
                })
                .map_err(SwapchainError::Share)?;
        }
        self.queue
            .request(Request::ZwpLinuxBufferParamsV1Create {
                self_id: params,
                width: self.width,
                height: self.height,
                format: self.present_format.drm,
                flags: 0,
            })
            .map_err(SwapchainError::Share)?;
        loop {
            let mut result = None;
            for event in self.queue.roundtrip().map_err(SwapchainError::Share)? {
                if event.object != params.into() {
                    self.handle_event(event);
                    continue;
                }
                match event.body {
                    EventBody::ZwpLinuxBufferParamsV1Created { buffer } => {
                        result = Some(Ok(buffer));
                    }
                    EventBody::ZwpLinuxBufferParamsV1Failed => {
                        result = Some(Err(SwapchainError::ImportFailed));
                    }
                    _ => {}
                }
            }
            if let Some(result) = result {
                return result;
            }
        }
    }

    /// Handles an event of the swapchain queue.
    pub fn handle_event(&mut self, event: Event) {
        if let EventBody::WlBufferRelease = event.body {
            if let Some(idx) = self.find_buffer(event.object.into()) {
                self.handle_release(idx);
            }
        }
    }

    /// Handles a `wl_buffer.release` event.
    ///
    /// Released buffers move to the back of the pool so that the buffers
    /// that have been released the longest are reused first.
    pub fn handle_release(&mut self, idx: usize) {
        if self.display.explicit_sync.is_some() {
            return;
        }
        let mut buffer = self.buffers.remove(idx);
        if buffer.status == BufferStatus::InUse {
            buffer.status = BufferStatus::IdleNotified;
        }
        self.buffers.push(buffer);
    }

    /// Allocates a new present buffer and returns its index.
    pub fn create_present_buffer(&mut self) -> Result<usize, SwapchainError> {
        let usage = match self.prime {
            true => BO_USE_RENDERING | BO_USE_LINEAR,
            false => BO_USE_RENDERING | BO_USE_SCANOUT,
        };
        let bo = self
            .display
            .allocator
            .create_bo(
                self.width,
                self.height,
                self.render_format,
                &[self.modifier],
                usage,
            )
            .map_err(SwapchainError::AllocatePresentBuffer)?;
        self.append_present_buffer(bo)?;
        Ok(0)
    }

    /// Waits for the release point of any buffer in use and marks that
    /// buffer idle.
    ///
    /// The wait for the fence of the point is handed to the GPU if possible.
    pub fn check_release_explicit(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<(), SwapchainError> {
        let Some(es) = &self.display.explicit_sync else {
            return Ok(());
        };
        let mut indices = SmallVec::<[usize; MAX_PRESENT_BUFFERS]>::new();
        let mut points = SmallVec::<[(SyncObjHandle, SyncObjPoint); MAX_PRESENT_BUFFERS]>::new();
        for (idx, buffer) in self.buffers.iter().enumerate() {
            if buffer.status == BufferStatus::Idle {
                continue;
            }
            if let Some(timeline) = &buffer.timeline {
                indices.push(idx);
                points.push(timeline.current());
            }
        }
        if points.is_empty() {
            return Ok(());
        }
        let first = es
            .ctx
            .wait_any(&points, timeout, WaitMode::Available)
            .map_err(SwapchainError::WaitRelease)?;
        let Some(first) = first else {
            return Ok(());
        };
        let idx = indices[first];
        self.wait_release_point(idx)?;
        self.buffers[idx].status = BufferStatus::Idle;
        Ok(())
    }

    fn wait_release_point(&self, idx: usize) -> Result<(), SwapchainError> {
        let (Some(es), Some(timeline)) = (&self.display.explicit_sync, &self.buffers[idx].timeline)
        else {
            return Ok(());
        };
        match timeline.point_to_sync_file(timeline.point) {
            Ok(sync_file) => match self.display.driver.wait_sync_file(&sync_file) {
                Ok(()) => return Ok(()),
                Err(e) => log::debug!("Could not wait for a release point on the GPU: {}", ErrorFmt(e)),
            },
            Err(e) => log::debug!("Could not export a release point: {}", ErrorFmt(e)),
        }
        es.ctx
            .wait_any(&[timeline.current()], None, WaitMode::Signaled)
            .map_err(SwapchainError::WaitRelease)?;
        Ok(())
    }

    /// Checks the buffers that the compositor has released for pending
    /// implicit fences.
    ///
    /// Returns the number of buffers that were checked. 0 means that no
    /// buffer has been released yet.
    pub fn check_release_implicit(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<usize, SwapchainError> {
        for event in self
            .queue
            .dispatch_pending()
            .map_err(SwapchainError::Dispatch)?
        {
            self.handle_event(event);
        }
        let mut waiting = SmallVec::<[(usize, Arc<OwnedFd>); MAX_PRESENT_BUFFERS]>::new();
        for (idx, buffer) in self.buffers.iter_mut().enumerate() {
            if buffer.status != BufferStatus::IdleNotified {
                continue;
            }
            let Some(dmabuf) = buffer.dmabuf.as_ref().filter(|_| self.display.implicit_sync)
            else {
                // Without implicit sync the release event has to be enough.
                buffer.status = BufferStatus::Idle;
                return Ok(1);
            };
            if wait_implicit_fence(&self.display, dmabuf) {
                buffer.status = BufferStatus::Idle;
                return Ok(1);
            }
            waiting.push((idx, dmabuf.clone()));
        }
        if waiting.is_empty() {
            return Ok(0);
        }
        let fds: SmallVec<[Arc<OwnedFd>; MAX_PRESENT_BUFFERS]> =
            waiting.iter().map(|(_, fd)| fd.clone()).collect();
        let writable = self
            .display
            .dmabuf_sync
            .poll_writable(&fds, timeout)
            .map_err(SwapchainError::Poll)?;
        for ((idx, _), writable) in waiting.iter().zip(writable) {
            if writable {
                self.buffers[*idx].status = BufferStatus::Idle;
            }
        }
        Ok(waiting.len())
    }

    /// Returns the index of an idle present buffer.
    ///
    /// Allocates a new buffer if none is idle and the pool is not full.
    /// Otherwise blocks until the compositor releases one.
    pub fn find_free(&mut self) -> Result<usize, SwapchainError> {
        let explicit = self.display.explicit_sync.is_some();
        if explicit {
            self.check_release_explicit(Some(Duration::ZERO))?;
        } else {
            self.check_release_implicit(Some(Duration::ZERO))?;
        }
        loop {
            if let Some(idx) = self
                .buffers
                .iter()
                .position(|b| b.status == BufferStatus::Idle)
            {
                return Ok(idx);
            }
            if self.buffers.len() < MAX_PRESENT_BUFFERS {
                return self.create_present_buffer();
            }
            if explicit {
                self.check_release_explicit(None)?;
            } else if self.check_release_implicit(Some(RELEASE_WAIT_TIMEOUT))? == 0 {
                for event in self
                    .queue
                    .dispatch(None)
                    .map_err(SwapchainError::Dispatch)?
                {
                    self.handle_event(event);
                }
            }
        }
    }

    /// Updates the ages of the buffers after a frame has been presented.
    pub fn update_buffer_age(&mut self, presented: WlBufferId) {
        for buffer in &mut self.buffers {
            if buffer.wl_buffer == presented {
                buffer.age = 1;
            } else if buffer.age > 0 {
                buffer.age += 1;
            }
        }
    }

    pub fn queue(&self) -> &UsrQueue {
        &self.queue
    }
}

/// Makes the GPU wait for the implicit fences of a released buffer.
fn wait_implicit_fence(display: &Display, dmabuf: &OwnedFd) -> bool {
    let sync_file = match display
        .dmabuf_sync
        .export_sync_file(dmabuf, DMA_BUF_SYNC_WRITE)
    {
        Ok(s) => s,
        Err(e) => {
            log::debug!("Could not export an implicit fence: {}", ErrorFmt(e));
            return false;
        }
    };
    match display.driver.wait_sync_file(&sync_file) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("Could not wait for an implicit fence: {}", ErrorFmt(e));
            false
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.buffers.clear();
    }
}
