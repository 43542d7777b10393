use {
    crate::{
        allocator::Allocator,
        config::PresentConfig,
        error::ErrorKind,
        feedback::{DefaultFormats, FeedbackError, FeedbackStrategy},
        format::Format,
        format_list::{FormatList, Intersection, intersect},
        gfx_api::{GfxDriver, GfxError},
        utils::errorfmt::ErrorFmt,
        video::{
            DeviceId,
            dmabuf::{DmaBufSync, KernelDmaBufSync},
            drm::{
                DrmError, device_id_of_path,
                sync_obj::{DrmSyncObjCtx, SyncObjCtx},
            },
        },
        wire::{
            EventBody, ObjectId, Request, WL_DISPLAY_ID, WlRegistryId, WlSurfaceId,
            WpCommitTimingManagerV1Id, WpFifoManagerV1Id, WpLinuxDrmSyncobjManagerV1Id,
            WpPresentationId, ZwpLinuxDmabufV1Id, wp_commit_timing_manager_v1,
            wp_fifo_manager_v1, wp_linux_drm_syncobj_manager_v1, wp_presentation,
            zwp_linux_dmabuf_v1,
        },
        wl_usr::{UsrConError, UsrQueue, WlTransport},
    },
    ahash::{AHashMap, AHashSet},
    isnt::std_1::vec::IsntVecExt,
    parking_lot::Mutex,
    std::sync::Arc,
    thiserror::Error,
    uapi::c,
};

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error(transparent)]
    UsrConError(#[from] UsrConError),
    #[error("The compositor does not support linux-dmabuf")]
    NoDmabuf,
    #[error("The compositor only supports linux-dmabuf version {0}")]
    DmabufVersion(u32),
    #[error("Could not fetch the formats of the compositor")]
    Feedback(#[source] FeedbackError),
    #[error("Could not query the formats of the driver")]
    DriverFormats(#[source] GfxError),
    #[error("The driver does not support any formats")]
    NoDriverFormats,
    #[error("Could not look up the requested render device")]
    RenderDevice(#[source] DrmError),
    #[error("The driver does not own the requested render device")]
    UnknownRenderDevice,
    #[error("The driver does not own the device used by the compositor")]
    DeviceMismatch,
    #[error("None of the formats can be used for windows")]
    NoWindowFormats,
}

impl DisplayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DisplayError::UsrConError(_) => ErrorKind::Protocol,
            DisplayError::Feedback(e) => match e {
                FeedbackError::UsrConError(_) => ErrorKind::Protocol,
                FeedbackError::MapFormatTable(_) => ErrorKind::OutOfMemory,
                FeedbackError::UnsupportedVersion | FeedbackError::NoFormats => {
                    ErrorKind::NotSupported
                }
            },
            DisplayError::DriverFormats(_) => ErrorKind::Driver,
            DisplayError::NoDmabuf
            | DisplayError::DmabufVersion(_)
            | DisplayError::NoDriverFormats
            | DisplayError::RenderDevice(_)
            | DisplayError::UnknownRenderDevice
            | DisplayError::DeviceMismatch
            | DisplayError::NoWindowFormats => ErrorKind::NotSupported,
        }
    }
}

/// The globals bound by a display.
#[derive(Copy, Clone, Debug)]
pub struct Globals {
    pub registry: WlRegistryId,
    pub dmabuf: ZwpLinuxDmabufV1Id,
    pub syncobj: Option<WpLinuxDrmSyncobjManagerV1Id>,
    pub fifo: Option<WpFifoManagerV1Id>,
    pub commit_timing: Option<WpCommitTimingManagerV1Id>,
    pub presentation: Option<WpPresentationId>,
}

/// Everything needed to share timelines with the compositor.
pub struct ExplicitSync {
    pub ctx: Arc<dyn SyncObjCtx>,
    pub manager: WpLinuxDrmSyncobjManagerV1Id,
}

#[derive(Copy, Clone, Debug)]
pub struct WindowFormat {
    pub format: &'static Format,
    pub supported: bool,
}

/// The state shared by all surfaces of one connection.
pub struct Display {
    pub con: Arc<dyn WlTransport>,
    pub config: PresentConfig,
    pub driver: Arc<dyn GfxDriver>,
    pub allocator: Arc<dyn Allocator>,
    pub dmabuf_sync: Arc<dyn DmaBufSync>,
    pub globals: Globals,
    pub dmabuf_version: u32,
    pub feedback_strategy: FeedbackStrategy,
    pub default_formats: DefaultFormats,
    pub driver_formats: FormatList,
    pub window_formats: Vec<WindowFormat>,
    pub explicit_sync: Option<ExplicitSync>,
    pub implicit_sync: bool,
    /// Render on a device other than the one the compositor uses and copy
    /// into linear buffers.
    pub force_prime: bool,
    /// The clock of presentation timestamps.
    pub presentation_clock: c::clockid_t,
    pub(crate) surfaces: Mutex<AHashSet<WlSurfaceId>>,
    _queue: UsrQueue,
}

impl Display {
    /// Creates a display that talks to the kernel directly.
    pub fn new(
        con: &Arc<dyn WlTransport>,
        driver: Arc<dyn GfxDriver>,
        config: PresentConfig,
    ) -> Result<Arc<Self>, DisplayError> {
        let sync_obj_ctx = driver
            .drm_fd()
            .map(|fd| Arc::new(DrmSyncObjCtx::new(&fd)) as Arc<dyn SyncObjCtx>);
        Self::with_sync(
            con,
            driver,
            config,
            sync_obj_ctx,
            Arc::new(KernelDmaBufSync::new()),
        )
    }

    pub fn with_sync(
        con: &Arc<dyn WlTransport>,
        driver: Arc<dyn GfxDriver>,
        config: PresentConfig,
        sync_obj_ctx: Option<Arc<dyn SyncObjCtx>>,
        dmabuf_sync: Arc<dyn DmaBufSync>,
    ) -> Result<Arc<Self>, DisplayError> {
        let queue = UsrQueue::new(con, "display")?;
        let registry: WlRegistryId = queue.new_id();
        queue.request(Request::WlDisplayGetRegistry {
            self_id: WL_DISPLAY_ID,
            registry,
        })?;
        let mut advertised = AHashMap::new();
        for event in queue.roundtrip()? {
            if event.object != registry.into() {
                continue;
            }
            if let EventBody::WlRegistryGlobal {
                name,
                interface,
                version,
            } = event.body
            {
                advertised.entry(interface).or_insert((name, version));
            }
        }
        let bind = |interface: &'static str, supported: u32| -> Result<_, UsrConError> {
            let Some(&(name, advertised)) = advertised.get(interface) else {
                return Ok(None);
            };
            let version = config.version(interface, supported, advertised);
            if version == 0 {
                return Ok(None);
            }
            let id: ObjectId = queue.new_id();
            queue.request(Request::WlRegistryBind {
                self_id: registry,
                name,
                interface,
                version,
                id,
            })?;
            Ok(Some((id, version)))
        };
        let Some((dmabuf, dmabuf_version)) =
            bind(zwp_linux_dmabuf_v1::NAME, zwp_linux_dmabuf_v1::MAX_VERSION)?
        else {
            return Err(DisplayError::NoDmabuf);
        };
        let dmabuf = ZwpLinuxDmabufV1Id::from(dmabuf);
        let feedback_strategy = FeedbackStrategy::for_version(dmabuf_version)
            .map_err(|_| DisplayError::DmabufVersion(dmabuf_version))?;
        let bind_opt = |interface, supported| {
            bind(interface, supported).map(|b| b.map(|(id, _)| id))
        };
        let syncobj = bind_opt(
            wp_linux_drm_syncobj_manager_v1::NAME,
            wp_linux_drm_syncobj_manager_v1::MAX_VERSION,
        )?;
        let fifo = bind_opt(wp_fifo_manager_v1::NAME, wp_fifo_manager_v1::MAX_VERSION)?;
        let commit_timing = bind_opt(
            wp_commit_timing_manager_v1::NAME,
            wp_commit_timing_manager_v1::MAX_VERSION,
        )?;
        let presentation = bind_opt(wp_presentation::NAME, wp_presentation::MAX_VERSION)?;
        let globals = Globals {
            registry,
            dmabuf,
            syncobj: syncobj.map(Into::into),
            fifo: fifo.map(Into::into),
            commit_timing: commit_timing.map(Into::into),
            presentation: presentation.map(Into::into),
        };
        let bound = queue.roundtrip()?;
        let mut presentation_clock = c::CLOCK_MONOTONIC;
        if let Some(presentation) = globals.presentation {
            for event in &bound {
                if event.object != presentation.into() {
                    continue;
                }
                if let EventBody::WpPresentationClockId { clk_id } = event.body {
                    presentation_clock = clk_id as c::clockid_t;
                }
            }
        }
        let default_formats = feedback_strategy
            .fetch_default(&queue, dmabuf, bound)
            .map_err(DisplayError::Feedback)?;
        let driver_formats = driver
            .formats()
            .map_err(DisplayError::DriverFormats)?;
        let driver_formats = FormatList::from_driver(&driver_formats);
        if driver_formats.is_empty() {
            return Err(DisplayError::NoDriverFormats);
        }
        let force_prime =
            select_device(&config, driver.device_ids(), default_formats.main_device)?;
        let explicit_sync = match (globals.syncobj, sync_obj_ctx) {
            _ if config.disable_explicit_sync => None,
            (Some(manager), Some(ctx))
                if driver.supports_native_fences() && ctx.supports_timelines() =>
            {
                Some(ExplicitSync { ctx, manager })
            }
            _ => None,
        };
        let implicit_sync = dmabuf_sync.supported() && !config.disable_implicit_sync;
        let window_formats =
            window_formats(&driver_formats, &default_formats.formats, force_prime);
        if window_formats.iter().all(|f| !f.supported) {
            return Err(DisplayError::NoWindowFormats);
        }
        log::debug!(
            "Display created: dmabuf v{}, explicit sync {}, implicit sync {}, prime {}",
            dmabuf_version,
            explicit_sync.is_some(),
            implicit_sync,
            force_prime,
        );
        Ok(Arc::new(Self {
            con: con.clone(),
            config,
            allocator: driver.allocator(),
            driver,
            dmabuf_sync,
            globals,
            dmabuf_version,
            feedback_strategy,
            default_formats,
            driver_formats,
            window_formats,
            explicit_sync,
            implicit_sync,
            force_prime,
            presentation_clock,
            surfaces: Default::default(),
            _queue: queue,
        }))
    }

    pub fn window_format(&self, fourcc: u32) -> Option<&WindowFormat> {
        self.window_formats.iter().find(|f| f.format.drm == fourcc)
    }

    /// The modifiers to use for a new surface before the compositor sent
    /// feedback for it.
    pub fn default_modifiers(&self, render_fourcc: u32, present_fourcc: u32) -> Intersection {
        let server = self.default_formats.formats.find(present_fourcc);
        let mut res = intersect(self.driver_formats.find(render_fourcc), server);
        if self.force_prime {
            res.modifiers.clear();
        }
        res
    }

    /// The modifiers the driver can render with.
    pub fn driver_modifiers(&self, fourcc: u32) -> &[u64] {
        self.driver_formats
            .find(fourcc)
            .map(|f| &f.modifiers[..])
            .unwrap_or_default()
    }

    pub fn render_format(&self, fourcc: u32) -> Option<&'static Format> {
        self.driver_formats.find(fourcc).map(|f| f.format)
    }
}

/// Decides whether the display has to copy into linear buffers because the
/// driver renders on a different device than the compositor uses.
fn select_device(
    config: &PresentConfig,
    driver_devices: &[DeviceId],
    main_device: Option<DeviceId>,
) -> Result<bool, DisplayError> {
    if let Some(provider) = &config.render_offload_provider {
        match device_id_of_path(provider) {
            Ok(dev) if driver_devices.contains(&dev) => {}
            Ok(_) if config.enable_alt_device => {
                log::debug!("The driver does not own {provider}");
            }
            Ok(_) => return Err(DisplayError::UnknownRenderDevice),
            Err(e) if config.enable_alt_device => {
                log::warn!("Could not look up {provider}: {}", ErrorFmt(e));
            }
            Err(e) => return Err(DisplayError::RenderDevice(e)),
        }
    }
    let Some(main_device) = main_device else {
        return Ok(false);
    };
    if driver_devices.contains(&main_device) {
        return Ok(false);
    }
    if config.enable_alt_device {
        log::info!("Rendering on a different device than the compositor");
        return Ok(true);
    }
    Err(DisplayError::DeviceMismatch)
}

/// Determines which driver formats can be used for windows.
pub fn window_formats(
    driver: &FormatList,
    server: &FormatList,
    force_prime: bool,
) -> Vec<WindowFormat> {
    driver
        .iter()
        .map(|f| {
            let res = intersect(Some(f), server.find(f.format.drm));
            let supported = res.linear || (!force_prime && res.modifiers.is_not_empty());
            WindowFormat {
                format: f.format,
                supported,
            }
        })
        .collect()
}
