use {
    crate::utils::{errorfmt::ErrorFmt, oserror::OsError},
    bstr::ByteSlice,
    log::{Level, Log, Metadata, Record},
    std::{
        cell::RefCell,
        io::Write,
        sync::{
            Arc, OnceLock,
            atomic::{AtomicU32, Ordering::Relaxed},
        },
        time::SystemTime,
    },
    uapi::{Fd, OwnedFd},
};

pub const LOG_LEVEL_VAR: &str = "WL_PRESENT_LOG";

thread_local! {
    static BUFFER: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

static LOGGER: OnceLock<Arc<Logger>> = OnceLock::new();

pub struct Logger {
    level: AtomicU32,
    file: OwnedFd,
}

impl Logger {
    /// Installs a logger that writes to stderr.
    ///
    /// If a logger has already been installed by this function, that logger
    /// is returned with its level updated.
    pub fn install_stderr(level: Level) -> Result<Arc<Self>, OsError> {
        if let Some(logger) = LOGGER.get() {
            logger.set_level(level);
            return Ok(logger.clone());
        }
        let file = uapi::fcntl_dupfd_cloexec(2, 0)?;
        let logger = LOGGER.get_or_init(|| {
            Arc::new(Self {
                level: AtomicU32::new(level as _),
                file,
            })
        });
        let res = log::set_boxed_logger(Box::new(LogWrapper {
            logger: logger.clone(),
        }));
        if res.is_ok() {
            log::set_max_level(logger.level().to_level_filter());
        }
        Ok(logger.clone())
    }

    /// Installs a stderr logger with the level from the environment.
    pub fn install_from_env() -> Result<Arc<Self>, OsError> {
        let level = std::env::var_os(LOG_LEVEL_VAR)
            .and_then(|v| parse_level(v.as_encoded_bytes()))
            .unwrap_or(Level::Info);
        Self::install_stderr(level)
    }

    pub fn set_level(&self, level: Level) {
        self.level.store(level as _, Relaxed);
        log::set_max_level(level.to_level_filter());
    }

    pub fn level(&self) -> Level {
        match self.level.load(Relaxed) {
            1 => Level::Error,
            2 => Level::Warn,
            3 => Level::Info,
            4 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

pub fn parse_level(s: &[u8]) -> Option<Level> {
    let level = match s.trim().to_ascii_lowercase().as_slice() {
        b"error" => Level::Error,
        b"warn" => Level::Warn,
        b"info" => Level::Info,
        b"debug" => Level::Debug,
        b"trace" => Level::Trace,
        _ => {
            log::warn!("Unknown log level {}", s.as_bstr());
            return None;
        }
    };
    Some(level)
}

struct LogWrapper {
    logger: Arc<Logger>,
}

impl Log for LogWrapper {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() as u32 <= self.logger.level.load(Relaxed)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        BUFFER.with_borrow_mut(|buffer| {
            buffer.clear();
            let now = SystemTime::now();
            let _ = if let Some(mp) = record.module_path() {
                writeln!(
                    buffer,
                    "[{} {:5} {}] {}",
                    humantime::format_rfc3339_millis(now),
                    record.level(),
                    mp,
                    record.args(),
                )
            } else {
                writeln!(
                    buffer,
                    "[{} {:5}] {}",
                    humantime::format_rfc3339_millis(now),
                    record.level(),
                    record.args(),
                )
            };
            let mut fd = Fd::new(self.logger.file.raw());
            if let Err(e) = fd.write_all(buffer) {
                eprintln!("Could not write a log message: {}", ErrorFmt(e));
            }
        });
    }

    fn flush(&self) {
        // nothing
    }
}
