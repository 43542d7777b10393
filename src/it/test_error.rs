use {
    crate::utils::errorfmt::ErrorFmt,
    std::{
        error::Error,
        fmt::{Debug, Display, Formatter},
    },
};

pub type TestResult<T = ()> = Result<T, TestError>;

/// A chain of messages that describes why a test failed.
pub struct TestError {
    msg: String,
    source: Option<Box<dyn Error + 'static>>,
}

impl TestError {
    pub fn new<D: Display>(d: D) -> Self {
        Self {
            msg: d.to_string(),
            source: None,
        }
    }
}

impl Debug for TestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for TestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.msg)?;
        if let Some(source) = &self.source {
            write!(f, ": {}", ErrorFmt(&**source))?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> From<E> for TestError {
    fn from(error: E) -> Self {
        Self {
            msg: ErrorFmt(&error).to_string(),
            source: None,
        }
    }
}

pub trait TestErrorExt<T> {
    fn with_context<D, F>(self, f: F) -> TestResult<T>
    where
        D: Display,
        F: FnOnce() -> D;
}

impl<T, E: Error + 'static> TestErrorExt<T> for Result<T, E> {
    fn with_context<D, F>(self, f: F) -> TestResult<T>
    where
        D: Display,
        F: FnOnce() -> D,
    {
        self.map_err(|e| TestError {
            msg: f().to_string(),
            source: Some(Box::new(e)),
        })
    }
}

macro_rules! bail {
    ($($tt:tt)*) => {{
        let msg = format!($($tt)*);
        return Err(crate::it::test_error::TestError::new(msg));
    }}
}
