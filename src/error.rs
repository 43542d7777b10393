/// The category of a failure as seen by the embedder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The compositor or the driver lacks a required capability. Another
    /// implementation might be able to serve the display.
    NotSupported,
    OutOfMemory,
    /// The connection to the compositor failed and cannot be used anymore.
    Protocol,
    Driver,
    BadParameter,
}
