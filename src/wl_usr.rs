use {
    crate::{
        utils::oserror::OsError,
        wire::{Event, EventBody, ObjectId, Request, WL_DISPLAY_ID, WlCallbackId},
    },
    std::{error::Error, sync::Arc, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum UsrConError {
    #[error("The connection to the compositor has been closed")]
    Closed,
    #[error("Could not read from the compositor")]
    Read(#[source] OsError),
    #[error("Could not write to the compositor")]
    Write(#[source] OsError),
    #[error("The compositor sent a protocol error for object {object}: {message}")]
    Protocol { object: ObjectId, message: String },
    #[error(transparent)]
    Transport(#[from] Box<dyn Error + Send + Sync>),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct QueueId(pub u32);

/// A connection to the compositor.
///
/// Events are delivered per queue. Every object belongs to the queue it was
/// created on and events for objects created by the compositor are delivered
/// on the queue of the object whose event created them.
pub trait WlTransport: Send + Sync {
    fn create_queue(&self, name: &str) -> Result<QueueId, UsrConError>;

    fn destroy_queue(&self, queue: QueueId);

    /// Allocates the id of an object whose events will be delivered on `queue`.
    fn new_object(&self, queue: QueueId) -> ObjectId;

    /// Releases an id. Events for the object that arrive afterwards are
    /// dropped.
    fn forget(&self, id: ObjectId);

    /// The protocol version of an object.
    fn version(&self, id: ObjectId) -> u32;

    fn send(&self, request: Request) -> Result<(), UsrConError>;

    fn flush(&self) -> Result<(), UsrConError>;

    /// Returns the events that have arrived for `queue`.
    ///
    /// With `Some(Duration::ZERO)` only events that have already been read
    /// are returned. Otherwise this waits until at least one event is
    /// available or the timeout expires. `None` waits forever.
    fn read_events(
        &self,
        queue: QueueId,
        timeout: Option<Duration>,
    ) -> Result<Vec<Event>, UsrConError>;
}

/// An event queue owned by one user of the connection.
pub struct UsrQueue {
    pub con: Arc<dyn WlTransport>,
    pub id: QueueId,
}

impl UsrQueue {
    pub fn new(con: &Arc<dyn WlTransport>, name: &str) -> Result<Self, UsrConError> {
        let id = con.create_queue(name)?;
        Ok(Self {
            con: con.clone(),
            id,
        })
    }

    pub fn new_id<T: From<ObjectId>>(&self) -> T {
        self.con.new_object(self.id).into()
    }

    pub fn version(&self, id: impl Into<ObjectId>) -> u32 {
        self.con.version(id.into())
    }

    pub fn request(&self, request: Request) -> Result<(), UsrConError> {
        let target = request.target();
        let destructor = request.is_destructor();
        self.con.send(request)?;
        if destructor {
            self.con.forget(target);
        }
        Ok(())
    }

    pub fn forget(&self, id: impl Into<ObjectId>) {
        self.con.forget(id.into());
    }

    pub fn flush(&self) -> Result<(), UsrConError> {
        self.con.flush()
    }

    /// Returns the events that have already been read without blocking.
    pub fn dispatch_pending(&self) -> Result<Vec<Event>, UsrConError> {
        self.con.read_events(self.id, Some(Duration::ZERO))
    }

    /// Flushes outgoing requests and waits for events.
    pub fn dispatch(&self, timeout: Option<Duration>) -> Result<Vec<Event>, UsrConError> {
        self.con.flush()?;
        self.con.read_events(self.id, timeout)
    }

    /// Creates a sync callback on this queue without waiting for it.
    pub fn sync(&self) -> Result<WlCallbackId, UsrConError> {
        let callback = self.new_id();
        self.request(Request::WlDisplaySync {
            self_id: WL_DISPLAY_ID,
            callback,
        })?;
        Ok(callback)
    }

    /// Waits until the compositor has processed all requests sent so far.
    ///
    /// Returns the events of this queue that arrived in the meantime.
    pub fn roundtrip(&self) -> Result<Vec<Event>, UsrConError> {
        let callback: ObjectId = self.sync()?.into();
        let mut events = vec![];
        let mut done = false;
        while !done {
            for event in self.dispatch(None)? {
                if event.object == callback
                    && matches!(event.body, EventBody::WlCallbackDone { .. })
                {
                    self.con.forget(callback);
                    done = true;
                } else {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }
}

impl Drop for UsrQueue {
    fn drop(&mut self) {
        self.con.destroy_queue(self.id);
    }
}
