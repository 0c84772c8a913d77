use tracing::Dispatch;

/// Log sink handed to the client and both transports.
///
/// Wraps an optional [`Dispatch`]. When none is injected, events go to the
/// process-wide default subscriber.
#[derive(Clone, Debug, Default)]
pub struct Logger {
    dispatch: Option<Dispatch>,
}

impl Logger {
    #[must_use]
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    /// Runs `f` with this logger's dispatcher as the default for the current thread.
    pub fn in_scope<T, F: FnOnce() -> T>(&self, f: F) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl From<Option<Dispatch>> for Logger {
    fn from(dispatch: Option<Dispatch>) -> Self {
        Self { dispatch }
    }
}
