//! Observer callbacks for subsystems that depend on the session

use devlink_core::SessionSnapshot;

type ReadingHook = Box<dyn Fn(Option<f64>) + Send + Sync>;
type ReadyHook = Box<dyn Fn(&SessionSnapshot) + Send + Sync>;
type ResetHook = Box<dyn Fn() + Send + Sync>;

/// Callbacks run by the controller.
///
/// - reading hooks see every probe reading, promoted or not
/// - reset hooks run after promotion and after every teardown
/// - ready hooks run once per session, after the reset hooks
#[derive(Default)]
pub struct SessionHooks {
    reading: Vec<ReadingHook>,
    ready: Vec<ReadyHook>,
    reset: Vec<ResetHook>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_reading(mut self, hook: impl Fn(Option<f64>) + Send + Sync + 'static) -> Self {
        self.reading.push(Box::new(hook));
        self
    }

    pub fn on_ready(mut self, hook: impl Fn(&SessionSnapshot) + Send + Sync + 'static) -> Self {
        self.ready.push(Box::new(hook));
        self
    }

    pub fn on_reset(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.reset.push(Box::new(hook));
        self
    }

    pub(crate) fn notify_reading(&self, reading: Option<f64>) {
        for hook in &self.reading {
            hook(reading);
        }
    }

    pub(crate) fn notify_ready(&self, snapshot: &SessionSnapshot) {
        self.notify_reset();
        for hook in &self.ready {
            hook(snapshot);
        }
    }

    pub(crate) fn notify_reset(&self) {
        for hook in &self.reset {
            hook();
        }
    }
}

impl std::fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHooks")
            .field("reading", &self.reading.len())
            .field("ready", &self.ready.len())
            .field("reset", &self.reset.len())
            .finish()
    }
}
