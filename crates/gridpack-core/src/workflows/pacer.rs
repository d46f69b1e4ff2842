use std::time::Duration;

/// Waits between submissions and polling passes.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

/// Blocks the current thread for the requested duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Pacer for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<F: FnMut(Duration)> Pacer for F {
    fn pause(&mut self, duration: Duration) {
        self(duration)
    }
}
