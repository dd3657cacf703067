//! A minimal single-threaded, cooperative event loop.
//!
//! Every asynchronous boundary in this crate (all simulated block I/O) goes
//! through [EventLoop::schedule] rather than invoking its callback inline.
//! This keeps the call-stack shallow regardless of how many levels a scan
//! touches, and it means a caller driving [crate::scan::Scan] can always
//! assume `seek`/`fetch` return before their callback runs, even when the
//! underlying read was already sitting in the page cache.

type Job = Box<dyn FnOnce(&mut EventLoop)>;

/// FIFO queue of deferred callbacks. There is no threading here: `run_once`
/// and `run_until_idle` are meant to be driven by the same thread that owns
/// the scan, typically a test harness or an outer request loop.
#[derive(Default)]
pub struct EventLoop {
    jobs: Vec<Job>,
}

impl EventLoop {
    pub fn new() -> EventLoop {
        EventLoop { jobs: Vec::new() }
    }

    /// Defer `job` to run on a later turn of the loop. Never invoked
    /// synchronously by this method itself.
    pub fn schedule<F>(&mut self, job: F)
    where
        F: FnOnce(&mut EventLoop) + 'static,
    {
        self.jobs.push(Box::new(job));
    }

    /// Run exactly one pending job, if any. Returns whether a job ran.
    pub fn run_once(&mut self) -> bool {
        if self.jobs.is_empty() {
            return false;
        }
        let job = self.jobs.remove(0);
        job(self);
        true
    }

    /// Drain the queue, running jobs (including ones they schedule) until
    /// none remain.
    pub fn run_until_idle(&mut self) {
        while self.run_once() {}
    }

    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.jobs.len()
    }
}

#[cfg(test)]
mod event_loop_test {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn test_schedule_runs_later_not_now() {
        let mut el = EventLoop::new();
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        el.schedule(move |_| *ran2.borrow_mut() = true);
        assert!(!*ran.borrow(), "callback must not run synchronously");
        el.run_once();
        assert!(*ran.borrow());
    }

    #[test]
    fn test_nested_schedule_drains_to_idle() {
        let mut el = EventLoop::new();
        let count = Rc::new(RefCell::new(0));

        fn step(el: &mut EventLoop, count: Rc<RefCell<i32>>) {
            *count.borrow_mut() += 1;
            if *count.borrow() < 5 {
                let count = count.clone();
                el.schedule(move |el| step(el, count));
            }
        }

        let count2 = count.clone();
        el.schedule(move |el| step(el, count2));
        el.run_until_idle();

        assert_eq!(*count.borrow(), 5);
        assert!(el.is_idle());
    }
}
