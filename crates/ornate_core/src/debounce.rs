//! Debouncing
//!
//! A debounced function remembers only the latest call per context key and
//! runs it once the strategy's window closes. Earlier calls in the same
//! window are superseded and never run with stale arguments.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;
use std::time::Duration;

use crate::config::OrnateConfig;
use crate::element::{Element, WeakElement};
use crate::method::{MethodFn, Payload};
use crate::scheduler::{scheduler, Job, TimerId};

/// When a debounced call runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Debounce {
    /// After the current synchronous burst
    Microtask,
    /// Before the next animation frame
    AnimationFrame,
    /// After a fixed delay
    Timeout(Duration),
}

impl Default for Debounce {
    fn default() -> Self {
        Debounce::Microtask
    }
}

impl Debounce {
    /// `Timeout` with the configured default, or `Microtask` when it is zero
    pub fn configured(config: &OrnateConfig) -> Self {
        match config.debounce.default_timeout_ms {
            0 => Debounce::Microtask,
            ms => Debounce::Timeout(Duration::from_millis(ms)),
        }
    }

    /// Queue `job`, returning the timer that can cancel it
    fn schedule(self, job: Job) -> Option<TimerId> {
        let scheduler = scheduler();
        match self {
            Debounce::Microtask => {
                scheduler.queue_microtask(job);
                None
            }
            Debounce::AnimationFrame => {
                scheduler.request_animation_frame(job);
                None
            }
            Debounce::Timeout(delay) => Some(scheduler.set_timeout(delay, job)),
        }
    }
}

struct Pending<A> {
    generation: u64,
    args: Option<A>,
    /// Armed timeout for the latest call, cleared when superseded
    timer: Option<TimerId>,
}

/// Debounce `f` per key: only the last call for a key inside one window runs
pub fn debounce_fn<K, A, F>(strategy: Debounce, f: F) -> impl Fn(K, A)
where
    K: Hash + Eq + Clone + 'static,
    A: 'static,
    F: Fn(&K, A) + 'static,
{
    let f = Rc::new(f);
    let pending: Rc<RefCell<FxHashMap<K, Pending<A>>>> =
        Rc::new(RefCell::new(FxHashMap::default()));

    move |key: K, args: A| {
        let (generation, superseded) = {
            let mut pending = pending.borrow_mut();
            let entry = pending.entry(key.clone()).or_insert(Pending {
                generation: 0,
                args: None,
                timer: None,
            });
            entry.generation += 1;
            entry.args = Some(args);
            (entry.generation, entry.timer.take())
        };
        if let Some(id) = superseded {
            scheduler().clear_timeout(id);
        }

        let table = pending.clone();
        let slot = key.clone();
        let f = f.clone();
        let timer = strategy.schedule(Box::new(move || {
            let args = {
                let mut table = table.borrow_mut();
                match table.get(&slot) {
                    Some(entry) if entry.generation == generation => {
                        table.remove(&slot).and_then(|entry| entry.args)
                    }
                    _ => None,
                }
            };
            if let Some(args) = args {
                f(&slot, args);
            }
        }));

        if let Some(entry) = pending.borrow_mut().get_mut(&key) {
            if entry.generation == generation {
                entry.timer = timer;
            }
        }
    }
}

/// Debounce a method body per element
pub(crate) fn wrap_method(strategy: Debounce, original: MethodFn) -> MethodFn {
    let debounced = debounce_fn(strategy, move |element: &WeakElement, payload: Payload| {
        if let Some(element) = element.upgrade() {
            original(&element, &payload);
        }
    });
    Rc::new(move |element: &Element, payload: &Payload| {
        debounced(element.downgrade(), payload.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{set_scheduler, LocalScheduler};

    fn install() -> Rc<LocalScheduler> {
        let local = Rc::new(LocalScheduler::new());
        set_scheduler(local.clone());
        local
    }

    #[test]
    fn test_last_call_wins_per_key() {
        let local = install();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let debounced = debounce_fn(Debounce::Microtask, move |key: &&str, value: u32| {
            sink.borrow_mut().push(format!("{}={}", key, value))
        });

        debounced("a", 1);
        debounced("a", 2);
        debounced("b", 10);
        debounced("a", 3);
        assert!(log.borrow().is_empty());

        local.run_microtasks();
        assert_eq!(*log.borrow(), vec!["b=10", "a=3"]);

        debounced("a", 4);
        local.run_microtasks();
        assert_eq!(log.borrow().last().map(String::as_str), Some("a=4"));
    }

    #[test]
    fn test_timeout_window() {
        let local = install();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let debounced = debounce_fn(
            Debounce::Timeout(Duration::from_millis(50)),
            move |_: &(), value: u32| sink.borrow_mut().push(value),
        );

        debounced((), 1);
        local.advance(Duration::from_millis(30));
        debounced((), 2);
        local.advance(Duration::from_millis(30));
        assert!(calls.borrow().is_empty());
        local.advance(Duration::from_millis(30));
        assert_eq!(*calls.borrow(), vec![2]);
    }

    #[test]
    fn test_superseded_timeouts_are_cleared() {
        let local = install();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let debounced = debounce_fn(
            Debounce::Timeout(Duration::from_millis(50)),
            move |_: &(), value: u32| sink.borrow_mut().push(value),
        );

        for value in 0..1000 {
            debounced((), value);
        }
        assert_eq!(local.pending_timers(), 1);

        local.advance(Duration::from_millis(50));
        assert_eq!(*calls.borrow(), vec![999]);
        assert!(local.is_idle());
    }

    #[test]
    fn test_animation_frame_strategy() {
        let local = install();
        let calls = Rc::new(RefCell::new(0));
        let sink = calls.clone();
        let debounced = debounce_fn(Debounce::AnimationFrame, move |_: &u8, _: ()| {
            *sink.borrow_mut() += 1
        });

        debounced(0, ());
        debounced(0, ());
        local.run_microtasks();
        assert_eq!(*calls.borrow(), 0);
        local.run_frame();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_configured_strategy() {
        let config = OrnateConfig::default();
        assert_eq!(Debounce::configured(&config), Debounce::Microtask);

        let config = OrnateConfig::from_toml_str("[debounce]\ndefault_timeout_ms = 40\n").unwrap();
        assert_eq!(
            Debounce::configured(&config),
            Debounce::Timeout(Duration::from_millis(40))
        );
    }
}
