//! Ornate Core
//!
//! Reactive binding layer for stateful host elements:
//!
//! - **Event Bus**: per-instance lifecycle and property-change events
//! - **Transformers**: typed parse/stringify/validate protocol between
//!   string attributes and typed values
//! - **Accessors**: `attr`, `prop` and `state` fields with reflection,
//!   equality short-circuiting and pre-upgrade value recovery
//! - **Lifecycle Mixin**: `enhance`/`define`, republishing host callbacks on
//!   the bus with a single init moment per instance across class chains
//! - **Decorators**: `reactive`, `subscribe`, `observe` and `debounce`
//!
//! # Example
//!
//! ```rust
//! use ornate_core::{number, ClassBuilder, Member};
//!
//! # fn main() -> ornate_core::Result<()> {
//! let mut builder = ClassBuilder::new("Meter");
//! let level = builder.attr(
//!     Member::accessor("level"),
//!     number().min(0.0).max(10.0),
//!     0.0,
//! )?;
//! builder.define("x-meter");
//! let meter = builder.build()?;
//!
//! let el = meter.create()?;
//! level.set(&el, 4.0)?;
//! assert_eq!(el.get_attribute("level").as_deref(), Some("4"));
//!
//! // Out-of-range attribute values are clamped
//! el.set_attribute("level", "22");
//! assert_eq!(level.get(&el), 10.0);
//!
//! // Out-of-range property writes are rejected
//! assert!(level.set(&el, -1.0).is_err());
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod bus;
pub mod class;
pub mod config;
pub mod debounce;
pub mod element;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod metadata;
pub mod method;
pub mod observe;
pub mod reactive;
pub mod registry;
pub mod scheduler;
pub mod side_table;
pub mod source;
pub mod state;
pub mod subscribe;
pub mod transformer;
pub mod transformers;


pub use accessor::{AttrOptions, Field};
pub use bus::{listen, trigger, BusListener, Event, EventBus, EventKind, RestoreReason};
pub use class::{ClassBuilder, ClassId, ElementClass, Member, MemberKind};
pub use config::{DebounceConfig, OrnateConfig, SchedulerConfig};
pub use debounce::{debounce_fn, Debounce};
pub use element::{Element, InstanceId, WeakElement};
pub use error::{OrnateError, Result, ValidationError};
pub use host::{CustomStateSet, ElementInternals, HostElement};
pub use lifecycle::{enhance, run_at_init, Enhanced, InitToken, Lifecycle, NoLifecycle};
pub use metadata::{ClassMetadata, FieldEntry, ManagedField};
pub use method::{Method, MethodFn, MethodId, Payload};
pub use observe::{ObserveOptions, ObserverCallback, ObserverFactory, PlatformObserver};
pub use reactive::ReactiveOptions;
pub use registry::{validate_tag, Registry};
pub use scheduler::{scheduler, set_scheduler, Job, LocalScheduler, Scheduler, TimerId};
pub use side_table::InstanceTable;
pub use source::{
    Deferred, DomEvent, EventListener, EventSource, EventTarget, ListenerId, Signal, SignalSource,
    SubscriberKey,
};
pub use state::{StateOptions, Truthy};
pub use subscribe::{ActivationWindow, Source, SubscribeOptions, SubscribeTarget, TargetSource};
pub use transformer::{Binding, ContentAttr, Transformer};
pub use transformers::*;
