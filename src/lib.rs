//! # eeka
//!
//! Mouse chord remapping for X11 desktops.
//!
//! A physical mouse is grabbed through evdev. Holding one button while
//! pressing another (or scrolling) forms a *chord*, and chords bound in
//! the rule file are turned into key combinations sent to the window
//! under the pointer. Everything else is replayed unchanged on a uinput
//! virtual mouse, so normal clicking, dragging and scrolling keep working.
//!
//! ## Quick Start
//!
//! ```no_run
//! use eeka::{
//!     Controls, DispatchLoop, Engine, EvdevSource, UinputSink, XlibWindowSystem, config,
//! };
//!
//! # fn main() -> eeka::Result<()> {
//! let rules = config::load_or_default(None)?;
//! let source = EvdevSource::autodetect(&rules)?;
//! let sink = UinputSink::create()?;
//! let engine = Engine::new(XlibWindowSystem::connect()?, rules);
//!
//! DispatchLoop::new(engine, source, sink, Controls::new()).run()
//! # }
//! ```
//!
//! ## Architecture
//!
//! Each raw event flows one way: [`button::classify`] turns it into a
//! logical button, the [`Engine`] decides whether to block or forward it
//! (consulting a [`RuleStore`] and the [`WindowSystem`]), and the
//! [`DispatchLoop`] writes forwarded events to an [`OutputSink`]. The
//! engine and loop only see the collaborators through traits, so the
//! whole pipeline runs against the fakes in [`mock`] in tests.

pub mod action;
pub mod button;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod keycode;
pub mod mock;
pub mod rules;
pub mod runloop;
pub mod window;

mod platform;

// Re-exports
pub use action::{Action, BindingKey, Modifiers};
pub use button::{ButtonSet, LogicalButton, RawEvent};
pub use dispatch::{Dispatcher, Timing};
pub use engine::{ChordState, Engine, Verdict};
pub use error::{Error, Result};
pub use keycode::Key;
pub use rules::{RuleStore, Rules, WindowRule};
pub use runloop::{Controls, DispatchLoop, InputSource, OutputSink};
pub use window::{TargetWindow, WindowId, WindowSystem};

// Platform backends
#[cfg(feature = "x11")]
pub use platform::XlibWindowSystem;
#[cfg(feature = "evdev")]
pub use platform::{EvdevSource, UinputSink, VIRTUAL_DEVICE_NAME, find_pointer_device};
