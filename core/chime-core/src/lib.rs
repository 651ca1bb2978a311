//! Core library for chime: decides, for each host lifecycle event, whether
//! exactly one outbound notification should fire, and with which session
//! title attached.
//!
//! The design-bearing pieces are the [`arbiter::Arbiter`] (debounce and
//! cancellation of racing idle/error outcomes) and the
//! [`resolver::TitleResolver`] (cache-first session title lookup). The
//! [`dispatch::Dispatcher`] fans a decision out to host-supplied
//! notification and sound sinks; it carries no timing logic of its own.

pub mod arbiter;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod resolver;

pub use arbiter::{Arbiter, Classification, Decision, DEBOUNCE_WINDOW, IDLE_GRACE};
pub use config::NotifyConfig;
pub use dispatch::{DispatchError, Dispatcher, Notifier, SoundPlayer};
pub use error::{ChimeError, Result};
pub use resolver::{
    LookedUpSession, LookupError, SessionLookup, SessionRecord, TitleResolver,
    DEFAULT_SESSION_TITLE,
};
