//! # Signal keys.
//!
//! A [`Signal`] is the key handlers subscribe under. The OS termination signals have
//! predefined constants; everything else is a free-form string agreed on by the beans.

use std::borrow::Cow;
use std::fmt;

/// Named coordination event delivered through the [`SignalDispatcher`](super::SignalDispatcher).
///
/// ```
/// use beanpod::Signal;
///
/// assert_eq!(Signal::TERMINATE.as_str(), "SIGTERM");
/// assert_eq!(Signal::from("reload"), Signal::new("reload"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signal(Cow<'static, str>);

impl Signal {
    /// Interrupt (Ctrl-C).
    pub const INTERRUPT: Signal = Signal(Cow::Borrowed("SIGINT"));
    /// Termination request.
    pub const TERMINATE: Signal = Signal(Cow::Borrowed("SIGTERM"));
    /// Quit.
    pub const QUIT: Signal = Signal(Cow::Borrowed("SIGQUIT"));

    /// Creates a signal key.
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Signal {
    fn from(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }
}

impl From<String> for Signal {
    fn from(key: String) -> Self {
        Self(Cow::Owned(key))
    }
}

impl From<&Signal> for Signal {
    fn from(sig: &Signal) -> Self {
        sig.clone()
    }
}
