//! Rate-limited, multi-channel alerting.

pub mod alert;
pub mod channel;
pub mod email;
pub mod limiter;
pub mod notifier;
pub mod rules;
pub mod telegram;
pub mod template;
pub mod webhook;

pub use alert::{types, AlertOutcome, AlertStatus, ChannelStatus, RenderedAlert};
pub use channel::Channel;
pub use limiter::AlertLimiter;
pub use notifier::Notifier;
pub use rules::{Route, RuleSet};
