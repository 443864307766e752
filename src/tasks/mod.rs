//! Background Tasks Module
//!
//! Contains the work the store runs off the caller's thread.
//!
//! # Tasks
//! - Expiration: removes expired entries on an adaptive schedule
//! - Notification: delivers expired entries to the `on_expire` callback

mod expiration;
mod notify;

pub(crate) use expiration::spawn_expiration_task;
pub(crate) use notify::{Notifier, OnExpire};
