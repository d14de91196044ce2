//! `coapling` is a small CoAP (draft-07) runtime for constrained nodes.
//!
//! It sits on top of [`coapling_msg`], which owns the packet codec, and adds:
//! - a reliability layer ([`radio::CoapRadio`]) that retransmits confirmable
//!   messages, answers duplicates and matches ACKs and RSTs,
//! - path based routing of requests to [`service::CoapService`]s,
//! - observable resources ([`observe::ObservableService`]) with conditional
//!   notifications.
//!
//! ## Platform
//! Nothing in this crate performs IO on its own. The datagram transport, the
//! one-shot timer and the clock are supplied through [`platform::Platform`];
//! received datagrams are handed to [`radio::CoapRadio::receive`] and elapsed
//! timers to [`radio::CoapRadio::fire`] from the application's own loop.
//!
//! With the `std` feature, [`std::UdpTransport`] and [`std::Clock`] provide
//! the transport and clock for hosted platforms.
//!
//! ## Allocation
//! All tables (registered resources, message histories, observers) have a
//! fixed capacity and report being full as an error instead of growing.

#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
// -
// style
#![allow(clippy::unused_unit)]
// -
// deny
#![deny(missing_docs)]
#![cfg_attr(not(test), deny(missing_debug_implementations))]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]
// -
// features
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc as std_alloc;


pub(crate) mod logging;

/// configuring runtime behavior
pub mod config;

/// runtime errors
pub mod error;

/// received messages as handed to services
pub mod message;

/// network abstractions
pub mod net;

/// observable resources and conditional observe
pub mod observe;

/// platform configuration
pub mod platform;

/// the reliability layer
pub mod radio;

/// customizable retransmission backoff
pub mod retry;

/// request routing
pub mod service;

/// time abstractions
pub mod time;

/// `std`-only coapling stuff
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub mod std;

pub use coapling_msg as msg;
