use crate::net::Transport;
use crate::time::{Clock, Timer};

/// Bundles the collaborators a [`CoapRadio`](crate::radio::CoapRadio)
/// needs to run on a platform.
///
/// ```
/// use coapling::platform::Platform;
///
/// #[derive(Debug)]
/// struct Std;
///
/// # struct Timer;
/// # impl coapling::time::Timer for Timer {
/// #   fn schedule(&mut self, _: coapling::time::Millis, _: coapling::time::TimerEvent) {}
/// # }
/// impl Platform for Std {
///   type Transport = coapling::std::UdpTransport;
///   type Timer = Timer;
///   type Clock = coapling::std::Clock;
/// }
/// ```
pub trait Platform: Sized {
  /// Datagram transport
  type Transport: Transport;
  /// One-shot timer
  type Timer: Timer;
  /// Monotonic clock
  type Clock: Clock;
}

/// Peer id type of a platform's transport
pub type NodeId<P> = <<P as Platform>::Transport as Transport>::NodeId;

/// Error type of a platform's transport
pub type TransportError<P> = <<P as Platform>::Transport as Transport>::Error;
