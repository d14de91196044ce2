use core::fmt;
use core::marker::PhantomData;

use coapling_msg::{path_cmp, CoapPacket, Id, OpaqueData, PathCompare};

use crate::logging::TARGET;
use crate::net::RegId;
use crate::platform::{NodeId, Platform};
use crate::radio::{CoapRadio, RadioError, Received};

/// Something the radio hands requests and events to.
///
/// Services are owned by the application and lent to
/// [`CoapRadio::receive`] and [`CoapRadio::fire`] as
/// `&mut [&mut dyn Service<P>]`.
pub trait Service<P: Platform> {
  /// The registration this service answers for, if it is registered
  fn reg_id(&self) -> Option<RegId>;

  /// Offer a request to this service.
  ///
  /// Returns `false` when the service does not accept it,
  /// in which case it is offered to the next one.
  fn receive_coap(&mut self, radio: &mut CoapRadio<P>, msg: &mut Received<P>) -> bool;

  /// A [`TimerEvent::MaxAge`](crate::time::TimerEvent::MaxAge)
  /// for this service's registration elapsed
  fn timer_fired(&mut self, _radio: &mut CoapRadio<P>, _reg: RegId) {}

  /// `peer` answered one of our confirmable messages, carrying `token`, with a reset
  fn reset(&mut self, _radio: &mut CoapRadio<P>, _peer: NodeId<P>, _token: OpaqueData) {}

  /// `peer` sent a reset for message `id`, which the radio was not
  /// retransmitting (e.g. a NON).
  ///
  /// Returns whether this service recognized the message.
  fn reset_unmatched(&mut self, _radio: &mut CoapRadio<P>, _peer: NodeId<P>, _id: Id) -> bool {
    false
  }

  /// `peer` never acknowledged one of our confirmable messages, carrying `token`
  fn expired(&mut self, _radio: &mut CoapRadio<P>, _peer: NodeId<P>, _token: OpaqueData) {}
}

/// Application code answering requests for a resource.
///
/// Implemented for closures:
/// ```
/// use coapling::msg::Code;
/// use coapling::platform::Platform;
/// use coapling::radio::{CoapRadio, Received};
/// use coapling::service::Handler;
///
/// fn hello<P: Platform>() -> impl Handler<P> {
///   |radio: &mut CoapRadio<P>, msg: &mut Received<P>| {
///     radio.reply(msg, Code::CONTENT, b"hello").ok();
///   }
/// }
/// ```
pub trait Handler<P: Platform> {
  /// Handle a request; responding is up to the handler.
  ///
  /// When the handler neither responds nor acknowledges a
  /// confirmable request, the radio acknowledges it afterwards.
  fn handle(&mut self, radio: &mut CoapRadio<P>, msg: &mut Received<P>);
}

impl<P, F> Handler<P> for F
  where P: Platform,
        F: FnMut(&mut CoapRadio<P>, &mut Received<P>)
{
  fn handle(&mut self, radio: &mut CoapRadio<P>, msg: &mut Received<P>) {
    self(radio, msg)
  }
}

/// # A resource
///
/// Accepts requests whose Uri-Path is the service's path and hands them to
/// its [`Handler`]; optionally also requests for any path below it.
///
/// ```
/// use coapling::msg::Code;
/// use coapling::platform::Platform;
/// use coapling::radio::{CoapRadio, Received};
/// use coapling::service::CoapService;
///
/// fn attach<P: Platform>(radio: &mut CoapRadio<P>) {
///   let mut sensors = CoapService::new(radio, "sensors", |radio: &mut CoapRadio<P>,
///                                                        msg: &mut Received<P>| {
///                       radio.reply(msg, Code::CONTENT, b"[]").ok();
///                     }).unwrap();
///   sensors.set_handle_subresources(true);
/// }
/// ```
pub struct CoapService<P, H> {
  path: &'static str,
  reg: Option<RegId>,
  subresources: bool,
  handler: H,
  __p: PhantomData<fn() -> P>,
}

impl<P, H> fmt::Debug for CoapService<P, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CoapService")
     .field("path", &self.path)
     .field("reg", &self.reg)
     .field("subresources", &self.subresources)
     .finish()
  }
}

impl<P: Platform, H: Handler<P>> CoapService<P, H> {
  /// Create a service and register `path` with `radio`
  pub fn new(radio: &mut CoapRadio<P>,
             path: &'static str,
             handler: H)
             -> Result<Self, RadioError<P>> {
    let mut svc = Self { path,
                         reg: None,
                         subresources: false,
                         handler,
                         __p: PhantomData };
    svc.register_at_radio(radio)?;
    Ok(svc)
  }

  /// The path this service answers for
  pub fn path(&self) -> &'static str {
    self.path
  }

  /// Whether requests for paths below this service's path are accepted too.
  ///
  /// Off by default.
  pub fn set_handle_subresources(&mut self, handle: bool) {
    self.subresources = handle;
  }

  /// Register (again) with `radio`, e.g. after [`CoapService::shutdown`]
  pub fn register_at_radio(&mut self, radio: &mut CoapRadio<P>) -> Result<RegId, RadioError<P>> {
    if let Some(reg) = self.reg.filter(|reg| radio.is_registered(*reg)) {
      return Ok(reg);
    }

    let reg = radio.register(self.path)?;
    self.reg = Some(reg);
    Ok(reg)
  }

  /// Unregister from `radio`; no more requests are delivered
  pub fn shutdown(&mut self, radio: &mut CoapRadio<P>) {
    if let Some(reg) = self.reg.take() {
      radio.unregister(reg);
      log::debug!(target: TARGET, "/{} shut down", self.path.trim_start_matches('/'));
    }
  }

  /// Would this service accept `packet`?
  pub fn accepts(&self, packet: &CoapPacket) -> bool {
    if !packet.is_request() {
      return false;
    }

    let path = match packet.uri_path() {
      | Ok(path) => path,
      | Err(_) => return false,
    };

    match path_cmp(self.path, path.as_str()) {
      | PathCompare::Equal => true,
      | PathCompare::RhsIsSubresource => self.subresources,
      | _ => false,
    }
  }

  /// Hand `msg` to the handler
  pub(crate) fn handle(&mut self, radio: &mut CoapRadio<P>, msg: &mut Received<P>) {
    self.handler.handle(radio, msg)
  }
}

impl<P: Platform, H: Handler<P>> Service<P> for CoapService<P, H> {
  fn reg_id(&self) -> Option<RegId> {
    self.reg
  }

  fn receive_coap(&mut self, radio: &mut CoapRadio<P>, msg: &mut Received<P>) -> bool {
    if !self.accepts(&msg.packet) {
      return false;
    }

    self.handle(radio, msg);
    true
  }
}
