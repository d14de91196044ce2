use core::fmt::{self, Write};

use coapling_msg::{CoapPacket, Code, Id, OpaqueData, Type, COAP_DEFAULT_MAX_AGE};
use embedded_time::duration::Milliseconds;
use tinyvec::ArrayVec;
use toad_writable::Writable;

use crate::error::{What, When};
use crate::logging::TARGET;
use crate::net::RegId;
use crate::platform::{NodeId, Platform, TransportError};
use crate::radio::{msg_error, CoapRadio, RadioError, Received};
use crate::service::{CoapService, Handler, Service};
use crate::time::TimerEvent;

mod condition;
pub use condition::{Condition, ConditionType, ObserveValue, Reliability, ValueType};

/// Number of observers an [`ObservableService`] can hold
pub const MAX_OBSERVERS: usize = 8;

/// Number of conditions an observer can attach
pub const MAX_CONDITIONS: usize = 4;

/// Buffer a status value is rendered into for a notification
pub type Payload = Writable<ArrayVec<[u8; 64]>>;

/// Renders a status value into a notification payload
pub type Converter<V> = fn(&V, &mut Payload) -> fmt::Result;

fn display<V: fmt::Display>(v: &V, out: &mut Payload) -> fmt::Result {
  write!(out, "{}", v)
}

/// A peer observing an [`ObservableService`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observer<N, V> {
  /// Who is observing
  pub peer: N,
  /// Token of the request that registered, carried by every notification
  pub token: OpaqueData,
  /// Message id of the latest notification
  pub last_mid: Id,
  /// When the latest notification was sent (ms since the clock's epoch)
  pub timestamp_ms: u64,
  /// The value the latest notification carried
  pub last_value: V,
  conditions: ArrayVec<[Condition; MAX_CONDITIONS]>,
}

impl<N, V: ObserveValue> Observer<N, V> {
  /// Conditions attached when registering
  pub fn conditions(&self) -> &[Condition] {
    &self.conditions
  }

  /// Is a notification of `new` due at `now_ms`?
  pub fn due(&self, new: V, now_ms: u64) -> bool {
    let elapsed = now_ms.saturating_sub(self.timestamp_ms);
    self.conditions
        .iter()
        .all(|c| c.holds(new, self.last_value, elapsed))
  }

  /// Should notifications to this observer be confirmable?
  ///
  /// `default` applies unless conditions are attached,
  /// in which case any condition asking for CON wins.
  pub fn confirmable(&self, default: bool) -> bool {
    if self.conditions.is_empty() {
      default
    } else {
      self.conditions
          .iter()
          .any(|c| c.reliability == Reliability::Con)
    }
  }
}

/// # Observable resource
///
/// A [`CoapService`] publishing a status value to observers.
///
/// - A GET with the Observe option registers the sender as an observer and
///   is answered with a notification of the current status.
/// - A GET without it (or with a cancellation condition) unregisters the
///   sender and is handed to the request handler, as is every other request.
/// - [`ObservableService::set_status`] notifies every observer whose
///   conditions hold for the new value.
/// - When Max-Age runs out without a new status, every observer is sent a
///   fresh notification.
/// - Observers that reset or never acknowledge a notification are dropped.
pub struct ObservableService<P: Platform, V: ObserveValue, H, F = Converter<V>> {
  service: CoapService<P, H>,
  status: V,
  max_age: u32,
  confirmable: bool,
  observers: ArrayVec<[Observer<NodeId<P>, V>; MAX_OBSERVERS]>,
  counter: u32,
  pending_max_age: u16,
  convert: F,
}

impl<P, V, H, F> fmt::Debug for ObservableService<P, V, H, F>
  where P: Platform,
        V: ObserveValue + fmt::Debug
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ObservableService")
     .field("service", &self.service)
     .field("status", &self.status)
     .field("max_age", &self.max_age)
     .field("confirmable", &self.confirmable)
     .field("observers", &self.observers)
     .field("counter", &self.counter)
     .finish()
  }
}

impl<P, V, H> ObservableService<P, V, H>
  where P: Platform,
        V: ObserveValue + fmt::Display,
        H: Handler<P>
{
  /// Create an observable resource at `path`, rendering the status
  /// into payloads with its `Display` impl.
  ///
  /// Max-Age and notification confirmability default to
  /// [`Config::observe`](crate::config::Config::observe).
  pub fn new(radio: &mut CoapRadio<P>,
             path: &'static str,
             status: V,
             handler: H)
             -> Result<Self, RadioError<P>> {
    Self::with_converter(radio, path, status, handler, display::<V>)
  }
}

impl<P, V, H, F> ObservableService<P, V, H, F>
  where P: Platform,
        V: ObserveValue,
        H: Handler<P>,
        F: Fn(&V, &mut Payload) -> fmt::Result
{
  /// Create an observable resource at `path`, rendering the status
  /// into payloads with `convert`
  pub fn with_converter(radio: &mut CoapRadio<P>,
                        path: &'static str,
                        status: V,
                        handler: H,
                        convert: F)
                        -> Result<Self, RadioError<P>> {
    let config = radio.config().observe;
    let service = CoapService::new(radio, path, handler)?;

    Ok(Self { service,
              status,
              max_age: config.max_age_seconds,
              confirmable: config.notifications_confirmable,
              observers: Default::default(),
              counter: 1,
              pending_max_age: 0,
              convert })
  }

  /// The underlying service
  pub fn service(&self) -> &CoapService<P, H> {
    &self.service
  }

  /// The underlying service, e.g. to handle subresources
  pub fn service_mut(&mut self) -> &mut CoapService<P, H> {
    &mut self.service
  }

  /// The current status
  pub fn status(&self) -> V {
    self.status
  }

  /// Max-Age of notifications, in seconds
  pub fn max_age(&self) -> u32 {
    self.max_age
  }

  /// Set the Max-Age of notifications, in seconds.
  ///
  /// Observers are sent a fresh notification when it elapses
  /// without the status changing.
  pub fn set_max_age(&mut self, seconds: u32) {
    self.max_age = seconds;
  }

  /// Whether notifications after the first one are CON (or NON),
  /// for observers without conditions
  pub fn set_update_notification_confirmable(&mut self, confirmable: bool) {
    self.confirmable = confirmable;
  }

  /// The current observers
  pub fn observers(&self) -> &[Observer<NodeId<P>, V>] {
    &self.observers
  }

  /// Number of current observers
  pub fn observer_count(&self) -> usize {
    self.observers.len()
  }

  /// Register (again) with `radio`
  pub fn register_at_radio(&mut self, radio: &mut CoapRadio<P>) -> Result<RegId, RadioError<P>> {
    self.service.register_at_radio(radio)
  }

  /// Unregister from `radio` and forget every observer
  pub fn shutdown(&mut self, radio: &mut CoapRadio<P>) {
    self.service.shutdown(radio);
    self.observers.clear();
    self.pending_max_age = 0;
  }

  /// Publish a new status.
  ///
  /// Every observer whose conditions hold for `status` is notified,
  /// and a Max-Age refresh is scheduled.
  pub fn set_status(&mut self, radio: &mut CoapRadio<P>, status: V) -> Result<(), RadioError<P>> {
    self.status = status;
    self.counter = self.counter.wrapping_add(1);
    let notified = self.notify_observers(radio, false);
    self.schedule_max_age(radio);
    notified
  }

  fn schedule_max_age(&mut self, radio: &mut CoapRadio<P>) {
    if let Some(reg) = self.service.reg_id() {
      self.pending_max_age = self.pending_max_age.saturating_add(1);
      radio.schedule(Milliseconds(u64::from(self.max_age) * 1000),
                     TimerEvent::MaxAge(reg));
    }
  }

  fn notification(&self, token: &OpaqueData) -> Result<CoapPacket, RadioError<P>> {
    let when = When::Notifying;
    let msg = msg_error::<P>(when);

    let mut payload = Payload::default();
    (self.convert)(&self.status, &mut payload).map_err(|_| {
                                                 when.what::<TransportError<P>>(What::PayloadFormat)
                                               })?;

    let mut packet = CoapPacket::new();
    packet.set_code(Code::CONTENT);
    packet.set_observe(self.counter).map_err(&msg)?;
    packet.set_token(token).map_err(&msg)?;
    if self.max_age != COAP_DEFAULT_MAX_AGE {
      packet.set_max_age(self.max_age).map_err(&msg)?;
    }
    packet.set_data(payload.as_slice()).map_err(&msg)?;
    Ok(packet)
  }

  fn notify_observers(&mut self,
                      radio: &mut CoapRadio<P>,
                      unconditionally: bool)
                      -> Result<(), RadioError<P>> {
    let now = radio.now_millis()?;
    let status = self.status;
    let mut result = Ok(());

    for ix in 0..self.observers.len() {
      let observer = self.observers[ix];
      if !unconditionally && !observer.due(status, now) {
        continue;
      }

      let ty = match observer.confirmable(self.confirmable) {
        | true => Type::Con,
        | false => Type::Non,
      };
      let sent = self.notification(&observer.token).and_then(|mut packet| {
                                                     packet.set_type(ty);
                                                     radio.send_coap_gen_msg_id(observer.peer, packet)
                                                   });

      match sent {
        | Ok(id) => {
          let observer = &mut self.observers[ix];
          observer.last_mid = id;
          observer.timestamp_ms = now;
          observer.last_value = status;
        },
        | Err(e) => {
          log::warn!(target: TARGET, "notifying {:?} failed: {:?}", observer.peer, e);
          result = Err(e);
        },
      }
    }

    result
  }

  fn parse_conditions(packet: &CoapPacket)
                      -> Result<ArrayVec<[Condition; MAX_CONDITIONS]>, What<()>> {
    let mut conditions = ArrayVec::<[Condition; MAX_CONDITIONS]>::new();

    for raw in packet.conditions() {
      let condition = Condition::parse(raw).ok_or(What::<()>::MalformedCondition)?;
      if conditions.is_full() {
        return Err(What::<()>::TooManyConditions);
      }
      conditions.push(condition);
    }

    Ok(conditions)
  }

  fn receive_get(&mut self, radio: &mut CoapRadio<P>, msg: &mut Received<P>) {
    let peer = msg.from;

    let conditions = match Self::parse_conditions(&msg.packet) {
      | Ok(conditions) => conditions,
      | Err(what) => {
        log::warn!(target: TARGET, "rejecting observe request from {:?}: {:?}", peer, what);
        let diagnostic: &[u8] = match what {
          | What::TooManyConditions => b"too many conditions",
          | _ => b"malformed condition",
        };
        if let Err(e) = radio.reply(msg, Code::BAD_OPTION, diagnostic) {
          log::warn!(target: TARGET, "{:?}", e);
        }
        return;
      },
    };

    let cancel = conditions.iter()
                           .any(|c| c.ty == ConditionType::Cancellation);

    if msg.packet.observe().is_err() || cancel {
      let before = self.observers.len();
      self.observers.retain(|o| o.peer != peer);
      if self.observers.len() != before {
        log::debug!(target: TARGET, "{:?} stopped observing", peer);
      }

      self.service.handle(radio, msg);
      return;
    }

    if let Err(e) = self.register_observer(radio, msg, conditions) {
      log::warn!(target: TARGET, "could not register observer {:?}: {:?}", peer, e);
      if !msg.response_sent() && !matches!(e.what, What::ObserversFull) {
        if let Err(e) = radio.reply(msg, Code::INTERNAL_SERVER_ERROR, &[]) {
          log::warn!(target: TARGET, "{:?}", e);
        }
      }
    }
  }

  fn register_observer(&mut self,
                       radio: &mut CoapRadio<P>,
                       msg: &mut Received<P>,
                       conditions: ArrayVec<[Condition; MAX_CONDITIONS]>)
                       -> Result<(), RadioError<P>> {
    let now = radio.now_millis()?;
    let token = msg.packet.token();
    let existing = self.observers.iter().position(|o| o.peer == msg.from);

    if existing.is_none() && self.observers.is_full() {
      self.service.handle(radio, msg);
      return Err(When::Registering.what(What::ObserversFull));
    }

    let notification = self.notification(&token)?;
    radio.respond(msg, notification)?;

    let observer = Observer { peer: msg.from,
                              token,
                              last_mid: msg.packet.id(),
                              timestamp_ms: now,
                              last_value: self.status,
                              conditions };
    match existing {
      | Some(ix) => self.observers[ix] = observer,
      | None => {
        log::debug!(target: TARGET, "{:?} observing", msg.from);
        self.observers.push(observer);
      },
    }

    if self.pending_max_age == 0 {
      self.schedule_max_age(radio);
    }

    Ok(())
  }

  fn forget(&mut self, peer: NodeId<P>, token: OpaqueData) {
    let before = self.observers.len();
    self.observers
        .retain(|o| !(o.peer == peer && o.token == token));
    if self.observers.len() != before {
      log::debug!(target: TARGET, "dropped observer {:?}", peer);
    }
  }
}

impl<P, V, H, F> Service<P> for ObservableService<P, V, H, F>
  where P: Platform,
        V: ObserveValue,
        H: Handler<P>,
        F: Fn(&V, &mut Payload) -> fmt::Result
{
  fn reg_id(&self) -> Option<RegId> {
    self.service.reg_id()
  }

  fn receive_coap(&mut self, radio: &mut CoapRadio<P>, msg: &mut Received<P>) -> bool {
    if !self.service.accepts(&msg.packet) {
      return false;
    }

    if msg.packet.code() == Code::GET {
      self.receive_get(radio, msg);
    } else {
      self.service.handle(radio, msg);
    }

    true
  }

  fn timer_fired(&mut self, radio: &mut CoapRadio<P>, _: RegId) {
    self.pending_max_age = self.pending_max_age.saturating_sub(1);
    if self.pending_max_age > 0 || self.observers.is_empty() {
      return;
    }

    self.counter = self.counter.wrapping_add(1);
    if let Err(e) = self.notify_observers(radio, true) {
      log::warn!(target: TARGET, "max-age refresh failed: {:?}", e);
    }
    self.schedule_max_age(radio);
  }

  fn reset(&mut self, _: &mut CoapRadio<P>, peer: NodeId<P>, token: OpaqueData) {
    self.forget(peer, token);
  }

  fn reset_unmatched(&mut self, _: &mut CoapRadio<P>, peer: NodeId<P>, id: Id) -> bool {
    match self.observers
              .iter()
              .find(|o| o.peer == peer && o.last_mid == id)
    {
      | Some(o) => {
        let token = o.token;
        self.forget(peer, token);
        true
      },
      | None => false,
    }
  }

  fn expired(&mut self, _: &mut CoapRadio<P>, peer: NodeId<P>, token: OpaqueData) {
    self.forget(peer, token);
  }
}

#[cfg(test)]
mod tests {
  use coapling_msg::{Id, OptNumber};

  use super::*;
  use crate::radio::Inbound;
  use crate::test::{self, Test};

  type Sensor = ObservableService<Test, u32, fn(&mut CoapRadio<Test>, &mut Received<Test>)>;

  fn plain(radio: &mut CoapRadio<Test>, msg: &mut Received<Test>) {
    radio.reply(msg, Code::CONTENT, b"plain").unwrap();
  }

  fn sensor(radio: &mut CoapRadio<Test>, status: u32) -> Sensor {
    ObservableService::new(radio, "sensor", status, plain as fn(&mut CoapRadio<Test>, &mut Received<Test>)).unwrap()
  }

  fn get(id: u16, observe: Option<u32>, conditions: &[&[u8]]) -> Vec<u8> {
    let mut p = CoapPacket::new();
    p.set_code(Code::GET);
    p.set_id(Id(id));
    p.set_token(&OpaqueData::new(&[0xAB]).unwrap()).unwrap();
    p.set_uri_path("/sensor").unwrap();
    if let Some(n) = observe {
      p.set_observe(n).unwrap();
    }
    for c in conditions {
      p.add_condition(c).unwrap();
    }
    test::bytes(&p)
  }

  fn receive(radio: &mut CoapRadio<Test>, svc: &mut Sensor, from: u16, bytes: &[u8]) -> Inbound<u16> {
    radio.receive(from, bytes, &mut [svc]).unwrap()
  }

  #[test]
  fn observer_lifecycle() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 7);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[]));
    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 1);
    let (to, first) = sent[0];
    assert_eq!(to, 1);
    assert_eq!(first.ty(), Type::Ack);
    assert_eq!(first.id(), Id(1));
    assert_eq!(first.code(), Code::CONTENT);
    assert_eq!(first.observe(), Ok(1));
    assert_eq!(&first.token()[..], &[0xAB]);
    assert_eq!(first.data(), b"7");
    assert!(!first.is_set(OptNumber::MAX_AGE));
    assert_eq!(svc.observer_count(), 1);

    svc.set_status(&mut radio, 42).unwrap();
    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 1);
    let (to, second) = sent[0];
    assert_eq!(to, 1);
    assert_eq!(second.ty(), Type::Con);
    assert_eq!(second.observe(), Ok(2));
    assert_eq!(&second.token()[..], &[0xAB]);
    assert_eq!(second.data(), b"42");
    assert_eq!(svc.observers()[0].last_mid, second.id());

    receive(&mut radio, &mut svc, 1, &get(2, None, &[]));
    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.data(), b"plain");
    assert!(sent[0].1.observe().is_err());
    assert_eq!(svc.observer_count(), 0);

    svc.set_status(&mut radio, 43).unwrap();
    assert!(radio.transport_mut().take().is_empty());
  }

  #[test]
  fn resubscribing_updates_token() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[]));

    let mut again = CoapPacket::try_from_bytes(&get(2, Some(0), &[])).unwrap();
    again.set_token(&OpaqueData::new(&[1, 2]).unwrap()).unwrap();
    receive(&mut radio, &mut svc, 1, &test::bytes(&again));

    assert_eq!(svc.observer_count(), 1);
    assert_eq!(&svc.observers()[0].token[..], &[1, 2]);

    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].1.ty(), Type::Ack);
    assert_eq!(sent[1].1.id(), Id(2));
  }

  #[test]
  fn non_updates() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);
    svc.set_update_notification_confirmable(false);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[]));
    radio.transport_mut().take();

    svc.set_status(&mut radio, 1).unwrap();
    assert_eq!(radio.transport_mut().take()[0].1.ty(), Type::Non);
  }

  #[test]
  fn step_condition() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 10);

    // STEP, NON, integer threshold 5
    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[&[0b00100_0_00, 5]]));
    radio.transport_mut().take();

    svc.set_status(&mut radio, 12).unwrap();
    assert!(radio.transport_mut().take().is_empty());
    assert_eq!(svc.observers()[0].last_value, 10);

    svc.set_status(&mut radio, 16).unwrap();
    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.ty(), Type::Non);
    assert_eq!(sent[0].1.data(), b"16");
    assert_eq!(svc.observers()[0].last_value, 16);
  }

  #[test]
  fn con_condition_overrides_default() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);
    svc.set_update_notification_confirmable(false);

    // TIMESERIES, CON
    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[&[0b00001_1_00]]));
    radio.transport_mut().take();

    svc.set_status(&mut radio, 0).unwrap();
    assert!(radio.transport_mut().take().is_empty());

    svc.set_status(&mut radio, 1).unwrap();
    assert_eq!(radio.transport_mut().take()[0].1.ty(), Type::Con);
  }

  #[test]
  fn cancellation_condition_unregisters() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[]));
    receive(&mut radio, &mut svc, 1, &get(2, Some(0), &[&[0]]));
    assert_eq!(svc.observer_count(), 0);
    assert_eq!(radio.transport_mut().take()[1].1.data(), b"plain");
  }

  #[test]
  fn bad_conditions() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[&[0b01111_0_00]]));
    let c: &[u8] = &[0b00001_0_00];
    receive(&mut radio, &mut svc, 1, &get(2, Some(0), &[c, c, c, c, c]));

    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].1.code(), Code::BAD_OPTION);
    assert_eq!(sent[0].1.data(), b"malformed condition");
    assert_eq!(sent[1].1.code(), Code::BAD_OPTION);
    assert_eq!(sent[1].1.data(), b"too many conditions");
    assert_eq!(svc.observer_count(), 0);
  }

  #[test]
  fn full_table_falls_through() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);

    for peer in 1..=(MAX_OBSERVERS as u16) {
      receive(&mut radio, &mut svc, peer, &get(1, Some(0), &[]));
    }
    radio.transport_mut().take();

    receive(&mut radio, &mut svc, 100, &get(1, Some(0), &[]));
    assert_eq!(svc.observer_count(), MAX_OBSERVERS);
    assert!(svc.observers().iter().all(|o| o.peer != 100));
    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.data(), b"plain");
  }

  #[test]
  fn reset_drops_observer() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[]));
    svc.set_status(&mut radio, 1).unwrap();
    let notification = radio.transport_mut().take()[1].1;

    let mut rst = CoapPacket::new();
    rst.set_type(Type::Reset);
    rst.set_id(notification.id());
    assert_eq!(receive(&mut radio, &mut svc, 1, &test::bytes(&rst)),
               Inbound::Handled);
    assert_eq!(svc.observer_count(), 0);
  }

  #[test]
  fn reset_of_non_notification_drops_observer() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);
    svc.set_update_notification_confirmable(false);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[]));
    svc.set_status(&mut radio, 1).unwrap();
    let notification = radio.transport_mut().take()[1].1;
    assert_eq!(notification.ty(), Type::Non);

    let mut rst = CoapPacket::new();
    rst.set_type(Type::Reset);
    rst.set_id(Id(notification.id().0.wrapping_add(100)));
    assert_eq!(receive(&mut radio, &mut svc, 1, &test::bytes(&rst)),
               Inbound::Dropped);
    assert_eq!(svc.observer_count(), 1);

    rst.set_id(notification.id());
    assert_eq!(receive(&mut radio, &mut svc, 2, &test::bytes(&rst)),
               Inbound::Dropped);
    assert_eq!(svc.observer_count(), 1);

    assert_eq!(receive(&mut radio, &mut svc, 1, &test::bytes(&rst)),
               Inbound::Handled);
    assert_eq!(svc.observer_count(), 0);
  }

  #[test]
  fn unacknowledged_notifications_drop_observer() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[]));
    radio.timer_mut().take();
    svc.set_status(&mut radio, 1).unwrap();

    let retransmit = radio.timer_mut()
                          .take()
                          .into_iter()
                          .map(|(_, e)| e)
                          .find(|e| matches!(e, TimerEvent::Retransmit(_)))
                          .unwrap();

    for _ in 0..4 {
      radio.fire(retransmit, &mut [&mut svc]).unwrap();
    }
    assert_eq!(svc.observer_count(), 0);
  }

  #[test]
  fn max_age_refresh() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 5);
    svc.set_max_age(30);
    svc.set_update_notification_confirmable(false);

    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[]));
    let first = radio.transport_mut().take()[0].1;
    assert_eq!(first.max_age(), 30);

    let reg = svc.reg_id().unwrap();
    assert_eq!(radio.timer_mut().take(),
               vec![(Milliseconds(30_000), TimerEvent::MaxAge(reg))]);

    // a status change in between postpones the refresh
    svc.set_status(&mut radio, 6).unwrap();
    radio.transport_mut().take();
    radio.timer_mut().take();

    radio.fire(TimerEvent::MaxAge(reg), &mut [&mut svc]).unwrap();
    assert!(radio.transport_mut().take().is_empty());

    radio.fire(TimerEvent::MaxAge(reg), &mut [&mut svc]).unwrap();
    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.observe(), Ok(3));
    assert_eq!(sent[0].1.data(), b"6");
    assert_eq!(radio.timer_mut().take(),
               vec![(Milliseconds(30_000), TimerEvent::MaxAge(reg))]);
  }

  #[test]
  fn periodic_condition_follows_clock() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 3);

    // PERIODIC, NON, 2 seconds
    receive(&mut radio, &mut svc, 1, &get(1, Some(0), &[&[0b01001_0_01, 2]]));
    radio.transport_mut().take();

    svc.set_status(&mut radio, 3).unwrap();
    assert!(radio.transport_mut().take().is_empty());

    radio.clock().advance(1_999);
    svc.set_status(&mut radio, 3).unwrap();
    assert!(radio.transport_mut().take().is_empty());

    radio.clock().advance(1);
    svc.set_status(&mut radio, 3).unwrap();
    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.ty(), Type::Non);
    assert_eq!(svc.observers()[0].timestamp_ms, 2_000);

    radio.clock().advance(1_000);
    svc.set_status(&mut radio, 4).unwrap();
    assert!(radio.transport_mut().take().is_empty());
    assert_eq!(svc.observers()[0].last_value, 3);
  }

  #[test]
  fn failed_notification_registers_nobody() {
    let mut radio = test::radio();
    let long = |v: &u32, out: &mut Payload| match v {
      | 0 => write!(out, "{}", "x".repeat(100)),
      | v => write!(out, "{}", v),
    };
    let mut svc = ObservableService::with_converter(&mut radio,
                                                    "sensor",
                                                    0u32,
                                                    plain as fn(&mut CoapRadio<Test>, &mut Received<Test>),
                                                    long).unwrap();

    radio.receive(1, &get(1, Some(0), &[]), &mut [&mut svc]).unwrap();
    assert_eq!(svc.observer_count(), 0);

    let sent = radio.transport_mut().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.ty(), Type::Ack);
    assert_eq!(sent[0].1.code(), Code::INTERNAL_SERVER_ERROR);

    svc.set_status(&mut radio, 5).unwrap();
    assert!(radio.transport_mut().take().is_empty());

    radio.receive(1, &get(2, Some(0), &[]), &mut [&mut svc]).unwrap();
    assert_eq!(svc.observer_count(), 1);
    assert_eq!(&svc.observers()[0].token[..], &[0xAB]);
    assert_eq!(radio.transport_mut().take()[0].1.data(), b"5");
  }

  #[test]
  fn other_methods_reach_handler() {
    let mut radio = test::radio();
    let mut svc = sensor(&mut radio, 0);

    let mut put = CoapPacket::try_from_bytes(&get(1, Some(0), &[])).unwrap();
    put.set_code(Code::PUT);
    receive(&mut radio, &mut svc, 1, &test::bytes(&put));

    assert_eq!(radio.transport_mut().take()[0].1.data(), b"plain");
    assert_eq!(svc.observer_count(), 0);
  }

  #[test]
  fn custom_converter() {
    let mut radio = test::radio();
    let mut svc = ObservableService::with_converter(&mut radio,
                                                    "temp",
                                                    21.5f32,
                                                    plain as fn(&mut CoapRadio<Test>, &mut Received<Test>),
                                                    |v: &f32, out: &mut Payload| write!(out, "{:.1}C", v)).unwrap();

    let mut p = CoapPacket::try_from_bytes(&get(1, Some(0), &[])).unwrap();
    p.set_uri_path("temp").unwrap();
    radio.receive(1, &test::bytes(&p), &mut [&mut svc]).unwrap();

    assert_eq!(radio.transport_mut().take()[0].1.data(), b"21.5C");
  }
}
