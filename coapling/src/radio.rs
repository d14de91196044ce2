use core::fmt;

use coapling_msg::{path_cmp,
                   CoapPacket,
                   Code,
                   Id,
                   OpaqueData,
                   PathCompare,
                   Type,
                   DEFAULT_STORAGE_SIZE,
                   HEADER_LEN};
use embedded_time::Clock as _;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tinyvec::ArrayVec;

use crate::config::Config;
use crate::error::{Error, What, When};
use crate::logging::{msg_summary, TARGET};
use crate::message::ReceivedMessage;
use crate::net::{RegId, Transport};
use crate::platform::{NodeId, Platform, TransportError};
use crate::retry::Backoff;
use crate::service::Service;
use crate::time::{millis_since_epoch, Timer, TimerEvent};

/// Number of resources a radio can route to
pub const MAX_RESOURCES: usize = 8;

/// Number of unacknowledged CON messages a radio keeps retransmitting
pub const SENT_HISTORY: usize = 8;

/// Number of received messages remembered for duplicate detection
pub const RECEIVED_HISTORY: usize = 16;

/// Largest datagram a [`CoapPacket`] can serialize to
const DGRAM_MAX: usize = HEADER_LEN + DEFAULT_STORAGE_SIZE + 1;

/// Errors yielded by a radio on platform `P`
pub type RadioError<P> = Error<TransportError<P>>;

/// A message received by a radio on platform `P`
pub type Received<P> = ReceivedMessage<NodeId<P>>;

/// Wrap a codec error that happened `when`
pub(crate) fn msg_error<P: Platform>(when: When) -> impl Fn(coapling_msg::Error) -> RadioError<P> {
  move |e| when.what(What::Msg(e))
}

/// What became of a received datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<N> {
  /// Ignored: not CoAP, sent by ourselves, or an ACK/RST nobody was waiting for
  Dropped,
  /// A message seen before; answered again if it was confirmable
  Duplicate,
  /// Malformed; an error response was sent if it was a request
  Rejected,
  /// Consumed by the runtime or a service
  Handled,
  /// A response to one of our requests, for the application to match by token
  Response(ReceivedMessage<N>),
}

#[derive(Debug, Clone, Copy, Default)]
struct Resource {
  id: RegId,
  path: &'static str,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sent<N> {
  to: N,
  packet: CoapPacket,
  backoff: Backoff,
}

#[derive(Debug, Clone, Copy, Default)]
struct Seen<N> {
  from: N,
  id: Id,
  response: Option<CoapPacket>,
}

/// # CoAP reliability layer
///
/// Owns the platform's transport, timer and clock, and on top of them:
/// - retransmits CON messages until they are acknowledged (or gives up),
/// - recognizes duplicate messages and answers them again,
/// - acknowledges CON messages, piggybacking responses where possible,
/// - routes requests to [`Service`]s, answering 4.04 when none accepts.
///
/// Services are owned by the application and lent to [`CoapRadio::receive`]
/// and [`CoapRadio::fire`].
pub struct CoapRadio<P: Platform> {
  transport: P::Transport,
  timer: P::Timer,
  clock: P::Clock,
  config: Config,
  rng: ChaCha8Rng,
  next_id: Id,
  next_token: u16,
  next_reg: u16,
  resources: ArrayVec<[Resource; MAX_RESOURCES]>,
  sent: ArrayVec<[Sent<NodeId<P>>; SENT_HISTORY]>,
  received: ArrayVec<[Seen<NodeId<P>>; RECEIVED_HISTORY]>,
}

impl<P: Platform> fmt::Debug for CoapRadio<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CoapRadio")
     .field("id", &self.transport.id())
     .field("config", &self.config)
     .field("resources", &self.resources)
     .field("unacked", &self.sent.len())
     .field("remembered", &self.received.len())
     .finish()
  }
}

impl<P: Platform> CoapRadio<P> {
  /// Create a radio; the initial message id and token counter are drawn
  /// from a generator seeded with [`Msg::prng_seed`](crate::config::Msg::prng_seed)
  pub fn new(transport: P::Transport, timer: P::Timer, clock: P::Clock, config: Config) -> Self {
    let mut rng = ChaCha8Rng::seed_from_u64(config.msg.prng_seed);
    let next_id = Id(rng.gen());
    let next_token = rng.gen();

    Self { transport,
           timer,
           clock,
           config,
           rng,
           next_id,
           next_token,
           next_reg: 0,
           resources: Default::default(),
           sent: Default::default(),
           received: Default::default() }
  }

  /// This node's id
  pub fn id(&self) -> NodeId<P> {
    self.transport.id()
  }

  /// Runtime config
  pub fn config(&self) -> Config {
    self.config
  }

  /// Borrow the transport
  pub fn transport(&self) -> &P::Transport {
    &self.transport
  }

  /// Mutably borrow the transport (e.g. to read datagrams from it)
  pub fn transport_mut(&mut self) -> &mut P::Transport {
    &mut self.transport
  }

  /// Mutably borrow the timer
  pub fn timer_mut(&mut self) -> &mut P::Timer {
    &mut self.timer
  }

  /// Borrow the clock
  pub fn clock(&self) -> &P::Clock {
    &self.clock
  }

  /// Milliseconds since the clock's epoch
  pub fn now_millis(&self) -> Result<u64, RadioError<P>> {
    self.clock
        .try_now()
        .ok()
        .and_then(millis_since_epoch)
        .ok_or(When::Receiving.what(What::Clock))
  }

  /// Schedule a timer event
  pub fn schedule(&mut self, after: crate::time::Millis, event: TimerEvent) {
    self.timer.schedule(after, event);
  }

  /// Register a resource path.
  ///
  /// Requests are only offered to services whose registration is current.
  pub fn register(&mut self, path: &'static str) -> Result<RegId, RadioError<P>> {
    let when = When::Registering;

    if self.resources
           .iter()
           .any(|r| path_cmp(r.path, path) == PathCompare::Equal)
    {
      return Err(when.what(What::AlreadyRegistered));
    }

    if self.resources.is_full() {
      log::warn!(target: TARGET, "cannot register /{}: resource table full", path.trim_start_matches('/'));
      return Err(when.what(What::ResourcesFull));
    }

    let id = RegId(self.next_reg);
    self.next_reg = self.next_reg.wrapping_add(1);
    self.resources.push(Resource { id, path });
    log::debug!(target: TARGET, "registered /{} as {:?}", path.trim_start_matches('/'), id);
    Ok(id)
  }

  /// Remove a registration, returning whether it existed
  pub fn unregister(&mut self, id: RegId) -> bool {
    let before = self.resources.len();
    self.resources.retain(|r| r.id != id);
    before != self.resources.len()
  }

  /// Is this registration current?
  pub fn is_registered(&self, id: RegId) -> bool {
    self.resources.iter().any(|r| r.id == id)
  }

  /// A fresh message id
  pub fn msg_id(&mut self) -> Id {
    let id = self.next_id;
    self.next_id = id.next();
    id
  }

  /// A fresh token: the configured token seed followed by a counter
  pub fn token(&mut self) -> OpaqueData {
    let n = self.next_token;
    self.next_token = n.wrapping_add(1);

    let [a, b] = self.config.msg.token_seed.to_be_bytes();
    let [c, d] = n.to_be_bytes();
    OpaqueData::new(&[a, b, c, d]).unwrap_or_default()
  }

  fn transmit(&mut self, to: NodeId<P>, packet: &CoapPacket, when: When) -> Result<(), RadioError<P>> {
    let mut buf = [0u8; DGRAM_MAX];
    let len = packet.serialize(&mut buf)
                    .map_err(msg_error::<P>(when))?;

    log::trace!(target: TARGET, "-> {:?} {}", to, msg_summary(packet).as_str());
    nb::block!(self.transport.send(to, &buf[..len])).map_err(|e| when.what(What::Transport(e)))
  }

  /// Send a packet as it is.
  ///
  /// CON messages are retransmitted until acknowledged; when the history of
  /// unacknowledged messages is full nothing is sent.
  pub fn send_coap_as_is(&mut self, to: NodeId<P>, packet: &CoapPacket) -> Result<(), RadioError<P>> {
    let when = When::Sending(packet.id());
    let confirmable = packet.ty() == Type::Con;

    if confirmable && self.sent.is_full() {
      log::warn!(target: TARGET, "not sending {:?}: too many unacknowledged messages", packet.id());
      return Err(when.what(What::HistoryFull));
    }

    self.transmit(to, packet, when)?;

    if confirmable {
      let backoff = Backoff::new(self.config.con.unacked_retry_strategy,
                                 self.config.con.max_attempts,
                                 &mut self.rng);
      self.timer
          .schedule(backoff.delay(), TimerEvent::Retransmit(packet.id()));
      self.sent.push(Sent { to,
                            packet: *packet,
                            backoff });
    }

    Ok(())
  }

  /// Send a packet with a fresh message id, returning the id
  pub fn send_coap_gen_msg_id(&mut self,
                              to: NodeId<P>,
                              mut packet: CoapPacket)
                              -> Result<Id, RadioError<P>> {
    packet.set_id(self.msg_id());
    self.send_coap_as_is(to, &packet).map(|_| packet.id())
  }

  /// Send a request with a fresh message id and token,
  /// returning the token its response will carry
  pub fn send_coap_gen_msg_id_token(&mut self,
                                    to: NodeId<P>,
                                    mut packet: CoapPacket)
                                    -> Result<OpaqueData, RadioError<P>> {
    let token = self.token();
    packet.set_token(&token)
          .map_err(msg_error::<P>(When::Sending(packet.id())))?;
    self.send_coap_gen_msg_id(to, packet).map(|_| token)
  }

  /// Respond to `msg` with `code` and `payload`.
  ///
  /// See [`CoapRadio::respond`].
  pub fn reply(&mut self,
               msg: &mut Received<P>,
               code: Code,
               payload: &[u8])
               -> Result<(), RadioError<P>> {
    let mut packet = CoapPacket::new();
    packet.set_code(code);
    packet.set_data(payload)
          .map_err(msg_error::<P>(When::Sending(msg.packet.id())))?;
    self.respond(msg, packet)
  }

  /// Send `response` as the response to `msg`, carrying its token.
  ///
  /// The response is piggybacked on an ACK when `msg` is CON and was not
  /// acknowledged yet; it is NON when `msg` is NON, and a new CON otherwise.
  /// It is sent again should `msg` arrive again.
  pub fn respond(&mut self,
                 msg: &mut Received<P>,
                 mut response: CoapPacket)
                 -> Result<(), RadioError<P>> {
    let when = When::Sending(msg.packet.id());
    response.set_token(&msg.packet.token())
            .map_err(msg_error::<P>(when))?;

    match (msg.packet.ty(), msg.ack_sent()) {
      | (Type::Con, false) => {
        response.set_type(Type::Ack);
        response.set_id(msg.packet.id());
      },
      | (Type::Non, _) => {
        response.set_type(Type::Non);
        response.set_id(self.msg_id());
      },
      | _ => {
        response.set_type(Type::Con);
        response.set_id(self.msg_id());
      },
    }

    self.send_coap_as_is(msg.from, &response)?;

    if response.ty() == Type::Ack {
      msg.set_ack_sent();
    }
    msg.set_response_sent();

    let (from, id) = (msg.from, msg.packet.id());
    if let Some(seen) = self.received
                            .iter_mut()
                            .find(|s| s.from == from && s.id == id)
    {
      seen.response = Some(response);
    }

    Ok(())
  }

  /// Acknowledge `msg` with an empty ACK, e.g. before a slow separate response
  pub fn ack(&mut self, msg: &mut Received<P>) -> Result<(), RadioError<P>> {
    let mut ack = CoapPacket::new();
    ack.set_type(Type::Ack);
    ack.set_id(msg.packet.id());
    self.transmit(msg.from, &ack, When::Sending(ack.id()))?;
    msg.set_ack_sent();
    Ok(())
  }

  fn remember(&mut self, from: NodeId<P>, id: Id) {
    if self.received.is_full() {
      self.received.remove(0);
    }

    self.received.push(Seen { from,
                              id,
                              response: None });
  }

  /// Handle a datagram received from `from`, offering requests to `services`
  /// in order until one accepts.
  pub fn receive(&mut self,
                 from: NodeId<P>,
                 bytes: &[u8],
                 services: &mut [&mut dyn Service<P>])
                 -> Result<Inbound<NodeId<P>>, RadioError<P>> {
    if from == self.transport.id() {
      log::trace!(target: TARGET, "dropping datagram from ourselves");
      return Ok(Inbound::Dropped);
    }

    let mut packet = CoapPacket::new();
    if let Err(e) = packet.parse_message(bytes) {
      return self.reject(from, &packet, e);
    }

    log::trace!(target: TARGET, "<- {:?} {}", from, msg_summary(&packet).as_str());

    match packet.ty() {
      | Type::Ack | Type::Reset => Ok(self.receive_ack_or_reset(from, packet, services)),
      | Type::Con | Type::Non => {
        let id = packet.id();
        match self.received.iter().find(|s| s.from == from && s.id == id) {
          | Some(seen) => {
            let stored = seen.response;
            self.receive_duplicate(from, &packet, stored)
          },
          | None => {
            self.remember(from, id);
            self.receive_new(from, packet, services)
          },
        }
      },
    }
  }

  fn reject(&mut self,
            from: NodeId<P>,
            packet: &CoapPacket,
            e: coapling_msg::Error)
            -> Result<Inbound<NodeId<P>>, RadioError<P>> {
    if e == coapling_msg::Error::NotCoap {
      log::warn!(target: TARGET, "dropping non-CoAP datagram from {:?}", from);
      return Ok(Inbound::Dropped);
    }

    log::warn!(target: TARGET, "rejecting message from {:?}: {}", from, e);

    let mut response = CoapPacket::new();
    match packet.ty() {
      | Type::Con if packet.is_request() => {
        response.set_type(Type::Ack);
        response.set_id(packet.id());
      },
      | Type::Non if packet.is_request() => {
        response.set_type(Type::Non);
        response.set_id(self.msg_id());
      },
      | _ => return Ok(Inbound::Dropped),
    }

    response.set_code(packet.error_context().code);
    response.set_data(e.diagnostic().as_bytes())
            .map_err(msg_error::<P>(When::Receiving))?;
    self.transmit(from, &response, When::Receiving)
        .map(|_| Inbound::Rejected)
  }

  fn receive_duplicate(&mut self,
                       from: NodeId<P>,
                       packet: &CoapPacket,
                       stored: Option<CoapPacket>)
                       -> Result<Inbound<NodeId<P>>, RadioError<P>> {
    log::debug!(target: TARGET, "duplicate {:?} from {:?}", packet.id(), from);

    if packet.ty() == Type::Con {
      let response = stored.unwrap_or_else(|| {
                             let mut ack = CoapPacket::new();
                             ack.set_type(Type::Ack);
                             ack.set_id(packet.id());
                             ack
                           });
      self.transmit(from, &response, When::Receiving)?;
    }

    Ok(Inbound::Duplicate)
  }

  fn receive_ack_or_reset(&mut self,
                          from: NodeId<P>,
                          packet: CoapPacket,
                          services: &mut [&mut dyn Service<P>])
                          -> Inbound<NodeId<P>> {
    let sent = self.sent
                   .iter()
                   .position(|s| s.to == from && s.packet.id() == packet.id())
                   .map(|ix| self.sent.remove(ix));

    match (packet.ty(), sent) {
      | (Type::Reset, Some(sent)) => {
        log::debug!(target: TARGET, "{:?} was reset by {:?}", packet.id(), from);
        let token = sent.packet.token();
        for svc in services.iter_mut() {
          svc.reset(self, from, token);
        }
        Inbound::Handled
      },
      | (Type::Ack, _) if packet.is_response() => {
        let mut msg = ReceivedMessage::new(packet, from);
        msg.set_ack_sent();
        Inbound::Response(msg)
      },
      | (Type::Ack, Some(_)) => Inbound::Handled,
      | (Type::Reset, None) => {
        // e.g. a reset answering a NON we did not keep
        let id = packet.id();
        let mut known = false;
        for svc in services.iter_mut() {
          known |= svc.reset_unmatched(self, from, id);
        }
        match known {
          | true => Inbound::Handled,
          | false => Inbound::Dropped,
        }
      },
      | _ => Inbound::Dropped,
    }
  }

  fn receive_new(&mut self,
                 from: NodeId<P>,
                 packet: CoapPacket,
                 services: &mut [&mut dyn Service<P>])
                 -> Result<Inbound<NodeId<P>>, RadioError<P>> {
    let mut msg = ReceivedMessage::new(packet, from);

    if packet.code().is_empty() {
      // CON ping
      if packet.ty() == Type::Con {
        let mut rst = CoapPacket::new();
        rst.set_type(Type::Reset);
        rst.set_id(packet.id());
        self.transmit(from, &rst, When::Receiving)?;
      }
      return Ok(Inbound::Handled);
    }

    if packet.is_request() {
      let mut handled = false;
      for svc in services.iter_mut() {
        let registered = svc.reg_id().map(|id| self.is_registered(id)).unwrap_or(false);
        if registered && svc.receive_coap(self, &mut msg) {
          handled = true;
          break;
        }
      }

      if !handled {
        log::debug!(target: TARGET, "no resource for {}", msg_summary(&packet).as_str());
        self.reply(&mut msg, Code::NOT_FOUND, &[])?;
      }

      if packet.ty() == Type::Con && !msg.ack_sent() {
        self.ack(&mut msg)?;
      }

      Ok(Inbound::Handled)
    } else if packet.is_response() {
      if packet.ty() == Type::Con {
        self.ack(&mut msg)?;
      }
      Ok(Inbound::Response(msg))
    } else {
      Ok(Inbound::Dropped)
    }
  }

  /// Handle a timer event that has elapsed.
  ///
  /// A `Retransmit` sends the message again, or gives up on it once every
  /// attempt was used, telling every service with [`Service::expired`].
  /// A `MaxAge` is handed to the service owning the registration.
  pub fn fire(&mut self,
              event: TimerEvent,
              services: &mut [&mut dyn Service<P>])
              -> Result<(), RadioError<P>> {
    match event {
      | TimerEvent::Retransmit(id) => self.retransmit(id, services),
      | TimerEvent::MaxAge(reg) => {
        for svc in services.iter_mut().filter(|s| s.reg_id() == Some(reg)) {
          svc.timer_fired(self, reg);
        }
        Ok(())
      },
    }
  }

  fn retransmit(&mut self,
                id: Id,
                services: &mut [&mut dyn Service<P>])
                -> Result<(), RadioError<P>> {
    let ix = match self.sent.iter().position(|s| s.packet.id() == id) {
      | Some(ix) => ix,
      // acknowledged in the meantime
      | None => return Ok(()),
    };

    match self.sent[ix].backoff.next_attempt() {
      | Some(delay) => {
        let Sent { to, packet, backoff } = self.sent[ix];
        log::debug!(target: TARGET,
                    "retransmitting {:?} to {:?} (attempt {})",
                    id,
                    to,
                    backoff.attempts().0);
        self.timer.schedule(delay, TimerEvent::Retransmit(id));
        self.transmit(to, &packet, When::Retransmitting(id))
      },
      | None => {
        let sent = self.sent.remove(ix);
        log::warn!(target: TARGET, "{:?} to {:?} was never acknowledged", id, sent.to);
        let token = sent.packet.token();
        for svc in services.iter_mut() {
          svc.expired(self, sent.to, token);
        }
        Ok(())
      },
    }
  }
}
