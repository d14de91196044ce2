use ::std::io;
use ::std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use ::std::time::{Duration, Instant};

use embedded_time::rate::Fraction;

use crate::net::Transport;
use crate::time::{Millis, TimerEvent};

mod convert;

/// implementor of [`crate::platform::Platform`] for platforms that support `std`
#[derive(Debug, Clone, Copy)]
pub struct Std;

impl crate::platform::Platform for Std {
  type Transport = UdpTransport;
  type Timer = Timer;
  type Clock = Clock;
}

/// Implement [`embedded_time::Clock`] using [`std::time`] primitives
#[derive(Debug, Clone, Copy)]
pub struct Clock(Instant);

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  /// Create a new clock
  pub fn new() -> Self {
    Self(Instant::now())
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  // microseconds
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    let elapsed = Instant::now().duration_since(self.0);
    Ok(embedded_time::Instant::new(elapsed.as_micros() as u64))
  }
}

/// A queue of deadlines implementing [`crate::time::Timer`].
///
/// The application loop drains elapsed events with [`Timer::pop_elapsed`]
/// and hands them to [`CoapRadio::fire`](crate::radio::CoapRadio::fire).
#[derive(Debug, Default)]
pub struct Timer {
  queue: Vec<(Instant, TimerEvent)>,
}

impl Timer {
  /// Create an empty timer
  pub fn new() -> Self {
    Self::default()
  }

  /// The earliest pending deadline
  pub fn next_deadline(&self) -> Option<Instant> {
    self.queue.iter().map(|(at, _)| *at).min()
  }

  /// Remove and yield the earliest event whose deadline passed
  pub fn pop_elapsed(&mut self) -> Option<TimerEvent> {
    let now = Instant::now();
    let ix = self.queue
                 .iter()
                 .enumerate()
                 .filter(|(_, (at, _))| *at <= now)
                 .min_by_key(|(_, (at, _))| *at)
                 .map(|(ix, _)| ix)?;
    Some(self.queue.remove(ix).1)
  }
}

impl crate::time::Timer for Timer {
  fn schedule(&mut self, after: Millis, event: TimerEvent) {
    let embedded_time::duration::Milliseconds(ms) = after;
    self.queue.push((Instant::now() + Duration::from_millis(ms), event));
  }
}

/// A UDP socket implementing [`Transport`].
///
/// Peers are given small node ids the first time they are seen (or asked
/// for with [`UdpTransport::peer`]); up to `PEERS` addresses are remembered.
/// Node id 0 is this node.
#[derive(Debug)]
pub struct UdpTransport<const PEERS: usize = 16> {
  socket: UdpSocket,
  peers: [Option<no_std_net::SocketAddr>; PEERS],
}

impl<const PEERS: usize> UdpTransport<PEERS> {
  /// Bind a non-blocking socket to `addr`
  pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_nonblocking(true)?;
    Ok(Self { socket,
              peers: [None; PEERS] })
  }

  /// The address the socket is bound to
  pub fn local_addr(&self) -> io::Result<SocketAddr> {
    self.socket.local_addr()
  }

  /// The node id of `addr`, assigning one if it is new.
  ///
  /// `None` when every id is taken.
  pub fn peer(&mut self, addr: SocketAddr) -> Option<u16> {
    let addr = convert::to_no_std(addr);

    let ix = match self.peers.iter().position(|p| *p == Some(addr)) {
      | Some(ix) => ix,
      | None => {
        let ix = self.peers.iter().position(Option::is_none)?;
        self.peers[ix] = Some(addr);
        log::debug!(target: crate::logging::TARGET, "{} is node {}", addr, ix + 1);
        ix
      },
    };

    u16::try_from(ix + 1).ok()
  }

  /// The address of node `id`
  pub fn addr_of(&self, id: u16) -> Option<SocketAddr> {
    let ix = usize::from(id).checked_sub(1)?;
    self.peers
        .get(ix)
        .copied()
        .flatten()
        .map(convert::to_std)
  }

  /// Read a datagram into `buf`, yielding the sender's node id and
  /// the datagram's length
  pub fn recv(&mut self, buf: &mut [u8]) -> nb::Result<(u16, usize), io::Error> {
    let (n, addr) = self.socket.recv_from(buf).map_err(convert::io_to_nb)?;
    let id = self.peer(addr).ok_or_else(|| {
                               nb::Error::Other(io::Error::new(io::ErrorKind::Other,
                                                               "correspondent table full"))
                             })?;
    Ok((id, n))
  }
}

impl<const PEERS: usize> Transport for UdpTransport<PEERS> {
  type NodeId = u16;
  type Error = io::Error;

  fn id(&self) -> u16 {
    0
  }

  fn send(&mut self, to: u16, bytes: &[u8]) -> nb::Result<(), io::Error> {
    let addr = self.addr_of(to).ok_or_else(|| {
                                  nb::Error::Other(io::Error::new(io::ErrorKind::NotFound,
                                                                  "unknown node id"))
                                })?;
    self.socket
        .send_to(bytes, addr)
        .map(|_| ())
        .map_err(convert::io_to_nb)
  }
}
