use core::fmt::Debug;

/// Identifies a resource registered with a [`CoapRadio`](crate::radio::CoapRadio)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegId(pub u16);

/// A datagram transport
///
/// Peers are identified by small copyable ids rather than addresses so
/// that they can be stored in fixed-capacity tables; translating ids to
/// addresses is up to the implementor (see [`UdpTransport`](crate::std::UdpTransport)).
///
/// Inbound datagrams are not pulled by the runtime; the application reads
/// them and passes them to [`CoapRadio::receive`](crate::radio::CoapRadio::receive).
pub trait Transport {
  /// Peer identifier
  type NodeId: Copy + Eq + Default + Debug;

  /// The error yielded by transport operations
  type Error: Debug;

  /// This node's own id; datagrams that appear to come from it are dropped
  fn id(&self) -> Self::NodeId;

  /// Send a datagram to a peer
  fn send(&mut self, to: Self::NodeId, bytes: &[u8]) -> nb::Result<(), Self::Error>;
}
