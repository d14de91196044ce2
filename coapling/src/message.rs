use coapling_msg::CoapPacket;

/// A decoded message together with the peer it came from.
///
/// Tracks whether the runtime already acknowledged it and whether a response
/// went out, so that handlers, observable resources and the radio agree on
/// whether a piggybacked response is still possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedMessage<N> {
  /// The decoded message
  pub packet: CoapPacket,
  /// The peer that sent it
  pub from: N,
  ack_sent: bool,
  response_sent: bool,
}

impl<N> ReceivedMessage<N> {
  /// A message that was neither acknowledged nor answered yet
  pub fn new(packet: CoapPacket, from: N) -> Self {
    Self { packet,
           from,
           ack_sent: false,
           response_sent: false }
  }

  /// Has an ACK for this message been sent, empty or piggybacked?
  pub fn ack_sent(&self) -> bool {
    self.ack_sent
  }

  /// Record that an ACK was sent
  pub fn set_ack_sent(&mut self) {
    self.ack_sent = true;
  }

  /// Has a response to this message been sent?
  pub fn response_sent(&self) -> bool {
    self.response_sent
  }

  /// Record that a response was sent
  pub fn set_response_sent(&mut self) {
    self.response_sent = true;
  }
}
