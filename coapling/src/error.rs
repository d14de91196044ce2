use coapling_msg::Id;

/// The context that an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
  /// Registering a resource or an observer
  Registering,
  /// Sending the message with this id
  Sending(Id),
  /// Handling a received datagram
  Receiving,
  /// Sending notifications to observers
  Notifying,
  /// Retransmitting the message with this id
  Retransmitting(Id),
}

impl When {
  /// Construct a specific error from the context the error occurred in
  pub fn what<E>(self, what: What<E>) -> Error<E> {
    Error { when: self, what }
  }
}

/// An error encountered by the runtime, generic over the transport's error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error<E> {
  /// What happened?
  pub what: What<E>,
  /// What were we doing when it happened?
  pub when: When,
}

impl<E> Error<E> {
  /// Is this a codec error?
  pub fn msg_error(&self) -> Option<coapling_msg::Error> {
    match self.what {
      | What::Msg(e) => Some(e),
      | _ => None,
    }
  }
}

/// A contextless error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum What<E> {
  /// Building, encoding or decoding a packet failed
  Msg(coapling_msg::Error),
  /// The transport failed to send
  Transport(E),
  /// The clock failed to provide timing
  Clock,
  /// The resource table is full
  ResourcesFull,
  /// A resource is already registered at this path
  AlreadyRegistered,
  /// The history of unacknowledged confirmable messages is full
  HistoryFull,
  /// The observer table of a resource is full
  ObserversFull,
  /// An observe request carried more conditions than an observer can hold
  TooManyConditions,
  /// An observe request carried a condition that could not be decoded
  MalformedCondition,
  /// The converter failed to render a value into a payload
  PayloadFormat,
}
