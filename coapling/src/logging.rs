use core::fmt::Write;

use coapling_msg::Packet;
use tinyvec::ArrayVec;
use toad_writable::Writable;

pub(crate) const TARGET: &str = "coapling";

/// `CON GET /sensors/temp id=4 token=[ab, cd] 2 byte payload`
pub(crate) fn msg_summary<const N: usize>(msg: &Packet<N>) -> Writable<ArrayVec<[u8; 128]>> {
  let mut buf: Writable<ArrayVec<[u8; 128]>> = Default::default();
  write!(buf, "{} {} ", msg.ty(), msg.code()).ok();

  match msg.uri_path() {
    | Ok(path) if !path.is_empty() => write!(buf, "/{} ", path.as_str()).ok(),
    | _ => None,
  };

  write!(buf,
         "id={} token={:x?} {} byte payload",
         msg.id().0,
         &msg.token()[..],
         msg.data().len()).ok();
  buf
}

#[cfg(test)]
mod tests {
  use coapling_msg::{CoapPacket, Code, Id, OpaqueData, Type};

  use super::*;

  #[test]
  fn summary() {
    let mut p = CoapPacket::new();
    p.set_type(Type::Non);
    p.set_code(Code::GET);
    p.set_id(Id(9));
    p.set_uri_path("a/b").unwrap();
    p.set_token(&OpaqueData::new(&[0xab]).unwrap()).unwrap();
    p.set_data(b"xy").unwrap();

    assert_eq!(msg_summary(&p).as_str(),
               "NON 0.01 /a/b id=9 token=[ab] 2 byte payload");
  }

  #[test]
  fn summary_truncates_instead_of_failing() {
    let mut p = CoapPacket::new();
    p.set_uri_path(&"x".repeat(100)).unwrap();
    assert!(msg_summary(&p).as_str().starts_with("CON 0.00 /xxx"));
  }
}
