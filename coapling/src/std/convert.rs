use ::std::io;
use ::std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};

pub(super) fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

fn ip_to_no_std(ip: IpAddr) -> no_std_net::IpAddr {
  match ip {
    | IpAddr::V4(ip) => {
      let [a, b, c, d] = ip.octets();
      no_std_net::IpAddr::V4(no_std_net::Ipv4Addr::new(a, b, c, d))
    },
    | IpAddr::V6(ip) => {
      let [a, b, c, d, e, f, g, h] = ip.segments();
      no_std_net::IpAddr::V6(no_std_net::Ipv6Addr::new(a, b, c, d, e, f, g, h))
    },
  }
}

fn ip_to_std(ip: no_std_net::IpAddr) -> IpAddr {
  match ip {
    | no_std_net::IpAddr::V4(ip) => {
      let [a, b, c, d] = ip.octets();
      IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    },
    | no_std_net::IpAddr::V6(ip) => {
      let [a, b, c, d, e, f, g, h] = ip.segments();
      IpAddr::V6(Ipv6Addr::new(a, b, c, d, e, f, g, h))
    },
  }
}

pub(super) fn to_no_std(addr: SocketAddr) -> no_std_net::SocketAddr {
  match addr {
    | SocketAddr::V4(v4) => no_std_net::SocketAddr::new(ip_to_no_std(IpAddr::V4(*v4.ip())), v4.port()),
    | SocketAddr::V6(v6) => match ip_to_no_std(IpAddr::V6(*v6.ip())) {
      | no_std_net::IpAddr::V6(ip) => {
        no_std_net::SocketAddrV6::new(ip, v6.port(), v6.flowinfo(), v6.scope_id()).into()
      },
      | ip => no_std_net::SocketAddr::new(ip, v6.port()),
    },
  }
}

pub(super) fn to_std(addr: no_std_net::SocketAddr) -> SocketAddr {
  match addr {
    | no_std_net::SocketAddr::V4(v4) => {
      SocketAddr::new(ip_to_std(no_std_net::IpAddr::V4(*v4.ip())), v4.port())
    },
    | no_std_net::SocketAddr::V6(v6) => match ip_to_std(no_std_net::IpAddr::V6(*v6.ip())) {
      | IpAddr::V6(ip) => SocketAddrV6::new(ip, v6.port(), v6.flowinfo(), v6.scope_id()).into(),
      | ip => SocketAddr::new(ip, v6.port()),
    },
  }
}
