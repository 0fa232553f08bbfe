use std::{
    any::{Any, TypeId},
    fmt::Debug,
    hash::{Hash, Hasher},
    io,
    net::{IpAddr, SocketAddr, TcpListener},
};

/// Creates the listening sockets used by the management runtime.
///
/// The runtime compares factories to decide whether the registry and the
/// connector may share a socket. Equality is by concrete type only, see the
/// `PartialEq` impl on `dyn ServerSocketFactory`.
pub trait ServerSocketFactory: Send + Sync + Debug + 'static {
    fn create_server_socket(&self, port: u16) -> io::Result<TcpListener>;

    fn as_any(&self) -> &dyn Any;
}

impl PartialEq for dyn ServerSocketFactory {
    fn eq(&self, other: &Self) -> bool {
        self.as_any().type_id() == other.as_any().type_id()
    }
}

impl Eq for dyn ServerSocketFactory {}

impl Hash for dyn ServerSocketFactory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_any().type_id().hash(state);
    }
}

/// Socket factory that binds every socket to one fixed address.
#[derive(Debug, Clone, Copy)]
pub struct BoundSocketFactory {
    address: IpAddr,
}

impl BoundSocketFactory {
    pub fn new(address: IpAddr) -> Self {
        Self { address }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }
}

impl ServerSocketFactory for BoundSocketFactory {
    fn create_server_socket(&self, port: u16) -> io::Result<TcpListener> {
        TcpListener::bind(SocketAddr::new(self.address, port))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// The wrapped address is deliberately not part of equality or hashing.
impl PartialEq for BoundSocketFactory {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for BoundSocketFactory {}

impl Hash for BoundSocketFactory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        TypeId::of::<Self>().hash(state);
    }
}

/// Listens on every IPv4 interface; a second factory kind for tests.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) struct WildcardSocketFactory;

#[cfg(test)]
impl ServerSocketFactory for WildcardSocketFactory {
    fn create_server_socket(&self, port: u16) -> io::Result<TcpListener> {
        TcpListener::bind(SocketAddr::new(
            IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            port,
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashSet, hash_map::DefaultHasher},
        net::{Ipv4Addr, Ipv6Addr},
        sync::Arc,
        thread,
    };

    use super::*;

    fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_socket_bound_to_factory_address() {
        let address = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let factory = BoundSocketFactory::new(address);

        let reserved = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = reserved.local_addr().unwrap().port();
        drop(reserved);

        let listener = factory.create_server_socket(port).unwrap();
        let local = listener.local_addr().unwrap();
        assert_eq!(local.ip(), address);
        assert_eq!(local.port(), port);
    }

    #[test]
    fn test_port_zero_picks_free_port() {
        let factory = BoundSocketFactory::new(IpAddr::V4(Ipv4Addr::LOCALHOST));

        let listener = factory.create_server_socket(0).unwrap();
        let local = listener.local_addr().unwrap();
        assert_eq!(local.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn test_port_in_use_is_raw_io_error() {
        let factory = BoundSocketFactory::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let first = factory.create_server_socket(0).unwrap();
        let port = first.local_addr().unwrap().port();

        let err = factory.create_server_socket(port).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[test]
    fn test_factories_on_different_addresses_are_equal() {
        let a = BoundSocketFactory::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let b = BoundSocketFactory::new(IpAddr::V6(Ipv6Addr::new(
            0x2001, 0xdb8, 0, 0, 0, 0, 0, 1,
        )));

        assert_ne!(a.address(), b.address());
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_trait_object_equality_is_by_kind() {
        let a: Arc<dyn ServerSocketFactory> =
            Arc::new(BoundSocketFactory::new(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        let b: Arc<dyn ServerSocketFactory> =
            Arc::new(BoundSocketFactory::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        let wildcard: Arc<dyn ServerSocketFactory> = Arc::new(WildcardSocketFactory);

        assert!(*a == *b);
        assert_eq!(hash_of(&*a), hash_of(&*b));
        assert!(*a != *wildcard);
    }

    #[test]
    fn test_concurrent_sockets_bind_fixed_address() {
        let address = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let factory = Arc::new(BoundSocketFactory::new(address));

        let listeners = thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    let factory = factory.clone();
                    scope.spawn(move || factory.create_server_socket(0).unwrap())
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        let mut ports = HashSet::new();
        for listener in &listeners {
            let local = listener.local_addr().unwrap();
            assert_eq!(local.ip(), address);
            assert!(ports.insert(local.port()));
        }
        assert_eq!(ports.len(), 8);
    }
}
