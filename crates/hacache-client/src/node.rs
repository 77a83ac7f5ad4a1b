//! Connection parameters for a single cache or sentinel node.

use hacache_domain::{Auth, NodeAddress};
use redis::aio::MultiplexedConnection;
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisResult};

/// Build the connection parameters for `address` with the given handshake.
pub(crate) fn connection_info(address: &NodeAddress, auth: Auth<'_>) -> ConnectionInfo {
    let (username, password) = match auth {
        Auth::None => (None, None),
        Auth::Password(password) => (None, Some(password.to_string())),
        Auth::UserPassword { username, password } => {
            (Some(username.to_string()), Some(password.to_string()))
        }
    };

    ConnectionInfo {
        addr: ConnectionAddr::Tcp(address.host.clone(), address.port),
        redis: RedisConnectionInfo {
            username,
            password,
            ..Default::default()
        },
    }
}

/// Open a dedicated connection to one node.
pub(crate) async fn dial(
    address: &NodeAddress,
    auth: Auth<'_>,
) -> RedisResult<MultiplexedConnection> {
    Client::open(connection_info(address, auth))?
        .get_multiplexed_async_connection()
        .await
}
