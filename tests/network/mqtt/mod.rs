mod codec;
mod live;
mod pipeline;

use std::time::Duration;

use libmqtt::network::application::mqtt::{Client, Options};
use libmqtt::network::tcp::TcpConnector;

/// How long a test waits for the client to observe something.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Options with a quiet keepalive so tests only see the packets they script.
pub fn test_options() -> Options {
    Options {
        connect_timeout_ms: 2_000,
        subscribe_timeout_ms: 2_000,
        ping_interval_ms: 60_000,
        read_timeout_ms: 90_000,
        ..Options::default()
    }
}

/// A TCP client for `address` with `options`.
pub fn client_with(address: &str, client_id: &str, options: Options) -> Client {
    let connector = TcpConnector::with_timeout(options.connect_timeout());
    Client::with_connector(connector, address, client_id, options).expect("valid client settings")
}

/// A TCP client for `address` with [`test_options`].
pub fn client(address: &str, client_id: &str) -> Client {
    client_with(address, client_id, test_options())
}
