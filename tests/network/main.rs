//! Network integration tests: the TCP transport and the MQTT client driven
//! against a scripted loopback broker.

mod mqtt;
mod transport;
