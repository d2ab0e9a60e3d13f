use std::str::FromStr;

use domain::base::{Name, Serial, Ttl};
use domain::rdata::Soa;
use domain::tsig::Algorithm;

use crate::config::{KeySecret, ZoneConfig};

pub(crate) const TEST_SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

pub(crate) fn test_config(port: u16) -> ZoneConfig {
    ZoneConfig {
        domain: "example.com.".into(),
        server_host: "127.0.0.1".into(),
        server_port: port,
        key_name: "transfer-key.".into(),
        key_secret: KeySecret::new(TEST_SECRET.to_vec()),
        key_algorithm: Algorithm::Sha256,
    }
}

pub(crate) fn test_soa(serial: u32) -> Soa<Name<Vec<u8>>> {
    let mname = Name::<Vec<u8>>::from_str("ns1.example.com.").unwrap();
    let rname = Name::<Vec<u8>>::from_str("hostmaster.example.com.").unwrap();
    let ttl = Ttl::from_secs(3600);
    Soa::new(mname, rname, Serial(serial), ttl, ttl, ttl, ttl)
}
