//! SOA serial probe over UDP.

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use domain::base::iana::Rcode;
use domain::base::{Message, MessageBuilder, Name, ParsedName, Rtype};
use domain::rdata::Soa;
use rand_core::{OsRng, RngCore};
use tokio::{net::UdpSocket, time::timeout};
use tracing::debug;

use super::{resolve, types::SoaSerial};
use crate::{config::ZoneConfig, error::SyncError};

/// Asks the primary for the zone's SOA record and returns its serial.
///
/// Every failure, including a timeout, is reported as
/// [`SyncError::SerialUnavailable`] so a poll cycle can be skipped.
pub async fn fetch_serial(config: &ZoneConfig, limit: Duration) -> Result<SoaSerial, SyncError> {
    // the lookup counts against the same limit as the query
    let probe = async {
        let server = resolve::server_addr(&config.server_host, config.server_port)
            .await
            .map_err(SyncError::serial)?;
        query_soa(config, server).await
    };

    timeout(limit, probe).await.map_err(|_| {
        SyncError::serial(format!(
            "no answer from {} within {}ms",
            config.server_label(),
            limit.as_millis()
        ))
    })?
}

async fn query_soa(config: &ZoneConfig, server: SocketAddr) -> Result<SoaSerial, SyncError> {
    let zone = zone_name(config).map_err(SyncError::serial)?;
    let id = OsRng.next_u32() as u16;
    let request = build_query(&zone, id)?;

    let local: SocketAddr = if server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await.map_err(SyncError::serial)?;
    socket.connect(server).await.map_err(SyncError::serial)?;

    debug!(zone = %config.domain, server = %server, id, "sending SOA query");
    socket.send(&request).await.map_err(SyncError::serial)?;

    let mut buf = vec![0u8; 65_535];
    loop {
        let len = socket.recv(&mut buf).await.map_err(SyncError::serial)?;
        let Ok(response) = Message::from_octets(buf[..len].to_vec()) else {
            debug!(server = %server, len, "ignoring short datagram");
            continue;
        };
        if response.header().id() != id || !response.header().qr() {
            debug!(server = %server, "ignoring unrelated datagram");
            continue;
        }
        return serial_from_response(&response);
    }
}

pub(crate) fn zone_name(config: &ZoneConfig) -> Result<Name<Vec<u8>>, String> {
    Name::<Vec<u8>>::from_str(&config.domain)
        .map_err(|e| format!("invalid zone name '{}': {e}", config.domain))
}

fn build_query(zone: &Name<Vec<u8>>, id: u16) -> Result<Vec<u8>, SyncError> {
    let mut msg = MessageBuilder::new_vec();
    msg.header_mut().set_id(id);
    let mut msg = msg.question();
    msg.push((zone, Rtype::SOA)).map_err(SyncError::serial)?;
    Ok(msg.finish())
}

/// Extracts the serial of the first SOA record in the answer section.
fn serial_from_response(response: &Message<Vec<u8>>) -> Result<SoaSerial, SyncError> {
    let header = response.header();
    if header.tc() {
        return Err(SyncError::serial("truncated response"));
    }
    if header.rcode() != Rcode::NOERROR {
        return Err(SyncError::serial(format!(
            "server answered {}",
            header.rcode()
        )));
    }

    let answer = response.answer().map_err(SyncError::serial)?;
    for rr in answer {
        let rr = rr.map_err(SyncError::serial)?;
        if rr.rtype() != Rtype::SOA {
            continue;
        }
        if let Some(record) = rr
            .into_record::<Soa<ParsedName<_>>>()
            .map_err(SyncError::serial)?
        {
            return Ok(record.data().serial().into_int());
        }
    }

    Err(SyncError::serial("no SOA record in answer"))
}
