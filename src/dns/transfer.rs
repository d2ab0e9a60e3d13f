//! TSIG-signed AXFR over TCP.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use domain::base::iana::Rcode;
use domain::base::{Message, MessageBuilder, Name, ParsedName, Rtype};
use domain::rdata::ZoneRecordData;
use domain::rdata::tsig::Time48;
use domain::tsig::{ClientSequence, Key};
use rand_core::{OsRng, RngCore};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

use super::{resolve, soa::zone_name, types::RawZone};
use crate::{config::ZoneConfig, error::SyncError};

/// Runs a full zone transfer and collects every record into a [`RawZone`].
///
/// The request is signed with `key` and every response message is
/// validated against the same TSIG sequence. Nothing is returned unless
/// the closing SOA record has been received.
pub async fn perform_transfer(
    config: &ZoneConfig,
    key: Arc<Key>,
    limit: Duration,
) -> Result<RawZone, SyncError> {
    let transfer = async {
        let server = resolve::server_addr(&config.server_host, config.server_port)
            .await
            .map_err(SyncError::transfer)?;
        axfr(config, key, server).await
    };

    timeout(limit, transfer).await.map_err(|_| {
        SyncError::transfer(format!(
            "transfer from {} did not finish within {}ms",
            config.server_label(),
            limit.as_millis()
        ))
    })?
}

async fn axfr(config: &ZoneConfig, key: Arc<Key>, server: SocketAddr) -> Result<RawZone, SyncError> {
    let zone = zone_name(config).map_err(SyncError::transfer)?;
    let id = OsRng.next_u32() as u16;
    let (request, mut sequence) = build_request(&zone, id, key)?;

    let mut stream = TcpStream::connect(server)
        .await
        .map_err(|e| SyncError::transfer(format!("connect to {server}: {e}")))?;
    debug!(zone = %config.domain, server = %server, id, "requesting AXFR");
    write_frame(&mut stream, &request).await?;

    let mut collector = Collector::new(&config.domain);
    loop {
        let Some(frame) = read_frame(&mut stream).await? else {
            return Err(SyncError::transfer(format!(
                "connection closed after {} messages, transfer incomplete",
                collector.messages
            )));
        };
        let mut response = Message::from_octets(frame).map_err(SyncError::malformed)?;
        if response.header().id() != id {
            return Err(SyncError::transfer("response id does not match request"));
        }

        let rcode = response.header().rcode();
        if rcode == Rcode::NOTAUTH || rcode == Rcode::REFUSED {
            let detail = sequence
                .answer(&mut response, Time48::now())
                .err()
                .map(|e| format!(" ({e})"))
                .unwrap_or_default();
            return Err(SyncError::auth(format!("server answered {rcode}{detail}")));
        }
        if rcode != Rcode::NOERROR {
            return Err(SyncError::transfer(format!("server answered {rcode}")));
        }

        sequence
            .answer(&mut response, Time48::now())
            .map_err(|e| SyncError::auth(format!("response signature: {e}")))?;

        if collector.absorb(&response)? {
            break;
        }
    }

    sequence
        .done()
        .map_err(|e| SyncError::auth(format!("response signature: {e}")))?;
    debug!(
        zone = %config.domain,
        messages = collector.messages,
        records = collector.zone.record_count(),
        "AXFR complete"
    );
    Ok(collector.zone)
}

fn build_request(
    zone: &Name<Vec<u8>>,
    id: u16,
    key: Arc<Key>,
) -> Result<(Vec<u8>, ClientSequence<Arc<Key>>), SyncError> {
    let mut msg = MessageBuilder::new_vec();
    msg.header_mut().set_id(id);
    let mut msg = msg.question();
    msg.push((zone, Rtype::AXFR)).map_err(SyncError::transfer)?;
    let mut msg = msg.additional();
    let sequence =
        ClientSequence::request(key, &mut msg, Time48::now()).map_err(SyncError::transfer)?;
    Ok((msg.finish(), sequence))
}

async fn write_frame(stream: &mut TcpStream, msg: &[u8]) -> Result<(), SyncError> {
    let len = u16::try_from(msg.len()).map_err(|_| SyncError::transfer("request too large"))?;
    stream.write_u16(len).await.map_err(SyncError::transfer)?;
    stream.write_all(msg).await.map_err(SyncError::transfer)?;
    stream.flush().await.map_err(SyncError::transfer)
}

/// Reads one length-prefixed message. `None` on a clean end of stream.
async fn read_frame(stream: &mut TcpStream) -> Result<Option<Vec<u8>>, SyncError> {
    let len = match stream.read_u16().await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(SyncError::transfer(e)),
    };
    let mut buf = vec![0u8; len as usize];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| SyncError::transfer(format!("truncated message: {e}")))?;
    Ok(Some(buf))
}

/// Accumulates the records of an AXFR response stream.
struct Collector {
    zone: RawZone,
    messages: usize,
    finished: bool,
}

impl Collector {
    fn new(origin: &str) -> Self {
        Self {
            zone: RawZone::new(origin),
            messages: 0,
            finished: false,
        }
    }

    /// Adds the answer section of one message. Returns `true` once the
    /// closing SOA has been seen.
    fn absorb(&mut self, response: &Message<Vec<u8>>) -> Result<bool, SyncError> {
        self.messages += 1;
        for rr in response.answer().map_err(SyncError::malformed)? {
            let rr = rr.map_err(SyncError::malformed)?;
            let Some(record) = rr
                .into_record::<ZoneRecordData<_, ParsedName<_>>>()
                .map_err(SyncError::malformed)?
            else {
                continue;
            };
            if self.finished {
                return Err(SyncError::malformed("records after closing SOA"));
            }

            let rtype = record.rtype();
            if rtype == Rtype::SOA {
                if self.zone.serial.is_some() {
                    self.finished = true;
                    continue;
                }
                if let ZoneRecordData::Soa(soa) = record.data() {
                    self.zone.serial = Some(soa.serial().into_int());
                }
            } else if self.zone.serial.is_none() {
                return Err(SyncError::transfer("transfer did not start with SOA"));
            }

            self.zone.insert(
                &record.owner().to_string(),
                &rtype.to_string(),
                record.ttl().as_secs(),
                record.data().to_string(),
            );
        }
        Ok(self.finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::testing::{TEST_SECRET, test_config, test_soa};
    use crate::dns::tsig::signing_key;
    use domain::base::message_builder::AnswerBuilder;
    use domain::rdata::{A, Cname};
    use domain::tsig::{Algorithm, KeyName, ServerSequence};
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use tokio::net::TcpListener;

    fn server_key(secret: &[u8]) -> Arc<Key> {
        let name = KeyName::from_str("transfer-key.").unwrap();
        Arc::new(Key::new(Algorithm::Sha256, secret, name, None, None).unwrap())
    }

    fn name(s: &str) -> Name<Vec<u8>> {
        Name::<Vec<u8>>::from_str(s).unwrap()
    }

    enum Reply {
        /// Verify the request and stream the given messages, signed.
        Signed(Vec<Vec<Record>>),
        /// Answer without any signature.
        Unsigned(Vec<Record>),
        /// Unsigned, empty answer carrying an error code.
        Rcode(Rcode),
        /// Unsigned answer whose id does not echo the request.
        WrongId(Vec<Record>),
    }

    #[derive(Clone)]
    enum Record {
        Soa(u32),
        A(&'static str, [u8; 4]),
        Cname(&'static str, &'static str),
    }

    fn push_records(answer: &mut AnswerBuilder<Vec<u8>>, records: &[Record]) {
        let apex = name("example.com.");
        for record in records {
            match record {
                Record::Soa(serial) => answer.push((&apex, 3600, test_soa(*serial))).unwrap(),
                Record::A(owner, [a, b, c, d]) => answer
                    .push((name(owner), 300, A::new(Ipv4Addr::new(*a, *b, *c, *d))))
                    .unwrap(),
                Record::Cname(owner, target) => answer
                    .push((name(owner), 60, Cname::new(name(target))))
                    .unwrap(),
            }
        }
    }

    async fn serve(key: Arc<Key>, reply: Reply) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let len = stream.read_u16().await.unwrap();
            let mut buf = vec![0u8; len as usize];
            stream.read_exact(&mut buf).await.unwrap();
            let mut request = Message::from_octets(buf).unwrap();
            assert_eq!(request.sole_question().unwrap().qtype(), Rtype::AXFR);
            assert_eq!(
                request
                    .sole_question()
                    .unwrap()
                    .qname()
                    .to_string()
                    .trim_end_matches('.'),
                "example.com"
            );

            let mut frames = Vec::new();
            match reply {
                Reply::Signed(messages) => {
                    match ServerSequence::request(&key, &mut request, Time48::now()) {
                        Ok(Some(mut sequence)) => {
                            for records in messages {
                                let mut answer = MessageBuilder::new_vec()
                                    .start_answer(&request, Rcode::NOERROR)
                                    .unwrap();
                                push_records(&mut answer, &records);
                                let mut additional = answer.additional();
                                sequence.answer(&mut additional, Time48::now()).unwrap();
                                frames.push(additional.finish());
                            }
                        }
                        _ => {
                            let refused = MessageBuilder::new_vec()
                                .start_answer(&request, Rcode::NOTAUTH)
                                .unwrap();
                            frames.push(refused.finish());
                        }
                    }
                }
                Reply::Unsigned(records) => {
                    let mut answer = MessageBuilder::new_vec()
                        .start_answer(&request, Rcode::NOERROR)
                        .unwrap();
                    push_records(&mut answer, &records);
                    frames.push(answer.finish());
                }
                Reply::Rcode(rcode) => {
                    let answer = MessageBuilder::new_vec()
                        .start_answer(&request, rcode)
                        .unwrap();
                    frames.push(answer.finish());
                }
                Reply::WrongId(records) => {
                    let mut answer = MessageBuilder::new_vec()
                        .start_answer(&request, Rcode::NOERROR)
                        .unwrap();
                    answer
                        .header_mut()
                        .set_id(request.header().id().wrapping_add(1));
                    push_records(&mut answer, &records);
                    frames.push(answer.finish());
                }
            }

            for frame in frames {
                stream.write_u16(frame.len() as u16).await.unwrap();
                stream.write_all(&frame).await.unwrap();
            }
            stream.shutdown().await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn multi_message_transfer_is_collected() {
        let port = serve(
            server_key(TEST_SECRET),
            Reply::Signed(vec![
                vec![
                    Record::Soa(5),
                    Record::A("www.example.com.", [10, 0, 0, 1]),
                ],
                vec![
                    Record::A("www.example.com.", [10, 0, 0, 2]),
                    Record::Cname("alias.example.com.", "www.example.com."),
                    Record::Soa(5),
                ],
            ]),
        )
        .await;
        let config = test_config(port);
        let key = signing_key(&config).unwrap();

        let zone = perform_transfer(&config, key, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(zone.serial, Some(5));
        assert_eq!(zone.origin, "example.com.");
        assert_eq!(zone.nodes.len(), 3);
        assert_eq!(zone.nodes[0].name, "example.com.");
        assert_eq!(zone.nodes[0].rrsets[0].rtype, "SOA");
        assert_eq!(zone.nodes[0].rrsets[0].rdatas.len(), 1);

        let www = &zone.nodes[1];
        assert_eq!(www.name, "www.example.com.");
        assert_eq!(www.rrsets[0].rtype, "A");
        assert_eq!(www.rrsets[0].ttl, 300);
        assert_eq!(www.rrsets[0].rdatas, vec!["10.0.0.1", "10.0.0.2"]);

        let alias = &zone.nodes[2];
        assert_eq!(alias.name, "alias.example.com.");
        assert_eq!(alias.rrsets[0].rtype, "CNAME");
        assert_eq!(alias.rrsets[0].ttl, 60);
        assert!(alias.rrsets[0].rdatas[0].starts_with("www.example.com"));
    }

    #[tokio::test]
    async fn wrong_secret_is_an_authentication_failure() {
        let port = serve(
            server_key(b"a completely different secret!!!"),
            Reply::Signed(vec![vec![Record::Soa(5), Record::Soa(5)]]),
        )
        .await;
        let config = test_config(port);
        let key = signing_key(&config).unwrap();

        let err = perform_transfer(&config, key, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_auth(), "{err}");
    }

    #[tokio::test]
    async fn unsigned_answer_is_rejected() {
        let port = serve(
            server_key(TEST_SECRET),
            Reply::Unsigned(vec![Record::Soa(5), Record::Soa(5)]),
        )
        .await;
        let config = test_config(port);
        let key = signing_key(&config).unwrap();

        let err = perform_transfer(&config, key, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_auth(), "{err}");
    }

    #[tokio::test]
    async fn stream_ending_early_is_incomplete() {
        let port = serve(
            server_key(TEST_SECRET),
            Reply::Signed(vec![vec![
                Record::Soa(5),
                Record::A("www.example.com.", [10, 0, 0, 1]),
            ]]),
        )
        .await;
        let config = test_config(port);
        let key = signing_key(&config).unwrap();

        let err = perform_transfer(&config, key, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::TransferFailure(_)), "{err}");
    }

    #[tokio::test]
    async fn refused_connection_is_a_transfer_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = test_config(port);
        let key = signing_key(&config).unwrap();

        let err = perform_transfer(&config, key, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::TransferFailure(_)), "{err}");
    }

    async fn transfer_error(reply: Reply) -> SyncError {
        let port = serve(server_key(TEST_SECRET), reply).await;
        let config = test_config(port);
        let key = signing_key(&config).unwrap();
        perform_transfer(&config, key, Duration::from_secs(5))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn refused_is_an_authentication_failure() {
        let err = transfer_error(Reply::Rcode(Rcode::REFUSED)).await;
        assert!(err.is_auth(), "{err}");
        assert!(err.to_string().contains("REFUSED"), "{err}");
    }

    #[tokio::test]
    async fn other_error_codes_are_transfer_failures() {
        for rcode in [Rcode::SERVFAIL, Rcode::NOTIMP] {
            let err = transfer_error(Reply::Rcode(rcode)).await;
            assert!(matches!(err, SyncError::TransferFailure(_)), "{rcode}: {err}");
        }
    }

    #[tokio::test]
    async fn mismatched_response_id_is_rejected() {
        let err = transfer_error(Reply::WrongId(vec![Record::Soa(5), Record::Soa(5)])).await;
        assert!(
            matches!(&err, SyncError::TransferFailure(msg) if msg.contains("id")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn transfer_must_open_with_soa() {
        let err = transfer_error(Reply::Signed(vec![vec![
            Record::A("www.example.com.", [10, 0, 0, 1]),
            Record::Soa(5),
        ]]))
        .await;
        assert!(
            matches!(&err, SyncError::TransferFailure(msg) if msg.contains("start with SOA")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn records_after_closing_soa_are_malformed() {
        let err = transfer_error(Reply::Signed(vec![vec![
            Record::Soa(5),
            Record::A("www.example.com.", [10, 0, 0, 1]),
            Record::Soa(5),
            Record::A("late.example.com.", [10, 0, 0, 9]),
        ]]))
        .await;
        assert!(matches!(err, SyncError::MalformedZoneData(_)), "{err}");
    }

    #[tokio::test]
    async fn name_lookup_shares_the_transfer_limit() {
        let mut config = test_config(53);
        config.server_host = "ns1.does-not-exist.invalid".into();
        let key = signing_key(&config).unwrap();

        let err = perform_transfer(&config, key, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, SyncError::TransferFailure(msg) if msg.contains("within 0ms")),
            "{err}"
        );
    }
}
