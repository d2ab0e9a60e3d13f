use std::collections::HashMap;

/// SOA serial number. Compared for equality only.
pub type SoaSerial = u32;

/// Zone contents as received from a transfer, grouped by owner name and
/// then by record type. Iteration follows transfer order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawZone {
    pub origin: String, // "example.com."
    pub serial: Option<SoaSerial>,
    pub nodes: Vec<RawNode>,
    index: HashMap<String, usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawNode {
    pub name: String, // "www.example.com."
    pub rrsets: Vec<RawRrset>,
}

/// All values of one type at one owner name. Holds each rdata once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRrset {
    pub rtype: String, // "A", "TXT", ...
    pub ttl: u32,
    pub rdatas: Vec<String>,
}

impl RawZone {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: fqdn(&origin.into()),
            ..Default::default()
        }
    }

    /// Adds one record, merging it into the node and rrset it belongs to.
    pub fn insert(&mut self, name: &str, rtype: &str, ttl: u32, rdata: impl Into<String>) {
        let name = fqdn(name);
        let idx = match self.index.get(&name) {
            Some(idx) => *idx,
            None => {
                self.nodes.push(RawNode {
                    name: name.clone(),
                    rrsets: Vec::new(),
                });
                self.index.insert(name, self.nodes.len() - 1);
                self.nodes.len() - 1
            }
        };
        self.nodes[idx].push(rtype, ttl, rdata.into());
    }

    pub fn record_count(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| &n.rrsets)
            .map(|rrset| rrset.rdatas.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl RawNode {
    fn push(&mut self, rtype: &str, ttl: u32, rdata: String) {
        match self.rrsets.iter_mut().find(|r| r.rtype == rtype) {
            Some(rrset) => {
                // an rrset shares one TTL; keep the lowest seen
                rrset.ttl = rrset.ttl.min(ttl);
                if !rrset.rdatas.contains(&rdata) {
                    rrset.rdatas.push(rdata);
                }
            }
            None => self.rrsets.push(RawRrset {
                rtype: rtype.to_string(),
                ttl,
                rdatas: vec![rdata],
            }),
        }
    }
}

impl RawRrset {
    /// Presentation form of the whole set, one `<ttl> IN <type> <rdata>`
    /// line per value.
    pub fn to_text(&self) -> String {
        self.rdatas
            .iter()
            .map(|rdata| format!("{} IN {} {}", self.ttl, self.rtype, rdata))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Lowercased name with exactly one trailing dot.
pub fn fqdn(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return ".".into();
    }
    format!("{}.", trimmed.to_ascii_lowercase())
}
