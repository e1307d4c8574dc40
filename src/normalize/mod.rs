use crate::journal::RawEntry;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;

/// High-cardinality or low-value journal fields dropped from every record.
/// Compared against lowercased field names; everything not listed here is
/// indexed by default.
const FIELD_DENYLIST: [&str; 9] = [
    "_cap_effective",
    "_cmdline",
    "_exe",
    "_hostname",
    "_systemd_cgroup",
    "_systemd_slice",
    "_transport",
    "syslog_facility",
    "syslog_identifier",
];

const MESSAGE_FIELD: &str = "message";

/// Matches `indexed:key=value` tokens embedded in free-text messages, the
/// opt-in hook for application log lines to add structured fields.
const INDEXED_TOKEN_PATTERN: &str = "indexed:([[:word:]]+)=([[:graph:]]+)";

/// Flat field-name to value mapping, serialized as one JSON object per
/// shipped document. A BTreeMap keeps serialization deterministic, so
/// normalizing the same entry twice yields byte-identical JSON.
pub type NormalizedRecord = BTreeMap<String, String>;

/// Maps raw journal entries to flat records. Pure over its inputs; the
/// denylist and extraction regex are fixed process-wide configuration.
pub struct Normalizer {
    hostname: String,
    indexed_re: Regex,
}

impl Normalizer {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            indexed_re: Regex::new(INDEXED_TOKEN_PATTERN).unwrap(),
        }
    }

    /// Build the record for one entry: `ts` and `host` always present,
    /// field names lowercased, denylist applied, the trusted-field
    /// underscore prefix stripped, and `indexed:` tokens in the message
    /// promoted to top-level fields. A raw field name repeated within one
    /// entry keeps its last value.
    pub fn normalize(&self, entry: &RawEntry) -> NormalizedRecord {
        let mut record = NormalizedRecord::new();
        record.insert(
            "ts".to_string(),
            format_timestamp(entry_timestamp(entry)),
        );
        record.insert("host".to_string(), self.hostname.clone());

        for (name, value) in &entry.fields {
            let key = name.to_ascii_lowercase();
            if FIELD_DENYLIST.contains(&key.as_str()) {
                continue;
            }
            if key == MESSAGE_FIELD {
                record.insert(key, value.clone());
                for caps in self.indexed_re.captures_iter(value) {
                    record.insert(caps[1].to_string(), caps[2].to_string());
                }
            } else {
                record.insert(key.trim_start_matches('_').to_string(), value.clone());
            }
        }

        record
    }
}

/// Wall-clock timestamp of an entry, from its realtime microsecond count.
pub fn entry_timestamp(entry: &RawEntry) -> DateTime<Utc> {
    DateTime::from_timestamp(
        (entry.realtime_usec / 1_000_000) as i64,
        (entry.realtime_usec % 1_000_000) as u32 * 1_000,
    )
    .unwrap_or_default()
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
