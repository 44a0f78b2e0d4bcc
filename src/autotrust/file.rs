use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::autotrust::comments::{self, StateField};
use crate::autotrust::point::{TrustPoint, TrustPointData};
use crate::autotrust::state::{KeyEntry, KeyState};
use crate::dns::{DNSResourceClass, DNSResourceType, Name, RecordParser};
use crate::error::{AutotrustError, Result};

/// Contents of an anchor file, not yet registered in a store
#[derive(Debug, Clone)]
pub struct LoadedAnchor {
    pub name: Name,
    pub class: DNSResourceClass,
    pub data: TrustPointData,
}

/// Scheduling values kept in `;;` header lines
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Header {
    id: Option<(Name, DNSResourceClass)>,
    last_queried: Option<u64>,
    last_success: Option<u64>,
    next_probe_time: Option<u64>,
    query_failed: Option<u32>,
    query_interval: Option<u64>,
    retry_time: Option<u64>,
}

/// A line carries data when something other than blanks comes before the first `;`
fn contains_data(line: &str) -> bool {
    line.split(';')
        .next()
        .is_some_and(|data| data.chars().any(|c| !c.is_whitespace()))
}

/// Parse a `;;key: value` header line. Returns false if the line is not one.
fn parse_header_line(line: &str, header: &mut Header) -> Result<bool> {
    let Some(body) = line.strip_prefix(";;") else {
        return Ok(false);
    };
    let Some((key, rest)) = body.split_once(':') else {
        return Ok(false);
    };
    // Anything after the value is a human readable annotation
    let value = rest.split(";;").next().unwrap_or("").trim();
    let number = || {
        value.parse::<u64>().map_err(|_| {
            AutotrustError::CommentParse(format!("Invalid value for {}: '{}'", key, value))
        })
    };

    match key.trim() {
        "id" => {
            let mut fields = value.split_whitespace();
            let name: Name = fields.next().unwrap_or("").parse()?;
            let class = match fields.next() {
                None => DNSResourceClass::IN,
                Some(field) => DNSResourceClass::from_mnemonic(field)
                    .or_else(|| field.parse().ok().and_then(DNSResourceClass::from_u16))
                    .ok_or_else(|| {
                        AutotrustError::CommentParse(format!("Unknown class '{}'", field))
                    })?,
            };
            header.id = Some((name, class));
        }
        "last_queried" => header.last_queried = Some(number()?),
        "last_success" => header.last_success = Some(number()?),
        "next_probe_time" => header.next_probe_time = Some(number()?),
        "query_failed" => header.query_failed = Some(number()?.min(u64::from(u32::MAX)) as u32),
        "query_interval" => header.query_interval = Some(number()?),
        "retry_time" => header.retry_time = Some(number()?),
        _ => return Ok(false),
    }
    Ok(true)
}

/// Parse one key line. Lines without data give `Ok(None)`.
pub fn parse_line(line: &str, now: u64, parser: &dyn RecordParser) -> Result<Option<KeyEntry>> {
    if !contains_data(line) {
        return Ok(None);
    }

    let rr = parser.parse_rr(line)?;
    if !matches!(rr.rtype(), DNSResourceType::DS | DNSResourceType::DNSKEY) {
        return Err(AutotrustError::RecordParse(format!(
            "{} record cannot be a trust anchor",
            rr.rtype()
        )));
    }

    let comment = comments::parse_state_comment(line)?;
    if let StateField::Unknown(code) = comment.state {
        warn!(
            "Trust anchor [{}, {}, id={}] has undefined state '{}', considered NEW",
            rr.owner,
            rr.rtype(),
            rr.key_tag(),
            code
        );
    }

    Ok(Some(KeyEntry {
        state: comment.state.resolve(),
        pending_count: comment.pending_count,
        last_change: comment.last_change.unwrap_or(now),
        rr,
    }))
}

/// Parse anchor file contents. `file` is only used for diagnostics.
pub fn parse_anchor(
    contents: &str,
    file: &Path,
    now: u64,
    parser: &dyn RecordParser,
) -> Result<LoadedAnchor> {
    let mut header = Header::default();
    let mut keys: Vec<KeyEntry> = Vec::new();
    let mut zone: Option<(Name, DNSResourceClass)> = None;

    for (lineno, line) in contents.lines().enumerate() {
        match parse_header_line(line, &mut header) {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                error!("{}:{}: {}", file.display(), lineno + 1, e);
                continue;
            }
        }

        let entry = match parse_line(line, now, parser) {
            Ok(Some(entry)) => entry,
            Ok(None) => continue,
            Err(e) => {
                error!("{}:{}: failed to parse trust anchor: {}", file.display(), lineno + 1, e);
                continue;
            }
        };

        let found = (entry.rr.owner.clone(), entry.rr.rclass);
        match zone.as_ref() {
            Some(expected) if *expected != found => {
                return Err(zone_mismatch(file, expected, &found));
            }
            Some(_) => {}
            None => zone = Some(found),
        }
        keys.try_reserve(1)?;
        keys.push(entry);
    }

    let (name, class) = zone.ok_or_else(|| AutotrustError::EmptyAnchorFile(file.to_path_buf()))?;
    if let Some(id) = &header.id {
        if *id != (name.clone(), class) {
            return Err(zone_mismatch(file, id, &(name, class)));
        }
    }

    debug!("Read {} trust anchor keys for {} from {}", keys.len(), name, file.display());

    Ok(LoadedAnchor {
        name,
        class,
        data: TrustPointData {
            keys,
            last_queried: header.last_queried.unwrap_or(0),
            last_success: header.last_success.unwrap_or(0),
            next_probe_time: header.next_probe_time.unwrap_or(now),
            query_failed: header.query_failed.unwrap_or(0),
            query_interval: header.query_interval.unwrap_or(0),
            retry_time: header.retry_time.unwrap_or(0),
            file: Some(file.to_path_buf()),
            ..Default::default()
        },
    })
}

fn zone_mismatch(
    file: &Path,
    expected: &(Name, DNSResourceClass),
    found: &(Name, DNSResourceClass),
) -> AutotrustError {
    AutotrustError::ZoneMismatch {
        file: file.to_path_buf(),
        expected: format!("{} {}", expected.0, expected.1),
        found: format!("{} {}", found.0, found.1),
    }
}

/// Read an anchor file
pub fn load(path: &Path, now: u64, parser: &dyn RecordParser) -> Result<LoadedAnchor> {
    debug!("Loading trust anchor file: {}", path.display());
    let contents = fs::read_to_string(path)?;
    parse_anchor(&contents, path, now, parser)
}

/// Anchor file text for a trust point. Removed keys are left out.
pub fn serialize(name: &Name, class: DNSResourceClass, data: &TrustPointData) -> String {
    let mut out = String::new();
    let stamp = |secs: u64| format!("{} ;;{}", secs, comments::human_time(secs));

    let _ = writeln!(out, "; autotrust trust anchor file");
    let _ = writeln!(out, ";;id: {} {}", name, class);
    let _ = writeln!(out, ";;last_queried: {}", stamp(data.last_queried));
    let _ = writeln!(out, ";;last_success: {}", stamp(data.last_success));
    let _ = writeln!(out, ";;next_probe_time: {}", stamp(data.next_probe_time));
    let _ = writeln!(out, ";;query_failed: {}", data.query_failed);
    let _ = writeln!(out, ";;query_interval: {}", data.query_interval);
    let _ = writeln!(out, ";;retry_time: {}", data.retry_time);

    for key in data.keys.iter().filter(|k| k.state != KeyState::Removed) {
        let _ = write!(out, "{} ", key.rr.to_text());
        if let Some(dnskey) = key.rr.as_dnskey() {
            let _ = write!(
                out,
                ";{{id = {} ({}), size = {}b}} ",
                dnskey.key_tag(),
                if dnskey.is_sep() { "ksk" } else { "zsk" },
                dnskey.key_size()
            );
        }
        let _ = writeln!(
            out,
            "{}",
            comments::format_state_comment(key.state, key.pending_count, key.last_change)
        );
    }
    out
}

/// Write `contents` next to `path` and rename it into place
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut temp_path = PathBuf::from(path);
    temp_path.as_mut_os_string().push(".tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Persist a trust point to its anchor file, if it has one.
/// The trust point lock is released before touching the file system.
pub fn save(point: &TrustPoint) -> Result<()> {
    let (path, contents) = {
        let data = point.lock();
        let Some(path) = data.file.clone() else {
            debug!("Trust point {} has no anchor file, not saving", point.name());
            return Ok(());
        };
        (path, serialize(point.name(), point.class(), &data))
    };

    write_atomic(&path, &contents)?;
    debug!("Saved trust anchor state for {} to {}", point.name(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::TextRecordParser;

    const KEY_A: &str = "example. 3600 IN DNSKEY 257 3 15 l02Woi0iS8Aa25FQkUd9RMzZHJpBoRQwAQEX1SxZJA4=";
    const KEY_B: &str = "example. 3600 IN DNSKEY 257 3 15 zPnZ/QwEe7S8C5SPz2OfS5RR40ATk2/rYnE9xHIEijs=";

    #[test]
    fn test_contains_data() {
        assert!(!contains_data(""));
        assert!(!contains_data("   \t"));
        assert!(!contains_data("  ; comment"));
        assert!(!contains_data(";;id: . 1"));
        assert!(contains_data("example. DS 1 2 3 AB"));
    }

    #[test]
    fn test_parse_line_with_state() {
        let parser = TextRecordParser::new();
        let line = format!("{} ;state=2 count=0 lastchange=1000000000", KEY_A);
        let entry = parse_line(&line, 42, &parser).unwrap().unwrap();
        assert_eq!(entry.state, KeyState::Valid);
        assert_eq!(entry.pending_count, 0);
        assert_eq!(entry.last_change, 1_000_000_000);

        let entry = parse_line(KEY_A, 42, &parser).unwrap().unwrap();
        assert_eq!(entry.state, KeyState::Valid);
        assert_eq!(entry.last_change, 42);

        assert!(parse_line("   ", 42, &parser).unwrap().is_none());
    }

    #[test]
    fn test_header_lines() {
        let mut header = Header::default();
        assert!(parse_header_line(";;id: example. IN", &mut header).unwrap());
        assert!(parse_header_line(";;next_probe_time: 1700 ;;Thu Jan  1 00:28:20 1970", &mut header).unwrap());
        assert!(parse_header_line(";;query_failed: 3", &mut header).unwrap());
        assert!(!parse_header_line("; plain comment", &mut header).unwrap());
        assert!(parse_header_line(";;retry_time: soon", &mut header).is_err());

        assert_eq!(header.next_probe_time, Some(1700));
        assert_eq!(header.query_failed, Some(3));
        assert_eq!(header.id.unwrap().0.to_string(), "example.");
    }

    #[test]
    fn test_mismatch_aborts() {
        let parser = TextRecordParser::new();
        let contents = format!("{}\nother. 3600 IN DNSKEY 257 3 15 AAAA\n", KEY_A);
        let err = parse_anchor(&contents, Path::new("x.key"), 0, &parser).unwrap_err();
        assert!(matches!(err, AutotrustError::ZoneMismatch { .. }));
    }

    #[test]
    fn test_serialize_round_trip() {
        let parser = TextRecordParser::new();
        let contents = format!(
            "{} ;state=1 count=4 lastchange=1600000000\n{} ;state=2 count=0 lastchange=1500000000\n",
            KEY_A, KEY_B
        );
        let loaded = parse_anchor(&contents, Path::new("x.key"), 99, &parser).unwrap();
        let text = serialize(&loaded.name, loaded.class, &loaded.data);
        let again = parse_anchor(&text, Path::new("x.key"), 12345, &parser).unwrap();

        assert_eq!(again.data.keys, loaded.data.keys);
        assert_eq!(again.data.next_probe_time, 99);
    }

    #[test]
    fn test_removed_keys_not_written() {
        let parser = TextRecordParser::new();
        let contents = format!("{} ;state=5\n{}\n", KEY_A, KEY_B);
        let loaded = parse_anchor(&contents, Path::new("x.key"), 0, &parser).unwrap();
        let text = serialize(&loaded.name, loaded.class, &loaded.data);
        assert!(!text.contains("REMOVED"));
        assert_eq!(text.matches("DNSKEY").count(), 1);
    }
}
