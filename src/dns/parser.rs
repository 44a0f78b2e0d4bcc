use super::enums::{DNSResourceClass, DNSResourceType};
use super::name::Name;
use super::resource::{DNSResource, DNSResourceData, DnsKeyData, DsData, RrsigData};
use crate::error::{AutotrustError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDateTime;
use tracing::trace;

/// Default TTL for anchor records that carry none
pub const DEFAULT_TTL: u32 = 3600;

/// Parses one resource record in presentation format
pub trait RecordParser: Send + Sync {
    fn parse_rr(&self, line: &str) -> Result<DNSResource>;
}

/// Parser for DNSKEY, DS and RRSIG lines in zone-file syntax
#[derive(Debug, Clone, Default)]
pub struct TextRecordParser;

impl TextRecordParser {
    pub fn new() -> Self {
        Self
    }

    /// Split a record line into fields, ignoring parentheses and the trailing comment
    fn tokenize(line: &str) -> Vec<String> {
        let mut parts = Vec::new();
        let mut in_quotes = false;
        let mut current_part = String::new();

        for ch in line.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                }
                ';' if !in_quotes => break,
                '(' | ')' if !in_quotes => {}
                ' ' | '\t' | '\r' | '\n' if !in_quotes => {
                    if !current_part.is_empty() {
                        parts.push(std::mem::take(&mut current_part));
                    }
                }
                _ => current_part.push(ch),
            }
        }

        if !current_part.is_empty() {
            parts.push(current_part);
        }

        parts
    }

    /// Parse TTL value (supports suffixes like 1h, 30m, etc.)
    pub fn parse_ttl(s: &str) -> Result<u32> {
        let s = s.to_lowercase();
        let (num_str, multiplier) = match s.as_bytes().last() {
            Some(b's') => (&s[..s.len() - 1], 1),
            Some(b'm') => (&s[..s.len() - 1], 60),
            Some(b'h') => (&s[..s.len() - 1], 3600),
            Some(b'd') => (&s[..s.len() - 1], 86400),
            Some(b'w') => (&s[..s.len() - 1], 604800),
            _ => (s.as_str(), 1),
        };

        if num_str.is_empty() || !num_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AutotrustError::RecordParse(format!("Invalid TTL: {}", s)));
        }

        num_str
            .parse::<u32>()
            .ok()
            .and_then(|n| n.checked_mul(multiplier))
            .ok_or_else(|| AutotrustError::RecordParse(format!("Invalid TTL: {}", s)))
    }

    fn parse_number<T: std::str::FromStr>(field: Option<&String>, what: &str) -> Result<T> {
        field
            .and_then(|f| f.parse::<T>().ok())
            .ok_or_else(|| AutotrustError::RecordParse(format!("Invalid {}", what)))
    }

    fn parse_dnskey(fields: &[String]) -> Result<DnsKeyData> {
        if fields.len() < 4 {
            return Err(AutotrustError::RecordParse(
                "DNSKEY requires flags, protocol, algorithm and key".to_string(),
            ));
        }
        let public_key = STANDARD
            .decode(fields[3..].concat())
            .map_err(|e| AutotrustError::RecordParse(format!("Invalid DNSKEY key data: {}", e)))?;

        Ok(DnsKeyData {
            flags: Self::parse_number(fields.first(), "DNSKEY flags")?,
            protocol: Self::parse_number(fields.get(1), "DNSKEY protocol")?,
            algorithm: Self::parse_number(fields.get(2), "DNSKEY algorithm")?,
            public_key,
        })
    }

    fn parse_ds(fields: &[String]) -> Result<DsData> {
        if fields.len() < 4 {
            return Err(AutotrustError::RecordParse(
                "DS requires key tag, algorithm, digest type and digest".to_string(),
            ));
        }
        let digest = hex::decode(fields[3..].concat())
            .map_err(|e| AutotrustError::RecordParse(format!("Invalid DS digest: {}", e)))?;

        Ok(DsData {
            key_tag: Self::parse_number(fields.first(), "DS key tag")?,
            algorithm: Self::parse_number(fields.get(1), "DS algorithm")?,
            digest_type: Self::parse_number(fields.get(2), "DS digest type")?,
            digest,
        })
    }

    /// Signature times are either YYYYMMDDHHmmSS or seconds since the epoch (RFC 4034 section 3.2)
    fn parse_sig_time(field: Option<&String>) -> Result<u32> {
        let field = field
            .ok_or_else(|| AutotrustError::RecordParse("Missing signature time".to_string()))?;
        if field.len() == 14 {
            let dt = NaiveDateTime::parse_from_str(field, "%Y%m%d%H%M%S").map_err(|e| {
                AutotrustError::RecordParse(format!("Invalid signature time {}: {}", field, e))
            })?;
            return u32::try_from(dt.and_utc().timestamp()).map_err(|_| {
                AutotrustError::RecordParse(format!("Signature time out of range: {}", field))
            });
        }
        field
            .parse::<u32>()
            .map_err(|_| AutotrustError::RecordParse(format!("Invalid signature time: {}", field)))
    }

    fn parse_rrsig(fields: &[String]) -> Result<RrsigData> {
        if fields.len() < 9 {
            return Err(AutotrustError::RecordParse(
                "RRSIG requires nine fields".to_string(),
            ));
        }
        let type_covered = DNSResourceType::from_mnemonic(&fields[0])
            .map(u16::from)
            .or_else(|| {
                fields[0]
                    .to_uppercase()
                    .strip_prefix("TYPE")
                    .and_then(|n| n.parse::<u16>().ok())
            })
            .ok_or_else(|| {
                AutotrustError::RecordParse(format!("Invalid type covered: {}", fields[0]))
            })?;
        let signature = STANDARD
            .decode(fields[8..].concat())
            .map_err(|e| AutotrustError::RecordParse(format!("Invalid signature: {}", e)))?;

        Ok(RrsigData {
            type_covered,
            algorithm: Self::parse_number(fields.get(1), "RRSIG algorithm")?,
            labels: Self::parse_number(fields.get(2), "RRSIG labels")?,
            original_ttl: Self::parse_ttl(&fields[3])?,
            sig_expiration: Self::parse_sig_time(fields.get(4))?,
            sig_inception: Self::parse_sig_time(fields.get(5))?,
            key_tag: Self::parse_number(fields.get(6), "RRSIG key tag")?,
            signer_name: fields[7].parse()?,
            signature,
        })
    }
}

impl RecordParser for TextRecordParser {
    fn parse_rr(&self, line: &str) -> Result<DNSResource> {
        let parts = Self::tokenize(line);
        if parts.is_empty() {
            return Err(AutotrustError::RecordParse("Empty record line".to_string()));
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(AutotrustError::RecordParse(
                "Record has no owner name".to_string(),
            ));
        }

        let owner: Name = parts[0].parse()?;
        let mut ttl = None;
        let mut class = None;
        let mut rtype = None;
        let mut idx = 1;

        // Optional TTL and class in either order, then the type
        while idx < parts.len() {
            let field = &parts[idx];
            idx += 1;

            if ttl.is_none() {
                if let Ok(value) = Self::parse_ttl(field) {
                    ttl = Some(value);
                    continue;
                }
            }
            if class.is_none() {
                if let Some(value) = DNSResourceClass::from_mnemonic(field) {
                    class = Some(value);
                    continue;
                }
            }
            match DNSResourceType::from_mnemonic(field) {
                Some(value) => {
                    rtype = Some(value);
                    break;
                }
                None => {
                    return Err(AutotrustError::RecordParse(format!(
                        "Invalid field: {}",
                        field
                    )));
                }
            }
        }

        let rtype =
            rtype.ok_or_else(|| AutotrustError::RecordParse("Missing record type".to_string()))?;
        let fields = &parts[idx..];
        if fields.is_empty() {
            return Err(AutotrustError::RecordParse("Missing RDATA".to_string()));
        }

        let rdata = match rtype {
            DNSResourceType::DNSKEY => DNSResourceData::DnsKey(Self::parse_dnskey(fields)?),
            DNSResourceType::DS => DNSResourceData::Ds(Self::parse_ds(fields)?),
            DNSResourceType::RRSIG => DNSResourceData::Rrsig(Self::parse_rrsig(fields)?),
        };

        trace!("Parsed {} record for {}", rtype, owner);

        Ok(DNSResource::new(
            owner,
            ttl.unwrap_or(DEFAULT_TTL),
            class.unwrap_or_default(),
            rdata,
        ))
    }
}
