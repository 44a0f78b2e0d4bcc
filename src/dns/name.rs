use crate::error::{AutotrustError, Result};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a domain name in wire format (RFC 1035)
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a single label (RFC 1035)
pub const MAX_LABEL_LEN: usize = 63;

/// An absolute domain name kept in canonical (lower-case) wire format
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    wire: Vec<u8>,
    labels: u8,
}

impl Name {
    /// The root name
    pub fn root() -> Self {
        Self {
            wire: vec![0],
            labels: 1,
        }
    }

    /// Build a name from wire format, lower-casing it
    pub fn from_wire(data: &[u8]) -> Result<Self> {
        let mut wire = Vec::with_capacity(data.len());
        let mut labels = 0u8;
        let mut pos = 0;

        loop {
            let len = *data
                .get(pos)
                .ok_or_else(|| AutotrustError::InvalidName("truncated wire name".to_string()))?
                as usize;
            if len > MAX_LABEL_LEN {
                return Err(AutotrustError::InvalidName(format!(
                    "label length {} exceeds {}",
                    len, MAX_LABEL_LEN
                )));
            }
            let end = pos + 1 + len;
            if end > data.len() {
                return Err(AutotrustError::InvalidName("truncated wire name".to_string()));
            }
            wire.push(len as u8);
            wire.extend(data[pos + 1..end].iter().map(|b| b.to_ascii_lowercase()));
            labels += 1;
            pos = end;
            if len == 0 {
                break;
            }
        }

        if wire.len() > MAX_NAME_LEN {
            return Err(AutotrustError::InvalidName("name too long".to_string()));
        }

        Ok(Self { wire, labels })
    }

    /// Wire format, lower case, terminated by the root label
    pub fn as_wire(&self) -> &[u8] {
        &self.wire
    }

    /// Number of labels, counting the root label
    pub fn label_count(&self) -> u8 {
        self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels == 1
    }

    /// Iterate over the labels, excluding the root
    pub fn labels(&self) -> impl Iterator<Item = &[u8]> {
        let mut pos = 0;
        std::iter::from_fn(move || {
            let len = *self.wire.get(pos)? as usize;
            if len == 0 {
                return None;
            }
            let label = &self.wire[pos + 1..pos + 1 + len];
            pos += 1 + len;
            Some(label)
        })
    }
}

impl FromStr for Name {
    type Err = AutotrustError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }
        if s == "@" || s.contains('\\') {
            return Err(AutotrustError::InvalidName(s.to_string()));
        }

        let mut wire = Vec::with_capacity(s.len() + 2);
        let mut labels = 1u8;
        for label in s.strip_suffix('.').unwrap_or(s).split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(AutotrustError::InvalidName(s.to_string()));
            }
            wire.push(label.len() as u8);
            wire.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
            labels += 1;
        }
        wire.push(0);

        if wire.len() > MAX_NAME_LEN {
            return Err(AutotrustError::InvalidName(s.to_string()));
        }

        Ok(Self { wire, labels })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for label in self.labels() {
            write!(f, "{}.", String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let name: Name = "Example.COM".parse().unwrap();
        assert_eq!(name.to_string(), "example.com.");
        assert_eq!(name.label_count(), 3);
        assert_eq!(name.as_wire(), b"\x07example\x03com\x00");

        let same: Name = "example.com.".parse().unwrap();
        assert_eq!(name, same);
    }

    #[test]
    fn test_root() {
        let root: Name = ".".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), ".");
        assert_eq!(root.as_wire(), &[0]);
    }

    #[test]
    fn test_invalid_names() {
        assert!("a..b".parse::<Name>().is_err());
        assert!("@".parse::<Name>().is_err());
        assert!(format!("{}.com", "a".repeat(64)).parse::<Name>().is_err());
    }

    #[test]
    fn test_from_wire() {
        let name = Name::from_wire(b"\x03NLn\x02ET\x00").unwrap();
        assert_eq!(name.to_string(), "nln.et.");
        assert!(Name::from_wire(b"\x05abc").is_err());
    }
}
