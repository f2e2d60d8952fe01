//! Hardware-address prefix to manufacturer lookup.
//!
//! Accepts both the IEEE registry dump (`oui.txt`) and Wireshark's `manuf`
//! file, so whichever one is lying around on the lab machine works.

use crate::pipeline::config::{OUI_LEN, UNKNOWN_VENDOR};
use pnet::util::MacAddr;
use std::collections::HashMap;
use std::path::Path;

type Prefix = [u8; OUI_LEN];

/// Read-only prefix table shared by the whole run.
#[derive(Debug, Default, Clone)]
pub struct VendorTable {
    prefixes: HashMap<Prefix, String>,
}

impl VendorTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads and parses a vendor table file.
    ///
    /// # Errors
    /// Returns the I/O error if the file cannot be read. Unparseable lines
    /// are skipped, never reported.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::parse(&data))
    }

    /// Parses IEEE `oui.txt` lines (`00-00-0C   (hex)   Cisco Systems, Inc`)
    /// and `manuf` lines (`00:00:0C<TAB>Cisco<TAB>Cisco Systems, Inc`).
    /// The first entry for a prefix wins.
    pub fn parse(data: &str) -> Self {
        let mut prefixes = HashMap::new();
        for line in data.lines() {
            if let Some((prefix, vendor)) = parse_line(line) {
                prefixes.entry(prefix).or_insert(vendor);
            }
        }
        Self { prefixes }
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Returns the vendor registered for the address prefix, or
    /// [`UNKNOWN_VENDOR`]. Never fails.
    pub fn resolve(&self, mac: &MacAddr) -> &str {
        self.prefixes
            .get(&[mac.0, mac.1, mac.2])
            .map(|s| s.as_str())
            .unwrap_or(UNKNOWN_VENDOR)
    }
}

fn parse_line(line: &str) -> Option<(Prefix, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if line.contains("(hex)") {
        let (prefix, vendor) = line.split_once("(hex)")?;
        let vendor = vendor.trim();
        if vendor.is_empty() {
            return None;
        }
        return Some((parse_prefix(prefix.trim())?, vendor.to_string()));
    }

    let mut fields = line.split('\t').map(str::trim).filter(|f| !f.is_empty());
    let prefix = fields.next()?;
    let short = fields.next()?;
    let vendor = fields.next().unwrap_or(short);

    // Longer manuf masks (/28, /36) name sub-blocks of an OUI; only whole
    // 24-bit assignments map cleanly onto a three-octet key.
    let prefix = match prefix.split_once('/') {
        Some((p, "24")) => p,
        Some(_) => return None,
        None => prefix,
    };
    Some((parse_prefix(prefix)?, vendor.to_string()))
}

fn parse_prefix(s: &str) -> Option<Prefix> {
    let mut out = [0u8; OUI_LEN];
    let mut parts = s.split(|c| c == ':' || c == '-');
    for slot in out.iter_mut() {
        *slot = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    parts.next().is_none().then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IEEE: &str = "\
OUI/MA-L                                                    Organization
company_id                                                  Organization
                                                            Address

00-00-0C   (hex)\t\tCisco Systems, Inc
00000C     (base 16)\t\tCisco Systems, Inc
\t\t\t\t170 WEST TASMAN DRIVE

3C-22-FB   (hex)\t\tApple, Inc.
";

    const MANUF: &str = "\
# Wireshark manuf file
00:00:0C\tCisco\tCisco Systems, Inc
B8:27:EB\tRaspberr\tRaspberry Pi Foundation
00:1B:C5:00:00:00/36\tConverge\tConverging Systems Inc.
00:50:C2/24\tIeeeRegi\tIEEE Registration Authority
";

    #[test]
    fn test_parses_ieee_registry() {
        let table = VendorTable::parse(IEEE);
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve(&MacAddr::new(0x3c, 0x22, 0xfb, 1, 2, 3)), "Apple, Inc.");
        assert_eq!(table.resolve(&MacAddr::new(0, 0, 0x0c, 9, 9, 9)), "Cisco Systems, Inc");
    }

    #[test]
    fn test_parses_manuf() {
        let table = VendorTable::parse(MANUF);
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.resolve(&MacAddr::new(0xb8, 0x27, 0xeb, 0, 0, 1)),
            "Raspberry Pi Foundation"
        );
        assert_eq!(
            table.resolve(&MacAddr::new(0x00, 0x50, 0xc2, 0, 0, 1)),
            "IEEE Registration Authority"
        );
    }

    #[test]
    fn test_unknown_prefix_resolves_to_sentinel() {
        let table = VendorTable::parse(MANUF);
        assert_eq!(table.resolve(&MacAddr::new(0xde, 0xad, 0xbe, 0xef, 0, 1)), UNKNOWN_VENDOR);
        assert_eq!(VendorTable::empty().resolve(&MacAddr::new(0, 0, 0x0c, 0, 0, 0)), UNKNOWN_VENDOR);
    }

    #[test]
    fn test_file_without_prefixes_is_empty() {
        assert!(VendorTable::parse("# Wireshark manuf file\n\n").is_empty());
        assert!(!VendorTable::parse(MANUF).is_empty());
    }

    #[test]
    fn test_rejects_malformed_prefixes() {
        assert_eq!(parse_prefix("00:00"), None);
        assert_eq!(parse_prefix("00:00:0C:11"), None);
        assert_eq!(parse_prefix("zz:00:0C"), None);
        assert_eq!(parse_prefix("00-00-0c"), Some([0, 0, 0x0c]));
    }
}
