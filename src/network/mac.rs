//! Strict parsing of textual hardware addresses.

use pnet::util::MacAddr;

/// Number of octets in a hardware address.
const MAC_OCTETS: usize = 6;

/// Parse a hardware address written as `xx:xx:xx:xx:xx:xx`.
///
/// Hex digits are accepted in either case. Anything else (single-digit
/// groups, other separators, extra groups) is rejected, unlike
/// `MacAddr::from_str` which accepts `1:2:3:4:5:6`.
pub fn parse_mac(text: &str) -> Option<MacAddr> {
    let mut octets = [0u8; MAC_OCTETS];
    let mut groups = text.split(':');

    for octet in &mut octets {
        let group = groups.next()?;
        if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        *octet = u8::from_str_radix(group, 16).ok()?;
    }

    if groups.next().is_some() {
        return None;
    }

    let [a, b, c, d, e, f] = octets;
    Some(MacAddr::new(a, b, c, d, e, f))
}

/// Whether `mac` is the all-zero address the kernel reports for
/// incomplete neighbor records.
pub fn is_unresolved(mac: MacAddr) -> bool {
    mac == MacAddr::zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_canonical_address() {
        let mac = parse_mac("aa:bb:cc:dd:ee:01").unwrap();
        assert_eq!(mac, MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01));
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:01");
    }

    #[test]
    fn should_ignore_case() {
        for text in ["AA:BB:CC:DD:EE:01", "aa:bb:cc:dd:ee:01", "Aa:bB:cC:Dd:eE:01"] {
            assert_eq!(
                parse_mac(&text.to_uppercase()),
                parse_mac(&text.to_lowercase())
            );
            assert!(parse_mac(text).is_some());
        }
    }

    #[test]
    fn should_be_idempotent_through_display() {
        let mac = parse_mac("0A:1b:2C:3d:4E:5f").unwrap();
        assert_eq!(parse_mac(&mac.to_string()), Some(mac));
    }

    #[test]
    fn should_reject_malformed_addresses() {
        for text in [
            "",
            "aa:bb:cc:dd:ee",
            "aa:bb:cc:dd:ee:ff:00",
            "aa-bb-cc-dd-ee-ff",
            "a:b:c:d:e:f",
            "aaa:bb:cc:dd:ee:ff",
            "gg:bb:cc:dd:ee:ff",
            "aa:bb:cc:dd:ee:ff:",
            "+a:bb:cc:dd:ee:ff",
            "<incomplete>",
        ] {
            assert_eq!(parse_mac(text), None, "{text:?} should be rejected");
        }
    }

    #[test]
    fn should_flag_all_zero_address_as_unresolved() {
        assert!(is_unresolved(parse_mac("00:00:00:00:00:00").unwrap()));
        assert!(!is_unresolved(parse_mac("00:00:00:00:00:01").unwrap()));
    }
}
