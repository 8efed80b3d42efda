use super::InternalType;

/// Unit tables for the four scalar-unit types. Unit names are matched
/// case-insensitively, per the grammar.
static SIZE_UNITS: &[(&str, f64)] = &[
    ("b", 1.0),
    ("kb", 1_000.0),
    ("kib", 1_024.0),
    ("mb", 1_000_000.0),
    ("mib", 1_048_576.0),
    ("gb", 1_000_000_000.0),
    ("gib", 1_073_741_824.0),
    ("tb", 1_000_000_000_000.0),
    ("tib", 1_099_511_627_776.0),
];

static TIME_UNITS: &[(&str, f64)] = &[
    ("d", 86_400.0),
    ("h", 3_600.0),
    ("m", 60.0),
    ("s", 1.0),
    ("ms", 0.001),
    ("us", 0.000_001),
    ("ns", 0.000_000_001),
];

static FREQUENCY_UNITS: &[(&str, f64)] = &[
    ("hz", 1.0),
    ("khz", 1_000.0),
    ("mhz", 1_000_000.0),
    ("ghz", 1_000_000_000.0),
];

static BITRATE_UNITS: &[(&str, f64)] = &[
    ("bps", 1.0),
    ("kbps", 1_000.0),
    ("kibps", 1_024.0),
    ("mbps", 1_000_000.0),
    ("mibps", 1_048_576.0),
    ("gbps", 1_000_000_000.0),
    ("gibps", 1_073_741_824.0),
    ("tbps", 1_000_000_000_000.0),
    ("tibps", 1_099_511_627_776.0),
];

static BYTE_RATE_UNITS: &[(&str, f64)] = &[
    ("bps", 8.0),
    ("kbps", 8_000.0),
    ("kibps", 8_192.0),
    ("mbps", 8_000_000.0),
    ("mibps", 8_388_608.0),
    ("gbps", 8_000_000_000.0),
    ("gibps", 8_589_934_592.0),
];

fn units_for(internal: InternalType) -> Option<&'static [(&'static str, f64)]> {
    match internal {
        InternalType::ScalarSize => Some(SIZE_UNITS),
        InternalType::ScalarTime => Some(TIME_UNITS),
        InternalType::ScalarFrequency => Some(FREQUENCY_UNITS),
        InternalType::ScalarBitrate => Some(BITRATE_UNITS),
        _ => None,
    }
}

/// Parse `<number> <unit>` into the canonical base-unit magnitude
/// (bytes, seconds, hertz, or bits).
pub fn parse_scalar(internal: InternalType, text: &str) -> Option<f64> {
    let units = units_for(internal)?;
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .filter(|split| *split > 0)?;
    let (number, unit) = text.split_at(split);
    let number: f64 = number.trim().parse().ok()?;
    let unit = unit.trim();

    // Bitrate distinguishes bits from bytes by case: `Bps` family is
    // byte-based, everything else matches case-insensitively.
    if internal == InternalType::ScalarBitrate && unit.contains("Bps") {
        let factor = BYTE_RATE_UNITS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(unit))?
            .1;
        return Some(number * factor);
    }

    let factor = units
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(unit))?
        .1;
    Some(number * factor)
}

/// The canonical rendered form of a scalar: the original string plus its
/// base-unit magnitude, which is what converters and comparers consume.
pub fn scalar_value(original: &str, canonical: f64) -> ir::Value {
    let mut map = ir::Map::new();
    map.insert("$originalString".into(), ir::Value::from(original));
    map.insert("$number".into(), ir::Value::Float(canonical));
    ir::Value::Map(map)
}

/// Zero value substituted for absent scalar attributes.
pub fn scalar_zero() -> ir::Value {
    scalar_value("0", 0.0)
}

/// TOSCA version strings: `major.minor[.fix[.qualifier[-build]]]`.
pub fn is_valid_version(text: &str) -> bool {
    let mut parts = text.split('.');
    let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
        return false;
    };
    if major.parse::<u64>().is_err() || minor.parse::<u64>().is_err() {
        return false;
    }
    match parts.next() {
        None => parts.next().is_none(),
        Some(fix) => {
            if fix.parse::<u64>().is_err() {
                return false;
            }
            match parts.next() {
                None => true,
                Some(qualifier) => {
                    if parts.next().is_some() {
                        return false;
                    }
                    let (qualifier, build) = match qualifier.split_once('-') {
                        Some((qualifier, build)) => (qualifier, Some(build)),
                        None => (qualifier, None),
                    };
                    !qualifier.is_empty()
                        && qualifier.chars().all(|c| c.is_ascii_alphanumeric())
                        && build.map_or(true, |build| build.parse::<u64>().is_ok())
                }
            }
        }
    }
}

/// RFC 3339-shaped timestamps, the YAML timestamp subset the grammar uses.
pub fn is_valid_timestamp(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() < 10 {
        return false;
    }
    let date_ok = bytes[..10].iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !date_ok {
        return false;
    }
    if bytes.len() == 10 {
        return true;
    }
    // Date-time: 'T' or space separator, then HH:MM:SS with optional
    // fraction and zone.
    let rest = &text[10..];
    let Some(rest) = rest.strip_prefix(['T', 't', ' ']) else {
        return false;
    };
    let time = rest.as_bytes();
    time.len() >= 8
        && time[..8].iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b':',
            _ => b.is_ascii_digit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_sizes_normalize_to_bytes() {
        assert_eq!(parse_scalar(InternalType::ScalarSize, "2 KiB"), Some(2048.0));
        assert_eq!(parse_scalar(InternalType::ScalarSize, "1.5 kB"), Some(1500.0));
        assert_eq!(parse_scalar(InternalType::ScalarSize, "10 GB"), Some(1e10));
        assert_eq!(parse_scalar(InternalType::ScalarSize, "3kib"), Some(3072.0));
        assert_eq!(parse_scalar(InternalType::ScalarSize, "oops"), None);
        assert_eq!(parse_scalar(InternalType::ScalarSize, "3 parsecs"), None);
    }

    #[test]
    fn scalar_times_normalize_to_seconds() {
        assert_eq!(parse_scalar(InternalType::ScalarTime, "2 h"), Some(7200.0));
        assert_eq!(parse_scalar(InternalType::ScalarTime, "500 ms"), Some(0.5));
    }

    #[test]
    fn bitrates_distinguish_bits_from_bytes() {
        assert_eq!(parse_scalar(InternalType::ScalarBitrate, "1 Kbps"), Some(1000.0));
        assert_eq!(parse_scalar(InternalType::ScalarBitrate, "1 KBps"), Some(8000.0));
    }

    #[test]
    fn version_strings() {
        assert!(is_valid_version("2.0"));
        assert!(is_valid_version("1.2.3"));
        assert!(is_valid_version("1.2.3.beta-4"));
        assert!(!is_valid_version("1"));
        assert!(!is_valid_version("1.x"));
        assert!(!is_valid_version("1.2.3.beta-x"));
    }

    #[test]
    fn timestamps() {
        assert!(is_valid_timestamp("2026-08-01"));
        assert!(is_valid_timestamp("2026-08-01T12:30:00Z"));
        assert!(is_valid_timestamp("2026-08-01 12:30:00.5+02:00"));
        assert!(!is_valid_timestamp("yesterday"));
        assert!(!is_valid_timestamp("2026/08/01"));
    }
}
