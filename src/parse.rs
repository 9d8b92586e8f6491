//! External parsers (spec.md §6): `parse_number`, `parse_datetime`,
//! `parse_timestamp`, `parse_inet_address`, `parse_subnet`.
//!
//! These are named in spec.md §1 as excluded collaborators ("the specific
//! ... datetime arithmetic, IP-address parsing") but their *contracts* are
//! documented in §6 and exercised by the testable properties in §8
//! (round-trip of `parse_number(to_string(...))`, the CIDR scenario), so
//! this expansion builds real implementations, grounded on
//! `original_source/src/pw_parse.c` and `pw_netutils.c` for exact
//! semantics (radix prefixes, digit separators, CIDR bit counting).

use crate::sockaddr::{self, AddressFamily, SockAddr};
use crate::status::{Status, StatusCode};
use crate::value::{DateTimeValue, Value};

/// Parse a decimal/`0b`/`0o`/`0x` integer or decimal float, with optional
/// `'`/`_` digit separators (not leading, not doubled). Returns `Signed`
/// when the magnitude fits, `Unsigned` when a positive magnitude
/// overflows `Signed`, or `Float` when a fraction/exponent is present.
pub fn parse_number(input: &str) -> Result<Value, Status> {
    let trimmed = input.trim();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(r) => (-1i64, r),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if rest.is_empty() {
        return Err(crate::status!(StatusCode::BadNumber));
    }

    let (radix, digits) = detect_radix(rest);
    if digits.is_empty() {
        return Err(crate::status!(StatusCode::BadNumber));
    }

    if radix == 10 && looks_like_float(digits) {
        return parse_float(digits, sign);
    }

    parse_integer(digits, radix, sign)
}

fn detect_radix(s: &str) -> (u32, &str) {
    if let Some(rest) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (2, rest)
    } else if let Some(rest) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        (8, rest)
    } else if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, rest)
    } else {
        (10, s)
    }
}

fn looks_like_float(s: &str) -> bool {
    s.contains('.') || s.contains('e') || s.contains('E')
}

fn strip_separators(s: &str) -> Result<String, Status> {
    let mut out = String::with_capacity(s.len());
    let mut prev_was_digit = false;
    let mut prev_was_sep = false;
    for c in s.chars() {
        if c == '\'' || c == '_' {
            if !prev_was_digit || prev_was_sep {
                return Err(crate::status!(StatusCode::BadNumber));
            }
            prev_was_sep = true;
            continue;
        }
        out.push(c);
        prev_was_digit = c.is_ascii_alphanumeric();
        prev_was_sep = false;
    }
    if prev_was_sep {
        return Err(crate::status!(StatusCode::BadNumber));
    }
    Ok(out)
}

fn parse_integer(digits: &str, radix: u32, sign: i64) -> Result<Value, Status> {
    let clean = strip_separators(digits)?;
    let magnitude = u64::from_str_radix(&clean, radix)
        .map_err(|_| crate::status!(StatusCode::BadNumber))?;

    // i64::MIN's magnitude (i64::MAX + 1) doesn't fit in i64 but is the one
    // negative magnitude representable: to_string(i64::MIN)/parse_number
    // must round-trip it rather than reporting a spurious overflow.
    if sign < 0 && magnitude == i64::MAX as u64 + 1 {
        return Ok(Value::Signed(i64::MIN));
    }

    if magnitude > i64::MAX as u64 {
        if sign < 0 {
            return Err(crate::status!(StatusCode::NumericOverflow));
        }
        return Ok(Value::Unsigned(magnitude));
    }
    let signed = magnitude as i64 * sign;
    Ok(Value::Signed(signed))
}

fn parse_float(digits: &str, sign: i64) -> Result<Value, Status> {
    let clean = strip_separators(digits)?;
    let n: f64 = clean.parse().map_err(|_| crate::status!(StatusCode::BadNumber))?;
    if n.is_infinite() {
        return Err(crate::status!(StatusCode::NumericOverflow));
    }
    Ok(Value::Float(if sign < 0 { -n } else { n }))
}

/// Parse `seconds[.nanoseconds]` into a `Value::Timestamp` (nanoseconds
/// since the epoch, per `datetime.rs`'s representation).
pub fn parse_timestamp(input: &str) -> Result<Value, Status> {
    let trimmed = input.trim();
    let (secs_part, frac_part) = match trimmed.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (trimmed, None),
    };
    let seconds: i64 = secs_part
        .parse()
        .map_err(|_| crate::status!(StatusCode::BadTimestamp))?;
    let nanos: i64 = match frac_part {
        Some(f) if !f.is_empty() => {
            if f.len() > 9 || !f.chars().all(|c| c.is_ascii_digit()) {
                return Err(crate::status!(StatusCode::BadTimestamp));
            }
            let padded = format!("{f:0<9}");
            padded.parse().map_err(|_| crate::status!(StatusCode::BadTimestamp))?
        }
        Some(_) => return Err(crate::status!(StatusCode::BadTimestamp)),
        None => 0,
    };
    Ok(Value::Timestamp(seconds.saturating_mul(1_000_000_000).saturating_add(nanos)))
}

/// Parse ISO-8601/RFC-3339-ish `YYYY-MM-DD[T ]HH:MM:SS[.fraction][Z|±HH[:]MM]`,
/// with dashes/colons optional, per spec.md §6.
pub fn parse_datetime(input: &str) -> Result<Value, Status> {
    let bytes: Vec<char> = input.trim().chars().collect();
    let mut pos = 0usize;
    let bad = || crate::status!(StatusCode::BadDatetime);

    let take_digits = |pos: &mut usize, n: usize| -> Result<u32, Status> {
        let mut value = 0u32;
        for _ in 0..n {
            let c = *bytes.get(*pos).ok_or_else(bad)?;
            if !c.is_ascii_digit() {
                return Err(bad());
            }
            value = value * 10 + c.to_digit(10).unwrap();
            *pos += 1;
        }
        Ok(value)
    };

    let year = take_digits(&mut pos, 4)?;
    if bytes.get(pos) == Some(&'-') {
        pos += 1;
    }
    let month = take_digits(&mut pos, 2)?;
    if bytes.get(pos) == Some(&'-') {
        pos += 1;
    }
    let day = take_digits(&mut pos, 2)?;

    match bytes.get(pos) {
        Some('T') | Some(' ') => pos += 1,
        _ => {
            return Ok(Value::DateTime(DateTimeValue {
                year: year as i32,
                month: month as u8,
                day: day as u8,
                hour: 0,
                minute: 0,
                second: 0,
                nanosecond: 0,
                utc_offset_secs: 0,
            }))
        }
    }

    let hour = take_digits(&mut pos, 2)?;
    if bytes.get(pos) == Some(&':') {
        pos += 1;
    }
    let minute = take_digits(&mut pos, 2)?;
    if bytes.get(pos) == Some(&':') {
        pos += 1;
    }
    let second = take_digits(&mut pos, 2)?;

    let mut nanosecond = 0u32;
    if bytes.get(pos) == Some(&'.') {
        pos += 1;
        let start = pos;
        let mut digits = String::new();
        while let Some(c) = bytes.get(pos) {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(*c);
            pos += 1;
        }
        if digits.is_empty() || digits.len() > 9 {
            return Err(bad());
        }
        let padded = format!("{digits:0<9}");
        nanosecond = padded.parse().map_err(|_| bad())?;
        let _ = start;
    }

    let mut utc_offset_secs = 0i32;
    match bytes.get(pos) {
        Some('Z') => pos += 1,
        Some(sign @ ('+' | '-')) => {
            let mult = if *sign == '-' { -1 } else { 1 };
            pos += 1;
            let oh = take_digits(&mut pos, 2)?;
            if bytes.get(pos) == Some(&':') {
                pos += 1;
            }
            let om = take_digits(&mut pos, 2)?;
            utc_offset_secs = mult * (oh as i32 * 3600 + om as i32 * 60);
        }
        _ => {}
    }
    let _ = pos;

    Ok(Value::DateTime(DateTimeValue {
        year: year as i32,
        month: month as u8,
        day: day as u8,
        hour: hour as u8,
        minute: minute as u8,
        second: second as u8,
        nanosecond,
        utc_offset_secs,
    }))
}

/// Parse `host[:port]`, with IPv6 wrapped in `[…]`, per spec.md §6 and
/// `original_source/src/pw_netutils.c::_pw_parse_inet_address`.
pub fn parse_inet_address(input: &str) -> Result<SockAddr, Status> {
    let (host, port) = split_host_port(input)?;
    parse_addr(&host, port)
}

fn split_host_port(input: &str) -> Result<(String, u16), Status> {
    if let Some(rest) = input.strip_prefix('[') {
        // bracketed IPv6, optionally followed by :port
        let close = rest.find(']').ok_or_else(|| crate::status!(StatusCode::BadIpAddress))?;
        let host = format!("[{}]", &rest[..close]);
        let after = &rest[close + 1..];
        if let Some(port_str) = after.strip_prefix(':') {
            let port = parse_port(port_str)?;
            return Ok((host, port));
        }
        return Ok((host, 0));
    }

    // unbracketed: could be "host:port" or a bare IPv6 literal (multiple colons)
    match input.rsplit_once(':') {
        None => Ok((input.to_string(), 0)),
        Some((host, port_str)) => {
            if host.contains(':') {
                // bare IPv6 literal, no port
                return Ok((input.to_string(), 0));
            }
            let port = parse_port(port_str)?;
            Ok((host.to_string(), port))
        }
    }
}

fn parse_port(s: &str) -> Result<u16, Status> {
    let n: i64 = s.parse().map_err(|_| crate::status!(StatusCode::BadPort))?;
    if n <= 0 || n >= 65536 {
        return Err(crate::status!(StatusCode::BadPort));
    }
    Ok(n as u16)
}

fn parse_addr(host: &str, port: u16) -> Result<SockAddr, Status> {
    let stripped = host.strip_prefix('[').and_then(|s| s.strip_suffix(']')).unwrap_or(host);
    match stripped.parse::<std::net::IpAddr>() {
        Ok(std::net::IpAddr::V4(v4)) => Ok(sockaddr::make(AddressFamily::Inet, std::net::IpAddr::V4(v4), port, None)),
        Ok(std::net::IpAddr::V6(v6)) => Ok(sockaddr::make(AddressFamily::Inet6, std::net::IpAddr::V6(v6), port, None)),
        Err(_) => Err(crate::status!(StatusCode::BadIpAddress)),
    }
}

/// Parse CIDR `addr/bits` or `addr` + dotted/hex netmask, per spec.md §6
/// scenario B and `pw_netutils.c::pw_parse_subnet`.
pub fn parse_subnet(subnet: &str, netmask: Option<&str>) -> Result<SockAddr, Status> {
    let mut parts = subnet.splitn(3, '/');
    let addr_part = parts.next().unwrap_or("");
    let bits_part = parts.next();
    if parts.next().is_some() {
        return Err(crate::status!(StatusCode::BadNetmask));
    }

    let addr = parse_inet_address(addr_part)?;

    if let Some(bits_str) = bits_part {
        let bits: i64 = bits_str.parse().map_err(|_| crate::status!(StatusCode::BadNetmask))?;
        if bits <= 0 || bits as u8 >= sockaddr::max_bits(addr.family()) {
            return Err(crate::status!(StatusCode::BadNetmask));
        }
        return Ok(sockaddr::make(addr.family(), addr.addr(), addr.port(), Some(bits as u8)));
    }

    let Some(mask_str) = netmask else {
        return Err(crate::status!(StatusCode::MissingNetmask));
    };
    let mask_addr = parse_inet_address(mask_str)?;
    if mask_addr.family() != addr.family() {
        return Err(crate::status!(StatusCode::BadNetmask));
    }
    let bits = sockaddr::netmask_to_bits(mask_addr.addr()).ok_or_else(|| crate::status!(StatusCode::BadNetmask))?;
    Ok(sockaddr::make(addr.family(), addr.addr(), addr.port(), Some(bits)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_decimal_and_radix_prefixes() {
        assert_eq!(parse_number("42").unwrap(), Value::Signed(42));
        assert_eq!(parse_number("-42").unwrap(), Value::Signed(-42));
        assert_eq!(parse_number("0x2a").unwrap(), Value::Signed(42));
        assert_eq!(parse_number("0b101010").unwrap(), Value::Signed(42));
        assert_eq!(parse_number("0o52").unwrap(), Value::Signed(42));
    }

    #[test]
    fn parse_number_separators() {
        assert_eq!(parse_number("1_000_000").unwrap(), Value::Signed(1_000_000));
        assert_eq!(parse_number("1'000").unwrap(), Value::Signed(1000));
        assert!(parse_number("_1000").is_err());
        assert!(parse_number("1__000").is_err());
    }

    #[test]
    fn parse_number_float_and_overflow() {
        assert_eq!(parse_number("2.5").unwrap(), Value::Float(2.5));
        assert_eq!(parse_number("1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(parse_number(&u64::MAX.to_string()).unwrap(), Value::Unsigned(u64::MAX));
        assert!(parse_number(&format!("-{}", u64::MAX)).is_err());
    }

    #[test]
    fn parse_number_round_trip() {
        for n in [0i64, 1, -1, 42, i64::MAX, i64::MIN, i64::MIN + 1] {
            let v = parse_number(&n.to_string()).unwrap();
            assert_eq!(v, Value::Signed(n));
        }
    }

    #[test]
    fn parse_timestamp_with_fraction() {
        let v = parse_timestamp("5.25").unwrap();
        assert_eq!(v, Value::Timestamp(5_250_000_000));
    }

    #[test]
    fn parse_datetime_full() {
        let v = parse_datetime("2026-07-31T12:30:45.5Z").unwrap();
        match v {
            Value::DateTime(dt) => {
                assert_eq!((dt.year, dt.month, dt.day), (2026, 7, 31));
                assert_eq!((dt.hour, dt.minute, dt.second), (12, 30, 45));
                assert_eq!(dt.nanosecond, 500_000_000);
                assert_eq!(dt.utc_offset_secs, 0);
            }
            _ => panic!("expected datetime"),
        }
    }

    #[test]
    fn parse_datetime_date_only() {
        let v = parse_datetime("20260731").unwrap();
        match v {
            Value::DateTime(dt) => assert_eq!((dt.year, dt.month, dt.day), (2026, 7, 31)),
            _ => panic!("expected datetime"),
        }
    }

    #[test]
    fn parse_datetime_with_offset() {
        let v = parse_datetime("2026-07-31 12:00:00+05:30").unwrap();
        match v {
            Value::DateTime(dt) => assert_eq!(dt.utc_offset_secs, 5 * 3600 + 30 * 60),
            _ => panic!("expected datetime"),
        }
    }

    #[test]
    fn subnet_cidr_notation() {
        let sa = parse_subnet("192.168.0.0/24", None).unwrap();
        assert_eq!(sa.family(), AddressFamily::Inet);
        assert_eq!(sa.netmask(), Some(24));
    }

    #[test]
    fn subnet_dotted_netmask_matches_cidr() {
        let a = parse_subnet("192.168.0.0/24", None).unwrap();
        let b = parse_subnet("192.168.0.0", Some("255.255.255.0")).unwrap();
        assert_eq!(a.netmask(), b.netmask());
        assert_eq!(format!("{:?}", a.addr()), format!("{:?}", b.addr()));
    }

    #[test]
    fn subnet_bad_netmask_rejected() {
        assert!(parse_subnet("192.168.0.0/124", None).is_err());
    }

    #[test]
    fn inet_address_host_and_port() {
        let sa = parse_inet_address("127.0.0.1:8080").unwrap();
        assert_eq!(sa.port(), 8080);
    }

    #[test]
    fn inet_address_ipv6_bracketed() {
        let sa = parse_inet_address("[::1]:443").unwrap();
        assert_eq!(sa.family(), AddressFamily::Inet6);
        assert_eq!(sa.port(), 443);
    }
}
