use std::net::{IpAddr, Ipv4Addr};

use ipnet::IpNet;

/// Checks `addr` against a comma separated restriction list.
///
/// Each entry may be a CIDR block (`10.0.0.0/24`), a single address, an IPv4 range on
/// the last octet (`10.0.0.5-20`) or a dotted IPv4 prefix (`10.0.` / `10.0`).
pub fn address_in_subnet(addr: IpAddr, restriction: &str) -> bool {
    restriction
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .any(|entry| entry_matches(addr, entry))
}

fn entry_matches(addr: IpAddr, entry: &str) -> bool {
    if entry.contains('/') {
        return entry
            .parse::<IpNet>()
            .map(|net| net.contains(&normalize(addr)))
            .unwrap_or(false);
    }

    if let Ok(single) = entry.parse::<IpAddr>() {
        return normalize(single) == normalize(addr);
    }

    let IpAddr::V4(v4) = normalize(addr) else {
        return false;
    };

    if let Some((start, end)) = entry.split_once('-') {
        return in_last_octet_range(v4, start.trim(), end.trim());
    }

    in_prefix(v4, entry)
}

/// IPv4-mapped IPv6 addresses compare as their IPv4 form.
fn normalize(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

fn in_last_octet_range(addr: Ipv4Addr, start: &str, end: &str) -> bool {
    let Ok(start) = start.parse::<Ipv4Addr>() else {
        return false;
    };
    let Ok(end) = end.parse::<u8>() else {
        return false;
    };
    let [a, b, c, low] = start.octets();
    let [x, y, z, last] = addr.octets();
    (a, b, c) == (x, y, z) && (low..=end).contains(&last)
}

fn in_prefix(addr: Ipv4Addr, prefix: &str) -> bool {
    let wanted: Vec<&str> = prefix.trim_end_matches('.').split('.').collect();
    if wanted.is_empty() || wanted.len() > 4 {
        return false;
    }
    let octets = addr.octets();
    wanted
        .iter()
        .zip(octets.iter())
        .all(|(part, octet)| part.parse::<u8>().map(|p| p == *octet).unwrap_or(false))
}
