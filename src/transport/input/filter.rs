//! Source filtering applied to every incoming packet (spec.md §4.3): loopback
//! rejection, then whitelist, then blacklist.

use std::net::Ipv4Addr;

use crate::descriptors::InputFilter;

pub fn accepts(filter: &InputFilter, source: Ipv4Addr, local_addrs: &[Ipv4Addr]) -> bool {
    if filter.ignore_self && local_addrs.contains(&source) {
        return false;
    }
    if let Some(only) = filter.source_ip {
        if source != only {
            return false;
        }
    }
    if let Some(blocked) = filter.ignore_ip {
        if source == blocked {
            return false;
        }
    }
    true
}

/// Enumerate non-loopback IPv4 addresses of local interfaces, computed once
/// at startup per spec.md §4.3 ("computed once at start").
pub fn local_ipv4_addrs() -> Vec<Ipv4Addr> {
    match if_addrs::get_if_addrs() {
        Ok(addrs) => addrs
            .into_iter()
            .filter(|a| !a.is_loopback())
            .filter_map(|a| match a.ip() {
                std::net::IpAddr::V4(v4) => Some(v4),
                std::net::IpAddr::V6(_) => None,
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_self_drops_local_sender() {
        let filter = InputFilter { ignore_self: true, source_ip: None, ignore_ip: None };
        let local = vec![Ipv4Addr::new(10, 0, 0, 5)];
        assert!(!accepts(&filter, Ipv4Addr::new(10, 0, 0, 5), &local));
        assert!(accepts(&filter, Ipv4Addr::new(10, 0, 0, 9), &local));
    }

    #[test]
    fn whitelist_rejects_everything_else() {
        let filter = InputFilter {
            ignore_self: false,
            source_ip: Some(Ipv4Addr::new(192, 168, 1, 50)),
            ignore_ip: None,
        };
        assert!(accepts(&filter, Ipv4Addr::new(192, 168, 1, 50), &[]));
        assert!(!accepts(&filter, Ipv4Addr::new(192, 168, 1, 51), &[]));
    }

    #[test]
    fn blacklist_rejects_named_source() {
        let filter = InputFilter {
            ignore_self: false,
            source_ip: None,
            ignore_ip: Some(Ipv4Addr::new(192, 168, 1, 50)),
        };
        assert!(!accepts(&filter, Ipv4Addr::new(192, 168, 1, 50), &[]));
        assert!(accepts(&filter, Ipv4Addr::new(192, 168, 1, 51), &[]));
    }
}
