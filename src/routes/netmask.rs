// IPv4 netmask arithmetic

use std::net::Ipv4Addr;

/// Prefix length of a contiguous mask, or None if the mask has holes
pub fn prefix_len(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();

    // Everything after the leading ones must be zero
    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return None;
    }

    Some(ones as u8)
}

/// True when the address has no host bits set under the mask
pub fn is_network_address(addr: Ipv4Addr, mask: Ipv4Addr) -> bool {
    u32::from(addr) & !u32::from(mask) == 0
}

pub fn to_cidr(addr: Ipv4Addr, mask: Ipv4Addr) -> String {
    match prefix_len(mask) {
        Some(len) => format!("{}/{}", addr, len),
        None => format!("{}/{}", addr, mask),
    }
}
