/// Calculate the key tag for a DNSKEY record (RFC 4034 Appendix B)
///
/// The REVOKE flag takes part in the calculation, so a revoked key has a
/// different tag than the same key before revocation (RFC 5011 section 2.1).
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    // RSAMD5: upper 16 of the least significant 24 bits of the modulus
    if algorithm == 1 {
        return match public_key {
            [.., hi, lo, _] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };
    }

    let header = flags.to_be_bytes();
    let mut accumulator: u32 = 0;
    for (i, byte) in header
        .iter()
        .chain([protocol, algorithm].iter())
        .chain(public_key.iter())
        .enumerate()
    {
        if i % 2 == 0 {
            accumulator += u32::from(*byte) << 8;
        } else {
            accumulator += u32::from(*byte);
        }
    }

    accumulator += (accumulator >> 16) & 0xFFFF;
    (accumulator & 0xFFFF) as u16
}
