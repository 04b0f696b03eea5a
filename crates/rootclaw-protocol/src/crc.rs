//! CRC-8 checksum used to seal every outbound packet.
//!
//! Polynomial 0x07, MSB-first, zero initial value, no final XOR
//! (CRC-8/SMBUS). The robot firmware rejects any packet whose trailing byte
//! does not match this exactly.

const POLYNOMIAL: u8 = 0x07;

/// Byte-at-a-time lookup table, built at compile time.
pub static CRC8_TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC-8 of `bytes`, processed left to right from a zero seed.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[usize::from(crc ^ byte)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitwise_crc8(bytes: &[u8]) -> u8 {
        let mut crc = 0u8;
        for &byte in bytes {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 {
                    (crc << 1) ^ POLYNOMIAL
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn table_matches_bitwise_reference_for_every_byte() {
        for byte in 0..=u8::MAX {
            assert_eq!(
                checksum(&[byte]),
                bitwise_crc8(&[byte]),
                "mismatch for input byte {byte:#04x}"
            );
        }
    }

    #[test]
    fn known_table_entries() {
        assert_eq!(CRC8_TABLE[0x00], 0x00);
        assert_eq!(CRC8_TABLE[0x01], 0x07);
        assert_eq!(CRC8_TABLE[0x80], 0x89);
        assert_eq!(CRC8_TABLE[0xFF], 0xF3);
    }

    #[test]
    fn smbus_check_value() {
        assert_eq!(checksum(b"123456789"), 0xF4);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn multi_byte_matches_reference() {
        let data: Vec<u8> = (0u8..19).map(|i| i.wrapping_mul(37)).collect();
        assert_eq!(checksum(&data), bitwise_crc8(&data));
    }
}
