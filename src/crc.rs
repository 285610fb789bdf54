//! # CRC Codecs
//!
//! Table-driven CRC-8, CRC-16 and CRC-32 checksums over whole byte buffers.
//!
//! | Codec | Polynomial | Init | Reflected | XorOut |
//! |-------|------------|------|-----------|--------|
//! | CRC-8/DVB-S2 | 0xD5 | 0x00 | no | 0x00 |
//! | CRC-16/CCITT-FALSE (ECSS-E-ST-70-41) | 0x1021 | 0xFFFF | no | 0x0000 |
//! | CRC-32C (Castagnoli) | 0x1EDC6F41 | 0xFFFFFFFF | yes | 0xFFFFFFFF |
//!
//! There is no incremental API: every call rescans the full buffer.

/// CRC-8-DVB-S2 polynomial
const CRC8_POLY: u8 = 0xD5;

/// CRC-16-CCITT polynomial
const CRC16_POLY: u16 = 0x1021;

/// CRC-16 initial value
const CRC16_INIT: u16 = 0xFFFF;

/// CRC-32C polynomial, bit-reversed for the reflected algorithm
const CRC32_POLY_REFLECTED: u32 = 0x82F6_3B78;

/// CRC-32C initial value and final XOR
const CRC32_INIT: u32 = 0xFFFF_FFFF;
const CRC32_XOR_OUT: u32 = 0xFFFF_FFFF;

const CRC8_TABLE: [u8; 256] = generate_crc8_table();
const CRC16_TABLE: [u16; 256] = generate_crc16_table();
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ CRC16_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;

        while j < 8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC32_POLY_REFLECTED;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the CRC-8/DVB-S2 checksum of `data`
///
/// # Examples
///
/// ```
/// use obc_comms::crc::crc8;
///
/// assert_eq!(crc8(b"123456789"), 0xBC);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc = CRC8_TABLE[(crc ^ byte) as usize];
    }

    crc
}

/// Calculate the CRC-16/CCITT-FALSE checksum of `data`
///
/// This is the packet error control CRC of ECSS-E-ST-70-41, used on the
/// ground segment for telemetry and telecommand packets.
///
/// # Examples
///
/// ```
/// use obc_comms::crc::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x29B1);
/// assert_eq!(crc16(&[]), 0xFFFF);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        let idx = ((crc >> 8) as u8 ^ byte) as usize;
        crc = (crc << 8) ^ CRC16_TABLE[idx];
    }

    crc
}

/// Calculate the CRC-32C checksum of `data`
///
/// Reflected input and output.
///
/// # Examples
///
/// ```
/// use obc_comms::crc::crc32;
///
/// assert_eq!(crc32(b"123456789"), 0xE306_9283);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = CRC32_INIT;

    for &byte in data {
        let idx = ((crc as u8) ^ byte) as usize;
        crc = CRC32_TABLE[idx] ^ (crc >> 8);
    }

    crc ^ CRC32_XOR_OUT
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK_INPUT: &[u8] = b"123456789";

    fn crc8_slow(data: &[u8]) -> u8 {
        let mut crc: u8 = 0;
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { (crc << 1) ^ CRC8_POLY } else { crc << 1 };
            }
        }
        crc
    }

    fn crc16_slow(data: &[u8]) -> u16 {
        let mut crc = CRC16_INIT;
        for &byte in data {
            crc ^= (byte as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ CRC16_POLY } else { crc << 1 };
            }
        }
        crc
    }

    fn crc32_slow(data: &[u8]) -> u32 {
        let mut crc = CRC32_INIT;
        for &byte in data {
            crc ^= byte as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ CRC32_POLY_REFLECTED } else { crc >> 1 };
            }
        }
        crc ^ CRC32_XOR_OUT
    }

    #[test]
    fn test_check_values() {
        assert_eq!(crc8(CHECK_INPUT), 0xBC);
        assert_eq!(crc16(CHECK_INPUT), 0x29B1);
        assert_eq!(crc32(CHECK_INPUT), 0xE306_9283);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(crc8(&[]), 0x00);
        assert_eq!(crc16(&[]), 0xFFFF);
        assert_eq!(crc32(&[]), 0x0000_0000);
    }

    #[test]
    fn test_crc16_ecss_vectors() {
        // ECSS-E-ST-70-41 annex B verification vectors
        let vectors: [(&[u8], u16); 4] = [
            (&[0x00, 0x00], 0x1D0F),
            (&[0x00, 0x00, 0x00], 0xCC9C),
            (&[0xAB, 0xCD, 0xEF, 0x01], 0x04A2),
            (&[0x14, 0x56, 0xF8, 0x9A, 0x00, 0x01], 0x7FD5),
        ];

        for (data, expected) in vectors {
            assert_eq!(crc16(data), expected, "CRC-16 mismatch for {:02X?}", data);
        }
    }

    #[test]
    fn test_crc16_is_deterministic() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let first = crc16(&data);
        for _ in 0..10 {
            assert_eq!(crc16(&data), first);
        }
    }

    #[test]
    fn test_lookup_tables_match_bitwise() {
        let test_data = [
            vec![0x01, 0x02, 0x03],
            vec![0xFF, 0xFE, 0xFD],
            vec![0x00; 24],
            vec![0xFF; 10],
            b"The quick brown fox jumps over the lazy dog".to_vec(),
        ];

        for data in test_data.iter() {
            assert_eq!(crc8(data), crc8_slow(data), "CRC-8 mismatch for {:?}", data);
            assert_eq!(crc16(data), crc16_slow(data), "CRC-16 mismatch for {:?}", data);
            assert_eq!(crc32(data), crc32_slow(data), "CRC-32 mismatch for {:?}", data);
        }
    }

    #[test]
    fn test_single_bit_flip_changes_every_crc() {
        let original = [0x18, 0x16, 0x00, 0x04];
        let flipped = [0x18, 0x16, 0x00, 0x05];

        assert_ne!(crc8(&original), crc8(&flipped));
        assert_ne!(crc16(&original), crc16(&flipped));
        assert_ne!(crc32(&original), crc32(&flipped));
    }

    #[test]
    fn test_appended_crc16_verifies_to_zero() {
        // Non-reflected CRC with zero xorout: message || crc has residue 0
        let mut frame = b"telemetry".to_vec();
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(crc16(&frame), 0x0000);
    }
}
