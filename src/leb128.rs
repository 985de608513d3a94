/// Maximum encoded size of a 32-bit LEB128 value.
pub const MAX_LEB128_SIZE: usize = 5;

#[inline]
pub fn encode_leb128(value: u32) -> ([u8; MAX_LEB128_SIZE], usize) {
    let mut buffer = [0u8; MAX_LEB128_SIZE];
    let mut cursor = &mut buffer[..];
    match leb128::write::unsigned(&mut cursor, value as u64) {
        Ok(size) => (buffer, size),
        Err(err) => panic!("Error encoding ULEB128 value {}: {:?}", value, err),
    }
}

#[inline]
pub fn encode_sleb128(value: i32) -> ([u8; MAX_LEB128_SIZE], usize) {
    let mut buffer = [0u8; MAX_LEB128_SIZE];
    let mut cursor = &mut buffer[..];
    match leb128::write::signed(&mut cursor, value as i64) {
        Ok(size) => (buffer, size),
        Err(err) => panic!("Error encoding SLEB128 value {}: {:?}", value, err),
    }
}

/// ULEB128p1: the value plus one, unsigned. Encodes -1 as a single zero
/// byte, which is how absent indices are stored.
#[inline(always)]
pub fn encode_leb128p1(value: i32) -> ([u8; MAX_LEB128_SIZE], usize) {
    encode_leb128(value.wrapping_add(1) as u32)
}

/// Number of bytes `value` occupies as ULEB128.
#[inline]
pub const fn leb128_size(value: u32) -> usize {
    let mut value = value;
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}

/// Number of bytes `value` occupies as SLEB128.
#[inline]
pub const fn sleb128_size(value: i32) -> usize {
    let mut value = value;
    let mut size = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        size += 1;
        if (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0) {
            break;
        }
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uleb_bytes(value: u32) -> Vec<u8> {
        let (bytes, size) = encode_leb128(value);
        bytes[..size].to_vec()
    }

    fn sleb_bytes(value: i32) -> Vec<u8> {
        let (bytes, size) = encode_sleb128(value);
        bytes[..size].to_vec()
    }

    #[test]
    fn test_encode_leb128() {
        assert_eq!(uleb_bytes(0), &[0x00]);
        assert_eq!(uleb_bytes(1), &[0x01]);
        assert_eq!(uleb_bytes(127), &[0x7f]);
        assert_eq!(uleb_bytes(128), &[0x80, 0x01]);
        assert_eq!(uleb_bytes(16384), &[0x80, 0x80, 0x01]);
        assert_eq!(uleb_bytes(u32::MAX), &[0xff, 0xff, 0xff, 0xff, 0x0f]);
    }

    #[test]
    fn test_encode_sleb128() {
        assert_eq!(sleb_bytes(0), &[0x00]);
        assert_eq!(sleb_bytes(1), &[0x01]);
        assert_eq!(sleb_bytes(-1), &[0x7f]);
        assert_eq!(sleb_bytes(-128), &[0x80, 0x7f]);
        assert_eq!(sleb_bytes(127), &[0xff, 0x00]);
    }

    #[test]
    fn test_encode_leb128p1() {
        let (bytes, size) = encode_leb128p1(-1);
        assert_eq!(&bytes[..size], &[0x00]);
        let (bytes, size) = encode_leb128p1(0);
        assert_eq!(&bytes[..size], &[0x01]);
        let (bytes, size) = encode_leb128p1(127);
        assert_eq!(&bytes[..size], &[0x80, 0x01]);
    }

    #[test]
    fn test_round_trip_against_reader() {
        for value in [0u32, 1, 127, 128, 16383, 16384, u32::MAX] {
            let encoded = uleb_bytes(value);
            let decoded = leb128::read::unsigned(&mut encoded.as_slice()).unwrap();
            assert_eq!(decoded, value as u64);
        }
        for value in [0i32, 1, -1, 63, -64, -65, i32::MIN, i32::MAX] {
            let encoded = sleb_bytes(value);
            let decoded = leb128::read::signed(&mut encoded.as_slice()).unwrap();
            assert_eq!(decoded, value as i64);
        }
    }

    #[test]
    fn test_sizes_match_encoding() {
        for value in [0u32, 1, 127, 128, 16383, 16384, 1 << 21, u32::MAX] {
            assert_eq!(leb128_size(value), uleb_bytes(value).len());
        }
        for value in [0i32, 1, -1, 63, 64, -64, -65, 127, -128, i32::MIN, i32::MAX] {
            assert_eq!(sleb128_size(value), sleb_bytes(value).len());
        }
    }
}
