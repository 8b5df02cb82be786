use oxizip_core::bytes::{ZipEightByteInteger, ZipLong, ZipShort};
use proptest::prelude::*;

proptest! {
    #[test]
    fn short_decode_inverts_encode(value in any::<u16>()) {
        let bytes = ZipShort::new(value).to_bytes();
        prop_assert_eq!(ZipShort::from_bytes(&bytes, 0).unwrap().value(), value);
    }

    #[test]
    fn long_decode_inverts_encode(value in any::<u32>()) {
        let bytes = ZipLong::new(value).to_bytes();
        prop_assert_eq!(ZipLong::from_bytes(&bytes, 0).unwrap().value(), value);
    }

    #[test]
    fn eight_byte_decode_inverts_encode(value in any::<u64>(), prefix in 0usize..4) {
        let mut buf = vec![0xEEu8; prefix];
        buf.extend_from_slice(&ZipEightByteInteger::new(value).to_bytes());
        prop_assert_eq!(ZipEightByteInteger::from_bytes(&buf, prefix).unwrap().value(), value);
    }

    #[test]
    fn magnitude_round_trip_keeps_bit_pattern(value in any::<i64>()) {
        let magnitude = ZipEightByteInteger::to_unsigned_magnitude(value);
        prop_assert_eq!(magnitude, value as u64);
        prop_assert_eq!(ZipEightByteInteger::from_magnitude(u128::from(magnitude)), value);
    }
}

#[test]
fn minus_one_is_all_ones() {
    let field = ZipEightByteInteger::from_i64(-1);
    assert_eq!(field.to_bytes(), [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(
        ZipEightByteInteger::to_unsigned_magnitude(field.long_value()),
        u64::MAX
    );
}
