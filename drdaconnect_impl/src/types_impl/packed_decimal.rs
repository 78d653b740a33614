use crate::{DrdaError, DrdaResult};
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};

// Packed decimal: one digit per nibble, right-aligned, followed by a sign nibble
// (0xC positive, 0xD negative; 0xA..0xF are accepted on input, 0xB and 0xD being negative).
// A value of precision p occupies p/2+1 bytes.

/// Largest precision the protocol can transport.
pub(crate) const MAX_PRECISION: usize = 31;

const SIGN_POSITIVE: u8 = 0x0C;
const SIGN_NEGATIVE: u8 = 0x0D;

/// Precision and scale with which a value is sent.
///
/// The precision is the number of digits of the unscaled value, at least the scale,
/// and at least 1; a negative scale is folded into the unscaled value.
pub(crate) fn precision_and_scale(value: &BigDecimal) -> DrdaResult<(u8, u8)> {
    let (digits, scale) = unscaled_digits(value);
    let precision = digits.len().max(scale).max(1);
    if precision > MAX_PRECISION || scale > MAX_PRECISION {
        return Err(DrdaError::UsageDetailed(format!(
            "decimal {value} exceeds the maximal precision of {MAX_PRECISION}"
        )));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok((precision as u8, scale as u8))
}

/// Encodes a value with the given precision and scale.
pub(crate) fn to_packed(value: &BigDecimal, precision: u8, scale: u8) -> DrdaResult<Vec<u8>> {
    let value = value.with_scale(i64::from(scale));
    let (digits, _) = unscaled_digits(&value);
    let byte_count = usize::from(precision) / 2 + 1;
    let nibble_count = 2 * byte_count - 1;
    if digits.len() > nibble_count {
        return Err(DrdaError::UsageDetailed(format!(
            "decimal {value} does not fit into precision {precision}"
        )));
    }

    let mut nibbles = vec![0_u8; nibble_count - digits.len()];
    nibbles.extend(digits.bytes().map(|b| b - b'0'));
    nibbles.push(if value.sign() == Sign::Minus {
        SIGN_NEGATIVE
    } else {
        SIGN_POSITIVE
    });
    Ok(nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect())
}

/// Decodes a packed decimal with the given scale.
pub(crate) fn from_packed(bytes: &[u8], scale: u8) -> DrdaResult<BigDecimal> {
    let Some((last, leading)) = bytes.split_last() else {
        return Err(impl_err!("empty packed decimal"));
    };
    let mut digits = String::with_capacity(2 * bytes.len());
    for b in leading {
        push_digit(&mut digits, b >> 4)?;
        push_digit(&mut digits, b & 0x0F)?;
    }
    push_digit(&mut digits, last >> 4)?;

    let sign = match last & 0x0F {
        0x0B | 0x0D => Sign::Minus,
        0x0A | 0x0C | 0x0E | 0x0F => Sign::Plus,
        s => return Err(impl_err!("invalid packed decimal sign nibble 0x{s:X}")),
    };
    let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| impl_err!("invalid packed decimal digits {digits}"))?;
    let unscaled = if sign == Sign::Minus {
        -magnitude
    } else {
        magnitude
    };
    Ok(BigDecimal::new(unscaled, i64::from(scale)))
}

fn push_digit(digits: &mut String, nibble: u8) -> DrdaResult<()> {
    if nibble > 9 {
        return Err(impl_err!("invalid packed decimal digit 0x{nibble:X}"));
    }
    digits.push(char::from(b'0' + nibble));
    Ok(())
}

// Decimal digits of the absolute unscaled value, and the (non-negative) scale.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unscaled_digits(value: &BigDecimal) -> (String, usize) {
    let (mut unscaled, exponent) = value.as_bigint_and_exponent();
    let scale = if exponent < 0 {
        unscaled *= BigInt::from(10).pow(exponent.unsigned_abs() as u32);
        0
    } else {
        exponent as usize
    };
    let digits = unscaled.magnitude().to_string();
    (if digits == "0" { String::new() } else { digits }, scale)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    fn roundtrip(s: &str) {
        let value = BigDecimal::from_str(s).unwrap();
        let (precision, scale) = precision_and_scale(&value).unwrap();
        let packed = to_packed(&value, precision, scale).unwrap();
        assert_eq!(packed.len(), usize::from(precision) / 2 + 1);
        assert_eq!(from_packed(&packed, scale).unwrap(), value, "{s}");
    }

    #[test]
    fn test_values() {
        for s in [
            "0",
            "1",
            "-1",
            "123.45",
            "-0.05",
            "99999999999999999999999999999.99",
            "1000000",
        ] {
            roundtrip(s);
        }
    }

    #[test]
    fn test_layout() {
        let value = BigDecimal::from_str("-123.45").unwrap();
        assert_eq!(precision_and_scale(&value).unwrap(), (5, 2));
        assert_eq!(to_packed(&value, 5, 2).unwrap(), vec![0x12, 0x34, 0x5D]);
        // even precision gets a leading zero nibble
        assert_eq!(to_packed(&value, 6, 2).unwrap(), vec![0x00, 0x12, 0x34, 0x5D]);
        assert_eq!(
            to_packed(&BigDecimal::from(7), 1, 0).unwrap(),
            vec![0x7C]
        );
    }

    #[test]
    fn test_negative_scale_and_limits() {
        let value = BigDecimal::new(BigInt::from(12), -3);
        assert_eq!(precision_and_scale(&value).unwrap(), (5, 0));
        let too_long = BigDecimal::from_str("12345678901234567890123456789012").unwrap();
        assert!(precision_and_scale(&too_long).is_err());
        assert!(from_packed(&[0x1A, 0x2C], 0).is_err());
        assert!(from_packed(&[0x12, 0x37], 0).is_err());
    }
}
