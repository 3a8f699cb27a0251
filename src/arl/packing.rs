//! The ARL byte packing of one grid.
//!
//! Each cell is stored as one byte holding the difference to the previous
//! cell of its row, scaled by `2^(7 - exponent)` and offset by 127. The
//! first cell of a row is relative to the first cell of the row below it,
//! and the very first cell to the reference value stored in the label.
//! Differences are taken against the values a reader reconstructs, so the
//! quantization error does not accumulate along a row.

use crate::error::{CodecResult, UsageError};

/// A grid packed into bytes, with what the record label needs to unpack it.
#[derive(Clone, Debug, PartialEq)]
pub struct Packed {
    pub bytes: Vec<u8>,
    /// Scaling exponent.
    pub exponent: i32,
    /// Size of one quantization step, `2^exponent / 254`.
    pub precision: f32,
    /// Value of the first cell.
    pub reference: f32,
    pub checksum: u16,
}

fn scale(exponent: i32) -> f32 {
    2f32.powi(7 - exponent)
}

/// Pack `nx * ny` values given row by row, southern row first.
pub fn pack(values: &[f32], nx: usize, ny: usize) -> CodecResult<Packed> {
    let expected = nx * ny;
    if values.len() != expected || expected == 0 {
        return Err(UsageError::DataSizeMismatch {
            expected,
            found: values.len(),
        }
        .into());
    }

    let reference = values[0];
    let rows = || values.chunks_exact(nx);

    // Largest difference the bytes have to hold.
    let mut rold = reference;
    let mut rmax = 0f32;
    for row in rows() {
        for &value in row {
            rmax = rmax.max((value - rold).abs());
            rold = value;
        }
        rold = row[0];
    }

    let sexp = if rmax != 0.0 { rmax.log2() } else { 0.0 };
    // Truncation toward zero, then one up unless log2 is negative with a
    // fractional part.
    let mut exponent = sexp as i32;
    if sexp >= 0.0 || sexp % 1.0 == 0.0 {
        exponent += 1;
    }
    let precision = 2f32.powi(exponent) / 254.0;
    let scale = scale(exponent);

    let mut bytes = Vec::with_capacity(expected);
    let mut rcol = reference;
    for row in rows() {
        let mut rold = rcol;
        for (i, &value) in row.iter().enumerate() {
            let icval = ((value - rold) * scale + 127.5) as i32;
            bytes.push(icval as u8);
            rold = (icval - 127) as f32 / scale + rold;
            if i == 0 {
                rcol = rold;
            }
        }
    }

    let checksum = checksum(&bytes);
    Ok(Packed {
        bytes,
        exponent,
        precision,
        reference,
        checksum,
    })
}

/// Unpack `bytes` into values, row by row, southern row first.
pub fn unpack(bytes: &[u8], nx: usize, exponent: i32, reference: f32) -> Vec<f32> {
    let scale = scale(exponent);
    let mut values = Vec::with_capacity(bytes.len());
    let mut vold = reference;
    for row in bytes.chunks(nx.max(1)) {
        let first = values.len();
        for &b in row {
            let value = (f32::from(b) - 127.0) / scale + vold;
            values.push(value);
            vold = value;
        }
        vold = values[first];
    }
    values
}

/// Rotating checksum of a packed record, kept in the index record.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut ksum = 0u16;
    for &b in bytes {
        ksum += u16::from(b);
        if ksum >= 256 {
            ksum -= 255;
        }
    }
    ksum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Vec<f32> {
        (0..9).map(|v| v as f32).collect()
    }

    #[test]
    fn packs_a_small_ramp() {
        let packed = pack(&ramp(), 3, 3).unwrap();
        // The largest step is 3 (between the starts of two rows), so the
        // exponent is 2 and one unit is 1/32.
        assert_eq!(packed.exponent, 2);
        assert_eq!(packed.precision, 4.0 / 254.0);
        assert_eq!(packed.reference, 0.0);
        assert_eq!(packed.bytes, vec![127, 159, 159, 223, 159, 159, 223, 159, 159]);
        assert_eq!(packed.checksum, 252);
    }

    #[test]
    fn unpacks_exactly_representable_values() {
        let packed = pack(&ramp(), 3, 3).unwrap();
        let values = unpack(&packed.bytes, 3, packed.exponent, packed.reference);
        assert_eq!(values, ramp());
    }

    #[test]
    fn repacking_is_stable() {
        let (nx, ny) = (7, 5);
        let values: Vec<f32> = (0..ny)
            .flat_map(|j| (0..nx).map(move |i| 280.0 + 0.3 * i as f32 + 0.7 * j as f32))
            .collect();

        let first = pack(&values, nx, ny).unwrap();
        assert_eq!(first.exponent, 0);
        let decoded = unpack(&first.bytes, nx, first.exponent, first.reference);
        let second = pack(&decoded, nx, ny).unwrap();

        assert_eq!(second.bytes, first.bytes);
        assert_eq!(second.exponent, first.exponent);
        for (a, b) in decoded.iter().zip(&values) {
            assert!((a - b).abs() < 0.005, "{} vs {}", a, b);
        }
    }

    #[test]
    fn constant_field() {
        let packed = pack(&[5.0; 4], 2, 2).unwrap();
        assert_eq!(packed.exponent, 1);
        assert!(packed.bytes.iter().all(|&b| b == 127));
        assert_eq!(unpack(&packed.bytes, 2, packed.exponent, packed.reference), vec![5.0; 4]);
    }

    #[test]
    fn exponent_rule_at_powers_of_two() {
        // log2(0.5) = -1 exactly: incremented to 0.
        assert_eq!(pack(&[0.0, 0.5], 2, 1).unwrap().exponent, 0);
        // log2(0.75) = -0.415: truncated to 0, not incremented.
        assert_eq!(pack(&[0.0, 0.75], 2, 1).unwrap().exponent, 0);
        // log2(4) = 2: incremented to 3.
        assert_eq!(pack(&[0.0, 4.0], 2, 1).unwrap().exponent, 3);
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[255, 1]), 1);
        assert_eq!(checksum(&[200, 100]), 45);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn size_must_match() {
        assert!(pack(&[1.0; 5], 3, 2).is_err());
        assert!(pack(&[], 0, 0).is_err());
    }
}
