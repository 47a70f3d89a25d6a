//! Sample-level PCM math over 16-bit little-endian frames
//!
//! Gains are integer percentages (0..=100). Scaling rounds to nearest and
//! every summed sample is clamped to the i16 range, so a transient where
//! both gains are nonzero mid-ramp cannot wrap around.

/// Scale one sample by a percentage gain, rounding to nearest.
#[inline]
fn scale(sample: i16, gain: i32) -> i32 {
    (f32::from(sample) * (gain as f32 / 100.0)).round() as i32
}

/// Read the 16-bit LE sample starting at `buf[i]`.
#[inline]
fn sample_at(buf: &[u8], i: usize) -> i16 {
    i16::from_le_bytes([buf[i], buf[i + 1]])
}

/// Blend two PCM chunks: the overlapping head is summed sample-by-sample
/// with each side scaled by its own gain; when the chunks differ in length,
/// the longer chunk's tail is carried through scaled by that track's gain.
///
/// The output length equals the longer input's length (even-aligned).
pub fn blend_chunks(a: &[u8], b: &[u8], gain_a: i32, gain_b: i32) -> Vec<u8> {
    let overlap = a.len().min(b.len()) & !1;
    let (longer, longer_gain) = if a.len() >= b.len() {
        (a, gain_a)
    } else {
        (b, gain_b)
    };

    let mut out = Vec::with_capacity(longer.len() & !1);
    let mut i = 0;
    while i < overlap {
        let sum = scale(sample_at(a, i), gain_a) + scale(sample_at(b, i), gain_b);
        let clamped = sum.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        out.extend_from_slice(&clamped.to_le_bytes());
        i += 2;
    }
    while i + 1 < longer.len() {
        let scaled = scale(sample_at(longer, i), longer_gain)
            .clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        out.extend_from_slice(&scaled.to_le_bytes());
        i += 2;
    }
    out
}

/// Scale a whole chunk by one gain. Used when only a single track still
/// has data.
pub fn apply_gain(buf: &[u8], gain: i32) -> Vec<u8> {
    if gain == 100 {
        return buf[..buf.len() & !1].to_vec();
    }
    let mut out = Vec::with_capacity(buf.len() & !1);
    for pair in buf.chunks_exact(2) {
        let scaled = scale(i16::from_le_bytes([pair[0], pair[1]]), gain)
            .clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        out.extend_from_slice(&scaled.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn samples(buf: &[u8]) -> Vec<i16> {
        buf.chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect()
    }

    #[test]
    fn test_blend_equal_length_full_gains() {
        let a = pcm(&[100, -200, 300]);
        let b = pcm(&[50, 50, -50]);
        let out = blend_chunks(&a, &b, 100, 100);
        assert_eq!(samples(&out), vec![150, -150, 250]);
    }

    #[test]
    fn test_blend_scales_each_side_by_its_own_gain() {
        let a = pcm(&[1000]);
        let b = pcm(&[1000]);
        let out = blend_chunks(&a, &b, 50, 10);
        assert_eq!(samples(&out), vec![600]);
    }

    #[test]
    fn test_blend_clamps_positive_and_negative_overflow() {
        let a = pcm(&[i16::MAX, i16::MIN]);
        let b = pcm(&[20000, -20000]);
        let out = blend_chunks(&a, &b, 100, 100);
        assert_eq!(samples(&out), vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_blend_mid_ramp_sum_over_100_percent_is_clamped() {
        // During the crossfade overlap both gains can be nonzero at once
        let a = pcm(&[30000]);
        let b = pcm(&[30000]);
        let out = blend_chunks(&a, &b, 100, 10);
        assert_eq!(samples(&out), vec![i16::MAX]);
    }

    #[test]
    fn test_blend_longer_tail_keeps_its_gain() {
        let a = pcm(&[100, 200, 300, 400, 500]); // 10 bytes
        let b = pcm(&[10, 10, 10]); // 6 bytes
        let out = blend_chunks(&a, &b, 100, 100);
        assert_eq!(out.len(), 10);
        assert_eq!(samples(&out), vec![110, 210, 310, 400, 500]);

        let out = blend_chunks(&a, &b, 50, 100);
        assert_eq!(samples(&out), vec![60, 110, 160, 200, 250]);
    }

    #[test]
    fn test_blend_tail_taken_from_whichever_side_is_longer() {
        let a = pcm(&[10]);
        let b = pcm(&[10, 40]);
        let out = blend_chunks(&a, &b, 100, 50);
        assert_eq!(samples(&out), vec![15, 20]);
    }

    #[test]
    fn test_rounding_is_to_nearest_not_truncation() {
        // 3 * 0.5 = 1.5 rounds to 2; truncation would give 1
        let out = apply_gain(&pcm(&[3]), 50);
        assert_eq!(samples(&out), vec![2]);
        let out = apply_gain(&pcm(&[-3]), 50);
        assert_eq!(samples(&out), vec![-2]);
    }

    #[test]
    fn test_apply_gain_zero_silences() {
        let out = apply_gain(&pcm(&[1234, -5678]), 0);
        assert_eq!(samples(&out), vec![0, 0]);
    }

    #[test]
    fn test_apply_gain_full_is_identity() {
        let buf = pcm(&[7, -8, 9]);
        assert_eq!(apply_gain(&buf, 100), buf);
    }

    #[test]
    fn test_odd_trailing_byte_is_dropped() {
        let mut a = pcm(&[100]);
        a.push(0xFF); // stray byte, not a full sample
        let out = blend_chunks(&a, &pcm(&[100]), 100, 100);
        assert_eq!(samples(&out), vec![200]);
        assert_eq!(apply_gain(&a, 100).len(), 2);
    }
}
