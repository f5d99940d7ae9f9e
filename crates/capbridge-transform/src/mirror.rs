//! Horizontal mirror on tightly packed frames.

/// Reverse pixel order within every row, in place.
///
/// `pixels` must be tightly packed (`width * bpp` bytes per row).
pub(crate) fn mirror_rows(pixels: &mut [u8], width: u32, bpp: usize) {
    let row_bytes = width as usize * bpp;
    if row_bytes == 0 {
        return;
    }
    for row in pixels.chunks_exact_mut(row_bytes) {
        let (mut left, mut right) = (0usize, width as usize - 1);
        while left < right {
            let (head, tail) = row.split_at_mut(right * bpp);
            head[left * bpp..(left + 1) * bpp].swap_with_slice(&mut tail[..bpp]);
            left += 1;
            right -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leftmost_becomes_rightmost() {
        // 3×2, one byte per pixel for readability.
        let mut px = vec![1, 2, 3, 4, 5, 6];
        mirror_rows(&mut px, 3, 1);
        assert_eq!(px, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn keeps_channel_order_inside_pixels() {
        let mut px = vec![1, 2, 3, 4, 5, 6, 7, 8];
        mirror_rows(&mut px, 2, 4);
        assert_eq!(px, vec![5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn mirroring_twice_is_identity() {
        let original: Vec<u8> = (0..40).collect();
        let mut px = original.clone();
        mirror_rows(&mut px, 5, 4);
        mirror_rows(&mut px, 5, 4);
        assert_eq!(px, original);
    }
}
