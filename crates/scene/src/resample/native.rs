//! Aggregation and replication between aligned grids.

use rayon::prelude::*;

/// Mean of each `factor x factor` block. NaN values are skipped; a block
/// with no valid values is NaN.
///
/// `width` and `height` must be multiples of `factor`.
pub fn block_mean(
    data: &[f32],
    width: usize,
    height: usize,
    factor: usize,
    chunk_rows: usize,
) -> Vec<f32> {
    let new_width = width / factor;
    let new_height = height / factor;
    if new_width == 0 || new_height == 0 {
        return Vec::new();
    }

    let mut output = vec![f32::NAN; new_width * new_height];
    output
        .par_chunks_mut(new_width * chunk_rows)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let first_row = chunk_idx * chunk_rows;
            for (i, out) in chunk.iter_mut().enumerate() {
                let out_y = first_row + i / new_width;
                let out_x = i % new_width;
                *out = mean_of_block(data, width, out_x * factor, out_y * factor, factor);
            }
        });
    output
}

#[inline]
fn mean_of_block(data: &[f32], width: usize, x0: usize, y0: usize, factor: usize) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0u32;
    for y in y0..y0 + factor {
        let row = &data[y * width + x0..y * width + x0 + factor];
        for &v in row {
            if !v.is_nan() {
                sum += v as f64;
                count += 1;
            }
        }
    }
    if count == 0 {
        f32::NAN
    } else {
        (sum / count as f64) as f32
    }
}

/// Repeat each pixel into a `factor x factor` block.
pub fn replicate(
    data: &[f32],
    width: usize,
    height: usize,
    factor: usize,
    chunk_rows: usize,
) -> Vec<f32> {
    let new_width = width * factor;
    let new_height = height * factor;
    let mut output = vec![f32::NAN; new_width * new_height];
    if output.is_empty() {
        return output;
    }

    output
        .par_chunks_mut(new_width * chunk_rows)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let first_row = chunk_idx * chunk_rows;
            for (i, row) in chunk.chunks_mut(new_width).enumerate() {
                let src_row = &data[((first_row + i) / factor) * width..][..width];
                for (x, out) in row.iter_mut().enumerate() {
                    *out = src_row[x / factor];
                }
            }
        });
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_mean_skips_nan() {
        #[rustfmt::skip]
        let data = vec![
            1.0, f32::NAN, 5.0, 5.0,
            3.0, f32::NAN, 5.0, 5.0,
            f32::NAN, f32::NAN, 0.0, 4.0,
            f32::NAN, f32::NAN, 8.0, 4.0,
        ];
        let out = block_mean(&data, 4, 4, 2, 1);
        assert_eq!(out[0], 2.0);
        assert_eq!(out[1], 5.0);
        assert!(out[2].is_nan());
        assert_eq!(out[3], 4.0);
    }

    #[test]
    fn test_block_mean_chunking_is_irrelevant() {
        let data: Vec<f32> = (0..36 * 36).map(|v| (v % 17) as f32).collect();
        let a = block_mean(&data, 36, 36, 3, 1);
        let b = block_mean(&data, 36, 36, 3, 1024);
        assert_eq!(a, b);
        assert_eq!(a.len(), 144);
    }

    #[test]
    fn test_replicate() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let out = replicate(&data, 2, 2, 2, 3);
        #[rustfmt::skip]
        assert_eq!(out, vec![
            1.0, 1.0, 2.0, 2.0,
            1.0, 1.0, 2.0, 2.0,
            3.0, 3.0, 4.0, 4.0,
            3.0, 3.0, 4.0, 4.0,
        ]);
    }
}
