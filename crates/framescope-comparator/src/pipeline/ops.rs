use framescope_types::{CHANNELS, HISTOGRAM_BINS};
use image::RgbImage;

pub type ChannelCounts = [[u32; HISTOGRAM_BINS]; CHANNELS];

/// Bucket of an 8-bit channel value, `floor(value / 255 * (bins - 1))`.
pub fn quantize(value: u8, bins: usize) -> usize {
    value as usize * (bins - 1) / 255
}

pub fn channel_counts(image: &RgbImage) -> ChannelCounts {
    let mut counts = [[0u32; HISTOGRAM_BINS]; CHANNELS];
    for pixel in image.pixels() {
        for (channel, value) in pixel.0.iter().enumerate() {
            counts[channel][quantize(*value, HISTOGRAM_BINS)] += 1;
        }
    }
    counts
}

/// Divides every count by `total`, concatenating channels in order.
pub fn normalize(counts: &ChannelCounts, total: u32) -> Vec<f32> {
    let total = total.max(1) as f32;
    counts
        .iter()
        .flat_map(|channel| channel.iter().map(move |count| *count as f32 / total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn quantize_covers_the_full_range() {
        assert_eq!(quantize(0, HISTOGRAM_BINS), 0);
        assert_eq!(quantize(4, HISTOGRAM_BINS), 0);
        assert_eq!(quantize(5, HISTOGRAM_BINS), 1);
        assert_eq!(quantize(85, HISTOGRAM_BINS), 21);
        assert_eq!(quantize(254, HISTOGRAM_BINS), 62);
        assert_eq!(quantize(255, HISTOGRAM_BINS), 63);
    }

    #[test]
    fn counts_every_pixel_once_per_channel() {
        let image = RgbImage::from_pixel(4, 2, Rgb([255, 0, 128]));
        let counts = channel_counts(&image);
        assert_eq!(counts[0][63], 8);
        assert_eq!(counts[1][0], 8);
        assert_eq!(counts[2][31], 8);
        for channel in counts.iter() {
            assert_eq!(channel.iter().sum::<u32>(), 8);
        }
    }

    #[test]
    fn normalize_concatenates_channels() {
        let image = RgbImage::from_pixel(2, 2, Rgb([0, 255, 0]));
        let values = normalize(&channel_counts(&image), 4);
        assert_eq!(values.len(), HISTOGRAM_BINS * CHANNELS);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[HISTOGRAM_BINS + 63], 1.0);
        assert_eq!(values[2 * HISTOGRAM_BINS], 1.0);
    }
}
