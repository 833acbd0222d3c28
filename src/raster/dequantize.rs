use super::{DataType, Samples, Tile};

/// Quantized value marking a pixel without data.
pub const NODATA_SENTINEL: f32 = -128.0;

const SCALE: f32 = 127.5;

/// Maps a quantized sample back to its physical value: sign(v) * (v / 127.5)^2.
pub fn dequantize_value(value: f32) -> f32 {
    if value == NODATA_SENTINEL {
        return f32::NAN;
    }
    let scaled = value / SCALE;
    if value < 0.0 {
        -(scaled * scaled)
    } else {
        scaled * scaled
    }
}

/// Converts every sample of a quantized tile to float32, marking sentinels as NaN.
///
/// The sentinel test runs against the quantized input, so the output never
/// holds a finite value where the source held -128.
pub fn dequantize(tile: &Tile) -> Tile {
    let values = (0..tile.samples.len())
        .map(|i| tile.samples.get(i).map(|v| v as f32).unwrap_or(f32::NAN))
        .map(dequantize_value)
        .collect();

    let mut profile = tile.profile.clone();
    profile.dtype = DataType::Float32;
    profile.nodata = Some(f64::NAN);

    Tile {
        samples: Samples::Float32(values),
        profile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::tests::profile;
    use approx::assert_relative_eq;

    #[test]
    fn dequantizes_single_values() {
        assert_relative_eq!(dequantize_value(127.0), 0.992_18, epsilon = 1e-5);
        assert_relative_eq!(dequantize_value(-127.0), -0.992_18, epsilon = 1e-5);
        assert_eq!(dequantize_value(0.0), 0.0);
        assert!(dequantize_value(-128.0).is_nan());
        assert_relative_eq!(dequantize_value(-127.5), -1.0);
    }

    #[test]
    fn preserves_shape_and_sign() {
        let samples = Samples::Int8(vec![-128, -64, 0, 64, 127, -1]);
        let tile = Tile::new(samples, profile(DataType::Int8, 2, 3, 1)).unwrap();
        let out = dequantize(&tile);

        assert_eq!(out.profile.dtype, DataType::Float32);
        assert_eq!(out.bands(), 2);
        assert_eq!(out.width(), 3);
        assert_eq!(out.height(), 1);
        assert!(out.profile.nodata.unwrap().is_nan());

        let Samples::Float32(values) = &out.samples else {
            panic!("expected float32 samples");
        };
        assert!(values[0].is_nan());
        assert!(values[1] < 0.0);
        assert_eq!(values[2], 0.0);
        assert!(values[3] > 0.0);
        assert_relative_eq!(values[1], -values[3]);
        assert!(values[5] < 0.0 && values[5] > -0.001);
        assert_eq!(values.iter().filter(|v| v.is_nan()).count(), 1);
    }

    #[test]
    fn keeps_spatial_metadata() {
        let samples = Samples::Int8(vec![1; 4]);
        let tile = Tile::new(samples, profile(DataType::Int8, 1, 2, 2)).unwrap();
        let out = dequantize(&tile);
        assert_eq!(out.profile.transform, tile.profile.transform);
        assert_eq!(out.profile.crs, tile.profile.crs);
    }
}
