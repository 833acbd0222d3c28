/// Affine transform between pixel and projected coordinates, in GDAL order.
///
/// ```text
/// x = c + a * col + b * row
/// y = f + d * col + e * row
/// ```
///
/// `e` is negative for north-up rasters and positive for bottom-up ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// Arguments follow the GDAL geotransform array:
    /// `[x_origin, pixel_width, row_rotation, y_origin, column_rotation, pixel_height]`
    pub const fn new(c: f64, a: f64, b: f64, f: f64, d: f64, e: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn from_gdal(values: [f64; 6]) -> Self {
        let [c, a, b, f, d, e] = values;
        Self::new(c, a, b, f, d, e)
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    pub fn is_valid(&self) -> bool {
        let determinant = self.a * self.e - self.b * self.d;
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
            && determinant.is_normal()
    }

    pub fn is_bottom_up(&self) -> bool {
        self.e > 0.0
    }

    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.c + self.a * col + self.b * row,
            self.f + self.d * col + self.e * row,
        )
    }

    /// Fractional (col, row) of a projected position.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let determinant = self.a * self.e - self.b * self.d;
        let dx = x - self.c;
        let dy = y - self.f;
        let col = (self.e * dx - self.b * dy) / determinant;
        let row = (self.a * dy - self.d * dx) / determinant;
        (col, row)
    }

    /// Integer (row, col) of the pixel containing a projected position.
    pub fn index(&self, x: f64, y: f64) -> (i64, i64) {
        let (col, row) = self.world_to_pixel(x, y);
        (row.floor() as i64, col.floor() as i64)
    }

    /// Transform of a sub-grid whose upper left pixel is (col_off, row_off).
    pub fn window_transform(&self, col_off: u32, row_off: u32) -> Self {
        let (c, f) = self.pixel_to_world(col_off as f64, row_off as f64);
        Self { c, f, ..*self }
    }

    pub fn bounds(&self, width: u32, height: u32) -> Bounds {
        let corners = [
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(width as f64, 0.0),
            self.pixel_to_world(0.0, height as f64),
            self.pixel_to_world(width as f64, height as f64),
        ];
        corners.iter().fold(
            Bounds {
                left: f64::INFINITY,
                bottom: f64::INFINITY,
                right: f64::NEG_INFINITY,
                top: f64::NEG_INFINITY,
            },
            |b, (x, y)| Bounds {
                left: b.left.min(*x),
                bottom: b.bottom.min(*y),
                right: b.right.max(*x),
                top: b.top.max(*y),
            },
        )
    }
}

/// Axis aligned extent in projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Bounds {
    /// Closed interval test on both axes.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.left <= x && x <= self.right && self.bottom <= y && y <= self.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const UTM: GeoTransform = GeoTransform::new(500_000.0, 10.0, 0.0, 4_200_000.0, 0.0, -10.0);

    #[test]
    fn index_floors_to_containing_pixel() {
        assert_eq!(UTM.index(500_000.0, 4_200_000.0), (0, 0));
        assert_eq!(UTM.index(500_015.0, 4_199_975.0), (2, 1));
        assert_eq!(UTM.index(499_999.0, 4_200_001.0), (-1, -1));
    }

    #[test]
    fn world_to_pixel_inverts_pixel_to_world() {
        let (x, y) = UTM.pixel_to_world(12.5, 40.25);
        let (col, row) = UTM.world_to_pixel(x, y);
        assert_relative_eq!(col, 12.5);
        assert_relative_eq!(row, 40.25);
    }

    #[test]
    fn window_transform_moves_origin() {
        let window = UTM.window_transform(100, 20);
        assert_eq!(window.c, 501_000.0);
        assert_eq!(window.f, 4_199_800.0);
        assert_eq!(window.a, 10.0);
        assert_eq!(window.e, -10.0);
    }

    #[test]
    fn bounds_of_bottom_up_grid() {
        let bottom_up = GeoTransform::new(0.0, 10.0, 0.0, 100.0, 0.0, 10.0);
        let bounds = bottom_up.bounds(4, 3);
        assert_eq!(
            bounds,
            Bounds {
                left: 0.0,
                bottom: 100.0,
                right: 40.0,
                top: 130.0
            }
        );
        assert!(bounds.contains(0.0, 130.0));
        assert!(bounds.contains(40.0, 100.0));
        assert!(!bounds.contains(40.1, 100.0));
    }

    #[test]
    fn degenerate_transform_is_invalid() {
        assert!(UTM.is_valid());
        assert!(!GeoTransform::new(0.0, 0.0, 0.0, 0.0, 0.0, -1.0).is_valid());
        assert!(!GeoTransform::new(f64::NAN, 1.0, 0.0, 0.0, 0.0, -1.0).is_valid());
    }
}
