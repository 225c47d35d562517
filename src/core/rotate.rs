//! Geotransform rotation

use crate::types::GeoTransform;
use std::f64::consts::PI;

fn radians(degrees: f64) -> f64 {
    (degrees * PI) / 180.0
}

impl GeoTransform {
    /// Rotate the transform about its origin by `degrees`
    ///
    /// The terms are updated one after another: the x shear is derived from the
    /// already-scaled pixel width and the pixel height from the already-updated
    /// y shear. This is not a simultaneous matrix rotation; see [`GeoTransform::rotated_affine`].
    pub fn rotated(&self, degrees: f64) -> GeoTransform {
        let theta = radians(degrees);
        let (sin, cos) = (theta.sin(), theta.cos());

        let mut gt = *self;
        gt.pixel_width *= cos;
        gt.rotation_x = -gt.pixel_width * sin;
        gt.rotation_y *= sin;
        gt.pixel_height = gt.rotation_y * cos;
        gt
    }

    /// Rotate the linear part of the transform about its origin by `degrees`,
    /// every term computed from the original values
    pub fn rotated_affine(&self, degrees: f64) -> GeoTransform {
        let theta = radians(degrees);
        let (sin, cos) = (theta.sin(), theta.cos());

        GeoTransform {
            top_left_x: self.top_left_x,
            pixel_width: self.pixel_width * cos - self.rotation_y * sin,
            rotation_x: self.rotation_x * cos - self.pixel_height * sin,
            top_left_y: self.top_left_y,
            rotation_y: self.pixel_width * sin + self.rotation_y * cos,
            pixel_height: self.rotation_x * sin + self.pixel_height * cos,
        }
    }
}

/// Rotate a GDAL-ordered geotransform array, see [`GeoTransform::rotated`]
pub fn transform_with_rotation(geo_transform: [f64; 6], degrees: f64) -> [f64; 6] {
    GeoTransform::from_array(geo_transform).rotated(degrees).to_array()
}
