//! Conversion of HOOMD triclinic boxes into unit cell lengths and angles.

/// A triclinic box as HOOMD stores it: three edge lengths and three dimensionless tilt factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriclinicBox {
    /// `[Lx, Ly, Lz]`
    pub lengths: [f32; 3],
    /// `[xy, xz, yz]`
    pub tilt: [f32; 3],
}

impl Default for TriclinicBox {
    /// The unit cube, which is the HOOMD default box.
    fn default() -> Self {
        Self::from_raw([1.0, 1.0, 1.0, 0.0, 0.0, 0.0])
    }
}

impl TriclinicBox {
    /// Split a raw `[Lx, Ly, Lz, xy, xz, yz]` box descriptor.
    pub const fn from_raw(raw: [f32; 6]) -> Self {
        Self {
            lengths: [raw[0], raw[1], raw[2]],
            tilt: [raw[3], raw[4], raw[5]],
        }
    }

    pub const fn to_raw(&self) -> [f32; 6] {
        let [lx, ly, lz] = self.lengths;
        let [xy, xz, yz] = self.tilt;
        [lx, ly, lz, xy, xz, yz]
    }

    /// Returns the unit cell angles `[alpha, beta, gamma]` in degrees.
    ///
    /// `alpha` is the angle between the second and third box vectors, `beta` between the first
    /// and third, and `gamma` between the first and second.
    ///
    /// Returns [`None`] if any of the tilt factors is not finite.
    pub fn angles(&self) -> Option<[f32; 3]> {
        if !self.tilt.iter().all(|t| t.is_finite()) {
            return None;
        }
        let [xy, xz, yz] = self.tilt.map(f64::from);

        let norm2 = (1.0 + xy * xy).sqrt();
        let norm3 = (1.0 + xz * xz + yz * yz).sqrt();

        let cos_gamma = xy / norm2;
        let cos_beta = xz / norm3;
        let cos_alpha = (xy * xz + yz) / (norm2 * norm3);

        Some([cos_alpha, cos_beta, cos_gamma].map(|c| acos_degrees(c) as f32))
    }

    /// Returns the packed `[Lx, Ly, Lz, alpha, beta, gamma]` unit cell dimensions.
    pub fn dimensions(&self) -> Option<[f32; 6]> {
        let [lx, ly, lz] = self.lengths;
        let [alpha, beta, gamma] = self.angles()?;
        Some([lx, ly, lz, alpha, beta, gamma])
    }
}

/// The cosines are algebraically bounded by one, but rounding can push them slightly over.
fn acos_degrees(cos: f64) -> f64 {
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}
