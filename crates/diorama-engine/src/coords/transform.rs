use glam::{EulerRot, Mat4, Quat, Vec3};

/// Local transform of a backend node: scale, then rotate, then translate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    /// Rotation given as XYZ Euler angles in radians.
    pub fn from_euler_xyz(translation: Vec3, euler: Vec3, scale: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z),
            scale,
        }
    }

    /// A transform at `eye` whose -Z axis points at `target`.
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let forward = target - eye;
        if forward.length_squared() < f32::EPSILON {
            return Self::from_translation(eye);
        }
        let up = if forward.normalize().abs().dot(Vec3::Y) > 0.999 { Vec3::Z } else { Vec3::Y };
        let view = Mat4::look_at_rh(eye, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        Self { translation: eye, rotation, scale: Vec3::ONE }
    }

    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// XYZ Euler angles in radians.
    pub fn euler_xyz(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euler_round_trip() {
        let t = Transform::from_euler_xyz(Vec3::ZERO, Vec3::new(0.1, 0.2, 0.3), Vec3::ONE);
        assert!(t.euler_xyz().abs_diff_eq(Vec3::new(0.1, 0.2, 0.3), 1e-5));
    }

    #[test]
    fn looking_at_faces_target() {
        let t = Transform::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        let forward = t.rotation * Vec3::NEG_Z;
        assert!(forward.abs_diff_eq(Vec3::NEG_Z, 1e-5));
    }

    #[test]
    fn matrix_round_trip() {
        let t = Transform::from_euler_xyz(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 1.0, 0.0), Vec3::splat(2.0));
        let back = Transform::from_matrix(t.matrix());
        assert!(back.translation.abs_diff_eq(t.translation, 1e-5));
        assert!(back.scale.abs_diff_eq(t.scale, 1e-5));
    }
}
