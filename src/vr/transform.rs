//! Conversion between the host's flat column-major matrices and the engine's
//! transform and projection types.

use serde::{Deserialize, Serialize};
use std::ops::Mul;

pub type Vector2 = [f32; 2];
pub type Vector3 = [f32; 3];

/// A flat 4x4 matrix as the host reports it: column-major, 16 floats.
pub type HostMatrix = [f32; 16];

/// Orthonormal basis plus origin. `basis[row][column]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub basis: [[f32; 3]; 3],
    pub origin: Vector3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        basis: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        origin: [0.0, 0.0, 0.0],
    };

    pub fn from_translation(origin: Vector3) -> Self {
        Self {
            origin,
            ..Self::IDENTITY
        }
    }

    /// Rotation of `radians` around the Y axis.
    pub fn from_rotation_y(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            basis: [[cos, 0.0, sin], [0.0, 1.0, 0.0], [-sin, 0.0, cos]],
            origin: [0.0; 3],
        }
    }

    pub fn with_origin(mut self, origin: Vector3) -> Self {
        self.origin = origin;
        self
    }

    pub fn scaled_origin(mut self, scale: f32) -> Self {
        for component in self.origin.iter_mut() {
            *component *= scale;
        }
        self
    }

    pub fn basis_xform(&self, vector: Vector3) -> Vector3 {
        let mut out = [0.0; 3];
        for (row, value) in out.iter_mut().enumerate() {
            *value = self.basis[row][0] * vector[0]
                + self.basis[row][1] * vector[1]
                + self.basis[row][2] * vector[2];
        }
        out
    }

    pub fn xform(&self, point: Vector3) -> Vector3 {
        let rotated = self.basis_xform(point);
        [
            rotated[0] + self.origin[0],
            rotated[1] + self.origin[1],
            rotated[2] + self.origin[2],
        ]
    }

    /// Encodes back into the host's column-major layout.
    pub fn to_host_matrix(&self) -> HostMatrix {
        let mut matrix = [0.0; 16];
        for column in 0..3 {
            for row in 0..3 {
                matrix[column * 4 + row] = self.basis[row][column];
            }
        }
        matrix[12] = self.origin[0];
        matrix[13] = self.origin[1];
        matrix[14] = self.origin[2];
        matrix[15] = 1.0;
        matrix
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        let mut basis = [[0.0; 3]; 3];
        for (row, out_row) in basis.iter_mut().enumerate() {
            for (column, value) in out_row.iter_mut().enumerate() {
                *value = (0..3)
                    .map(|k| self.basis[row][k] * rhs.basis[k][column])
                    .sum();
            }
        }
        Transform {
            basis,
            origin: self.xform(rhs.origin),
        }
    }
}

/// 4x4 projection stored as columns: `columns[column][row]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub columns: [[f32; 4]; 4],
}

impl Projection {
    pub const IDENTITY: Projection = Projection {
        columns: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };
}

impl Default for Projection {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Reads the 3x3 block and translation column out of a host matrix.
///
/// The basis is taken as-is. A matrix that is not orthonormal produces a
/// transform that is not orthonormal either.
pub fn matrix_to_transform(matrix: &HostMatrix) -> Transform {
    let mut transform = Transform::IDENTITY;
    for column in 0..3 {
        for row in 0..3 {
            transform.basis[row][column] = matrix[column * 4 + row];
        }
    }
    transform.origin = [matrix[12], matrix[13], matrix[14]];
    transform
}

/// Copies a host projection and rewrites its depth terms from the engine's
/// own clip planes, since the host's near/far need not match ours.
pub fn projection_from_host_matrix(matrix: &HostMatrix, z_near: f32, z_far: f32) -> Projection {
    let mut projection = Projection::IDENTITY;
    for (column, values) in projection.columns.iter_mut().enumerate() {
        values.copy_from_slice(&matrix[column * 4..column * 4 + 4]);
    }

    let depth = z_far - z_near;
    projection.columns[2][2] = -(z_far + z_near) / depth;
    projection.columns[3][2] = -(2.0 * z_far * z_near) / depth;
    projection
}
