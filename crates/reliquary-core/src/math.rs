//! Plain spatial value types and their wire encodings.

use crate::cursor::{ByteCursor, CursorError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn write_to(&self, cur: &mut ByteCursor) {
        cur.write_f64(self.x);
        cur.write_f64(self.y);
        cur.write_f64(self.z);
    }

    pub fn read_from(cur: &mut ByteCursor) -> Result<Self, CursorError> {
        Ok(Self::new(cur.read_f64()?, cur.read_f64()?, cur.read_f64()?))
    }
}

/// Euler rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotator {
    pub const fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn write_to(&self, cur: &mut ByteCursor) {
        cur.write_f64(self.pitch);
        cur.write_f64(self.yaw);
        cur.write_f64(self.roll);
    }

    pub fn read_from(cur: &mut ByteCursor) -> Result<Self, CursorError> {
        Ok(Self::new(cur.read_f64()?, cur.read_f64()?, cur.read_f64()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn write_to(&self, cur: &mut ByteCursor) {
        cur.write_f64(self.x);
        cur.write_f64(self.y);
        cur.write_f64(self.z);
        cur.write_f64(self.w);
    }

    pub fn read_from(cur: &mut ByteCursor) -> Result<Self, CursorError> {
        Ok(Self::new(
            cur.read_f64()?,
            cur.read_f64()?,
            cur.read_f64()?,
            cur.read_f64()?,
        ))
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Origin, no rotation, unit scale. Where freshly spawned entities start.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn write_to(&self, cur: &mut ByteCursor) {
        self.translation.write_to(cur);
        self.rotation.write_to(cur);
        self.scale.write_to(cur);
    }

    pub fn read_from(cur: &mut ByteCursor) -> Result<Self, CursorError> {
        Ok(Self {
            translation: Vec3::read_from(cur)?,
            rotation: Quat::read_from(cur)?,
            scale: Vec3::read_from(cur)?,
        })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
