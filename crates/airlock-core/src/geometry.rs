use serde::{Deserialize, Serialize};

/// A 3D point or vector in station space. Y is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    /// Flat distance on the floor plane, ignoring height.
    pub fn distance_xz(self, other: Vec3) -> f32 {
        distance_xz(self.x, self.z, other.x, other.z)
    }
}

/// Euclidean distance on the XZ plane.
pub fn distance_xz(ax: f32, az: f32, bx: f32, bz: f32) -> f32 {
    let dx = ax - bx;
    let dz = az - bz;
    (dx * dx + dz * dz).sqrt()
}

/// Unit forward vector on the floor plane for a yaw in radians.
/// Yaw 0 faces +Z; positive yaw turns toward +X.
pub fn forward_xz(yaw: f32) -> (f32, f32) {
    (yaw.sin(), yaw.cos())
}

/// Unit right vector on the floor plane for a yaw in radians.
pub fn right_xz(yaw: f32) -> (f32, f32) {
    (yaw.cos(), -yaw.sin())
}

/// Ray-circle intersection on the XZ plane. Returns the nearest `t >= 0`
/// along the ray, or 0 when the origin is already inside the circle.
pub fn ray_circle_xz(
    ox: f32,
    oz: f32,
    dx: f32,
    dz: f32,
    cx: f32,
    cz: f32,
    radius: f32,
) -> Option<f32> {
    let fx = ox - cx;
    let fz = oz - cz;
    let a = dx * dx + dz * dz;
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * (fx * dx + fz * dz);
    let c = fx * fx + fz * fz - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (t >= 0.0).then_some(t)
}

/// Wrap an angle into `[-PI, PI]`.
pub fn wrap_angle(a: f32) -> f32 {
    let two_pi = std::f32::consts::TAU;
    let mut a = a % two_pi;
    if a > std::f32::consts::PI {
        a -= two_pi;
    } else if a < -std::f32::consts::PI {
        a += two_pi;
    }
    a
}

/// Axis-aligned bounding box used for room membership tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inclusive containment test on all three axes.
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }
}
