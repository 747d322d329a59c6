use glam::{DMat4, DVec3, DVec4};

/// Perspective camera looking at the globe.
/// Clip space follows the OpenGL convention, so anything behind the eye lands at `ndc.z > 1`.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: DVec3,
    pub target: DVec3,
    pub up: DVec3,
    /// Vertical field of view in radians
    pub fov_y: f64,
    pub near: f64,
    pub far: f64,
}

/// Result of projecting a world position into pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
    /// Normalized device depth; `< 1` means in front of the camera
    pub depth: f64,
    pub visible: bool,
}

/// A half-line in world space used for picking.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Nearest non-negative distance along the ray to a sphere, if it hits.
    pub fn intersect_sphere(&self, center: DVec3, radius: f64) -> Option<f64> {
        let oc = self.origin - center;
        let b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t_near = -b - sqrt_disc;
        if t_near >= 0.0 {
            return Some(t_near);
        }
        // Origin inside the sphere
        let t_far = -b + sqrt_disc;
        (t_far >= 0.0).then_some(t_far)
    }
}

impl Camera {
    pub fn new(position: DVec3, target: DVec3) -> Self {
        Self {
            position,
            target,
            up: DVec3::Y,
            fov_y: 75f64.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Distance from the camera to the globe centre.
    pub fn distance_to_origin(&self) -> f64 {
        self.position.length()
    }

    pub fn view(&self) -> DMat4 {
        DMat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self, aspect: f64) -> DMat4 {
        DMat4::perspective_rh_gl(self.fov_y, aspect, self.near, self.far)
    }

    pub fn view_projection(&self, width: f64, height: f64) -> DMat4 {
        let aspect = if height > 0.0 { width / height } else { 1.0 };
        self.projection(aspect) * self.view()
    }

    /// Project a world position into normalized device coordinates.
    pub fn project_ndc(&self, world: DVec3, width: f64, height: f64) -> DVec3 {
        let clip = self.view_projection(width, height) * world.extend(1.0);
        if clip.w.abs() < f64::EPSILON {
            return DVec3::new(0.0, 0.0, f64::INFINITY);
        }
        clip.truncate() / clip.w
    }

    /// Project a world position to pixel coordinates (Y grows downward).
    pub fn to_screen(&self, world: DVec3, width: f64, height: f64) -> ScreenPoint {
        let ndc = self.project_ndc(world, width, height);
        let x = (ndc.x * 0.5 + 0.5) * width;
        let y = (-ndc.y * 0.5 + 0.5) * height;

        let visible = ndc.z < 1.0 && (0.0..=width).contains(&x) && (0.0..=height).contains(&y);

        ScreenPoint { x, y, depth: ndc.z, visible }
    }

    /// Inverse of [`Camera::to_screen`] given the depth it reported.
    pub fn unproject(&self, x: f64, y: f64, depth: f64, width: f64, height: f64) -> DVec3 {
        let ndc = DVec4::new(x / width * 2.0 - 1.0, -(y / height * 2.0 - 1.0), depth, 1.0);
        let world = self.view_projection(width, height).inverse() * ndc;
        world.truncate() / world.w
    }

    /// Dots per world unit at `depth` along the view direction.
    pub fn pixels_per_unit(&self, height: f64, depth: f64) -> f64 {
        (height / 2.0) / (self.fov_y / 2.0).tan() / depth.max(f64::EPSILON)
    }

    /// World-space pick ray through a pixel.
    pub fn screen_ray(&self, x: f64, y: f64, width: f64, height: f64) -> Ray {
        let near = self.unproject(x, y, -1.0, width, height);
        let far = self.unproject(x, y, 1.0, width, height);
        Ray::new(self.position, far - near)
    }
}

/// Whether a point just above the sphere surface is on the hemisphere facing the camera.
#[inline(always)]
pub fn is_facing_camera(point: DVec3, camera_position: DVec3) -> bool {
    point.dot(camera_position - point) > 0.0
}
