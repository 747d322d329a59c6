use glam::DVec3;
use rayon::prelude::*;

use crate::braille::BrailleCanvas;
use crate::data::Coastlines;
use crate::geo::EARTH_RADIUS;
use crate::map::geometry::{draw_circle_outline, draw_disc, draw_line, draw_ring};
use crate::map::labels::{LabelEngine, LabelKind};
use crate::map::markers::{MarkerRegistry, MARKER_RADIUS};
use crate::map::projection::{is_facing_camera, Camera};

/// Fraction of background dots lit as stars.
const STAR_DENSITY: f64 = 0.004;

/// Spacing of the daylight stipple on the ocean, in dots.
const STIPPLE_STEP: usize = 4;

const FLASH_COLOR: (u8, u8, u8) = (255, 255, 255);

/// Everything the globe widget needs for one frame.
pub struct SceneView<'a> {
    pub camera: &'a Camera,
    pub coastlines: &'a Coastlines,
    pub markers: &'a MarkerRegistry,
    /// `None` when labels are toggled off
    pub labels: Option<&'a LabelEngine>,
    pub sun_direction: DVec3,
    pub selected: Option<usize>,
    /// Marker highlighted after a fly-to lands on it
    pub flash: Option<usize>,
    pub frame: u64,
}

/// Core disc in the marker colour, rings and halo in its emissive colour.
pub struct MarkerSprite {
    pub index: usize,
    pub color: (u8, u8, u8),
    pub glow_color: (u8, u8, u8),
    pub core: BrailleCanvas,
    pub glow: BrailleCanvas,
}

pub struct LabelSprite {
    pub col: u16,
    pub row: u16,
    pub text: String,
    pub kind: LabelKind,
}

/// Rendered layers, back to front.
pub struct GlobeFrame {
    pub stars: BrailleCanvas,
    pub limb: BrailleCanvas,
    pub day_fill: BrailleCanvas,
    pub night_land: BrailleCanvas,
    pub day_land: BrailleCanvas,
    pub markers: Vec<MarkerSprite>,
    pub labels: Vec<LabelSprite>,
}


/// Screen radius of the globe silhouette, in dots.
pub fn limb_radius(camera: &Camera, height: f64) -> Option<f64> {
    let d = camera.distance_to_origin();
    if d <= EARTH_RADIUS {
        return None;
    }
    let alpha = (EARTH_RADIUS / d).asin();
    Some(alpha.tan() / (camera.fov_y / 2.0).tan() * height / 2.0)
}

/// Deterministic [0, 1) noise per dot.
#[inline(always)]
fn noise(x: u64, y: u64, salt: u64) -> f64 {
    let mut z = x.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ y.wrapping_mul(0xc2b2_ae3d_27d4_eb4f) ^ salt;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}

/// Fixed starfield outside the globe disc. A few stars blink out every half second.
fn draw_stars(canvas: &mut BrailleCanvas, centre: (f64, f64), limb: f64, frame: u64) {
    let twinkle = frame / 30;
    for y in 0..canvas.pixel_height() {
        for x in 0..canvas.pixel_width() {
            if noise(x as u64, y as u64, 0) >= STAR_DENSITY {
                continue;
            }
            let (dx, dy) = (x as f64 - centre.0, y as f64 - centre.1);
            if dx * dx + dy * dy <= limb * limb {
                continue;
            }
            if noise(x as u64, y as u64, twinkle.wrapping_add(1)) < 0.15 {
                continue;
            }
            canvas.set_pixel(x, y);
        }
    }
}

/// Project every coastline point, in parallel. `None` marks points on the far hemisphere.
fn project_coastlines(
    coastlines: &Coastlines,
    camera: &Camera,
    sun: DVec3,
    width: f64,
    height: f64,
) -> Vec<Vec<Option<(i32, i32, bool)>>> {
    coastlines
        .lines
        .par_iter()
        .map(|line| {
            line.iter()
                .map(|&unit| {
                    let world = unit * EARTH_RADIUS;
                    if !is_facing_camera(world, camera.position) {
                        return None;
                    }
                    let p = camera.to_screen(world, width, height);
                    (p.depth < 1.0).then(|| (p.x.round() as i32, p.y.round() as i32, unit.dot(sun) > 0.0))
                })
                .collect()
        })
        .collect()
}

fn draw_coastlines(
    projected: &[Vec<Option<(i32, i32, bool)>>],
    day: &mut BrailleCanvas,
    night: &mut BrailleCanvas,
) {
    let (w, h) = (day.pixel_width() as i32, day.pixel_height() as i32);
    for line in projected {
        for pair in line.windows(2) {
            let (Some((x0, y0, lit)), Some((x1, y1, _))) = (pair[0], pair[1]) else {
                continue;
            };
            // Long jumps are wrap-arounds, not real segments
            if (x1 - x0).abs() + (y1 - y0).abs() > w {
                continue;
            }
            if x0.max(x1) < 0 || x0.min(x1) >= w || y0.max(y1) < 0 || y0.min(y1) >= h {
                continue;
            }
            let canvas = if lit { &mut *day } else { &mut *night };
            draw_line(canvas, x0, y0, x1, y1);
        }
    }
}

/// Sparse dots over the sunlit part of the disc.
fn draw_daylight(canvas: &mut BrailleCanvas, camera: &Camera, sun: DVec3) {
    let (w, h) = (canvas.pixel_width(), canvas.pixel_height());
    let sun = sun.normalize_or_zero();
    for y in (0..h).step_by(STIPPLE_STEP) {
        let offset = (y / STIPPLE_STEP % 2) * STIPPLE_STEP / 2;
        for x in (offset..w).step_by(STIPPLE_STEP) {
            let ray = camera.screen_ray(x as f64, y as f64, w as f64, h as f64);
            if let Some(t) = ray.intersect_sphere(DVec3::ZERO, EARTH_RADIUS) {
                let normal = (ray.origin + ray.direction * t) / EARTH_RADIUS;
                if normal.dot(sun) > 0.0 {
                    canvas.set_pixel(x, y);
                }
            }
        }
    }
}

fn marker_sprites(view: &SceneView, cols: u16, rows: u16) -> Vec<MarkerSprite> {
    let camera = view.camera;
    let (w, h) = (cols as f64 * 2.0, rows as f64 * 4.0);

    view.markers
        .markers()
        .iter()
        .enumerate()
        .filter(|(_, m)| m.visible && is_facing_camera(m.world_position(), camera.position))
        .filter_map(|(index, m)| {
            let p = camera.to_screen(m.world_position(), w, h);
            if !p.visible {
                return None;
            }
            let ppu = camera.pixels_per_unit(h, camera.position.distance(m.world_position()));
            let (cx, cy) = (p.x.round() as i32, p.y.round() as i32);
            let pulse = &m.pulse;

            let mut core_canvas = BrailleCanvas::new(cols as usize, rows as usize);
            let mut glow = BrailleCanvas::new(cols as usize, rows as usize);
            let core = (MARKER_RADIUS * pulse.core_scale * ppu).max(1.0);
            draw_disc(&mut core_canvas, cx, cy, core.round() as i32);

            let ring = 2.0 * MARKER_RADIUS * pulse.ring_scale * ppu;
            if pulse.ring_opacity > 0.6 || view.selected == Some(index) {
                draw_circle_outline(&mut glow, p.x, p.y, ring.max(core + 2.0));
            }
            let halo = 3.0 * MARKER_RADIUS * pulse.halo_scale * ppu;
            if pulse.halo_opacity > 0.3 {
                draw_circle_outline(&mut glow, p.x, p.y, halo.max(core + 4.0));
            }
            if view.selected == Some(index) {
                let r = ring.max(core + 2.0) + 2.0;
                draw_ring(&mut core_canvas, cx, cy, r, r + 1.0);
            }
            let flashing = view.flash == Some(index);
            if flashing {
                let r = halo.max(core + 4.0) + 2.0;
                draw_ring(&mut core_canvas, cx, cy, r, r + 1.0);
            }

            Some(MarkerSprite {
                index,
                color: if flashing { FLASH_COLOR } else { m.handles.color },
                glow_color: m.handles.emissive,
                core: core_canvas,
                glow,
            })
        })
        .collect()
}

fn label_sprites(engine: &LabelEngine, cols: u16, rows: u16) -> Vec<LabelSprite> {
    engine
        .visible_labels()
        .filter_map(|label| {
            let (x, y) = label.screen_position?;
            let row = (y / 4.0) as u16;
            let centre = (x / 2.0) as u16;
            if row >= rows || centre >= cols {
                return None;
            }
            let half = (label.text.chars().count() / 2) as u16;
            Some(LabelSprite {
                col: centre.saturating_sub(half),
                row,
                text: label.text.clone(),
                kind: label.kind,
            })
        })
        .collect()
}

/// Draw the globe into Braille layers for a `cols x rows` cell area.
pub fn render_globe(view: &SceneView, cols: u16, rows: u16) -> GlobeFrame {
    let (c, r) = (cols as usize, rows as usize);
    let (w, h) = (c as f64 * 2.0, r as f64 * 4.0);
    let camera = view.camera;

    let mut frame = GlobeFrame {
        stars: BrailleCanvas::new(c, r),
        limb: BrailleCanvas::new(c, r),
        day_fill: BrailleCanvas::new(c, r),
        night_land: BrailleCanvas::new(c, r),
        day_land: BrailleCanvas::new(c, r),
        markers: Vec::new(),
        labels: Vec::new(),
    };
    if c == 0 || r == 0 {
        return frame;
    }

    let centre = (w / 2.0, h / 2.0);
    let limb = limb_radius(camera, h).unwrap_or(0.0);
    draw_stars(&mut frame.stars, centre, limb, view.frame);
    if limb > 0.0 {
        draw_circle_outline(&mut frame.limb, centre.0, centre.1, limb);
    }
    draw_daylight(&mut frame.day_fill, camera, view.sun_direction);

    let projected = project_coastlines(view.coastlines, camera, view.sun_direction, w, h);
    draw_coastlines(&projected, &mut frame.day_land, &mut frame.night_land);

    frame.markers = marker_sprites(view, cols, rows);
    if let Some(engine) = view.labels {
        frame.labels = label_sprites(engine, cols, rows);
    }
    frame
}
