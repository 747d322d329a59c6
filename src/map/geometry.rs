use crate::braille::BrailleCanvas;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Filled disc (marker core).
pub fn draw_disc(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

/// Annulus between `inner` and `outer` radii (marker glow ring).
pub fn draw_ring(canvas: &mut BrailleCanvas, cx: i32, cy: i32, inner: f64, outer: f64) {
    let reach = outer.ceil() as i32;
    let (inner2, outer2) = (inner * inner, outer * outer);
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let d2 = (dx * dx + dy * dy) as f64;
            if d2 >= inner2 && d2 <= outer2 {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

/// Sparse dotted outline of a circle, used for the globe limb.
pub fn draw_circle_outline(canvas: &mut BrailleCanvas, cx: f64, cy: f64, radius: f64) {
    let steps = ((radius * std::f64::consts::TAU) as usize).clamp(16, 4096);
    for i in 0..steps {
        let a = i as f64 / steps as f64 * std::f64::consts::TAU;
        let (s, c) = a.sin_cos();
        canvas.set_pixel_signed((cx + c * radius).round() as i32, (cy + s * radius).round() as i32);
    }
}
