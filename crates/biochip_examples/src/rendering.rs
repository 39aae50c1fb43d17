use std::path::Path;

use anyhow::Context;
use biochip::prelude::{Animation, CellView, DeviceSnapshot, Direction, DropletSize, Tint, Zone, ZoneLayout};
use image::{Rgb, RgbImage};
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Colors and sizes used to draw a [`DeviceSnapshot`].
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub cell_size: u32,
    pub background: [u8; 3],
    pub reserved: [u8; 3],
    pub droplet: [u8; 3],
    pub processing: [u8; 3],
    pub zones: ZoneLayout,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cell_size: 24,
            background: [18, 18, 22],
            reserved: [200, 170, 60],
            droplet: [80, 160, 235],
            processing: [235, 120, 60],
            zones: ZoneLayout::default(),
        }
    }
}

impl RenderConfig {
    pub fn new(zones: ZoneLayout) -> Self {
        Self {
            zones,
            ..Self::default()
        }
    }

    pub fn with_cell_size(mut self, cell_size: u32) -> Self {
        self.cell_size = cell_size.max(4);
        self
    }

    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = rgb;
        self
    }

    fn zone_of(&self, col: usize) -> Zone {
        Zone::ALL
            .into_iter()
            .rev()
            .find(|zone| col >= self.zones.column(*zone))
            .unwrap_or(Zone::Staging)
    }

    fn pad_color(&self, col: usize) -> [u8; 3] {
        match self.zone_of(col) {
            Zone::Staging => [52, 56, 64],
            Zone::Mixing => [44, 60, 52],
            Zone::Warm => [66, 56, 42],
            Zone::Hot => [74, 42, 42],
        }
    }
}

/// Draws every pad of `snapshot`: zone-colored pads, reserved outlines and droplets sized and
/// shifted by their animation tag.
pub fn render_snapshot(snapshot: &DeviceSnapshot, config: &RenderConfig) -> RgbImage {
    let size = config.cell_size;
    let width = (snapshot.cols as u32).max(1) * size;
    let height = (snapshot.rows as u32).max(1) * size;
    let mut img = RgbImage::from_pixel(width, height, Rgb(config.background));

    let droplet = match snapshot.tint {
        Tint::Normal => config.droplet,
        Tint::Processing => config.processing,
    };

    for cell in &snapshot.cells {
        let x0 = cell.col as u32 * size;
        let y0 = cell.row as u32 * size;
        fill_rect(&mut img, x0 + 1, y0 + 1, size - 2, size - 2, config.pad_color(cell.col));
        if cell.reserved {
            outline_rect(&mut img, x0 + 1, y0 + 1, size - 2, config.reserved);
        }
        if cell.occupant.is_some() {
            draw_droplet(&mut img, cell, size, droplet);
        }
    }
    img
}

/// Renders `snapshot` and writes it as a PNG file.
pub fn render_snapshot_to_png(
    snapshot: &DeviceSnapshot,
    config: &RenderConfig,
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    render_snapshot(snapshot, config)
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Wrote {}.", path.display());
    Ok(())
}

fn draw_droplet(img: &mut RgbImage, cell: &CellView, size: u32, color: [u8; 3]) {
    let full = size as f32 * 0.4;
    let shift = size as f32 * 0.2;
    let (radius, offset) = match cell.animation {
        Animation::Idle => (full, None),
        Animation::Size(DropletSize::Half) => (full * 0.5, None),
        Animation::Size(DropletSize::Quarter) => (full * 0.25, None),
        Animation::Pull(direction) => (full, Some((direction, shift))),
        Animation::Split(direction) => (full * 0.8, Some((direction, shift * 2.0))),
        Animation::Arrive(direction) => (full, Some((direction.opposite(), shift))),
    };

    let mut cx = cell.col as f32 * size as f32 + size as f32 / 2.0;
    let mut cy = cell.row as f32 * size as f32 + size as f32 / 2.0;
    if let Some((direction, by)) = offset {
        match direction {
            Direction::Left => cx -= by,
            Direction::Right => cx += by,
            Direction::Up => cy -= by,
            Direction::Down => cy += by,
        }
    }
    fill_circle(img, cx, cy, radius, color);
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
    for py in y..(y + h).min(img.height()) {
        for px in x..(x + w).min(img.width()) {
            img.put_pixel(px, py, Rgb(color));
        }
    }
}

fn outline_rect(img: &mut RgbImage, x: u32, y: u32, side: u32, color: [u8; 3]) {
    let last = side.saturating_sub(1);
    for i in 0..side {
        for (px, py) in [(x + i, y), (x + i, y + last), (x, y + i), (x + last, y + i)] {
            if px < img.width() && py < img.height() {
                img.put_pixel(px, py, Rgb(color));
            }
        }
    }
}

fn fill_circle(img: &mut RgbImage, cx: f32, cy: f32, radius: f32, color: [u8; 3]) {
    let r2 = radius * radius;
    let x_min = (cx - radius).floor().max(0.0) as u32;
    let y_min = (cy - radius).floor().max(0.0) as u32;
    let x_max = ((cx + radius).ceil() as u32).min(img.width());
    let y_max = ((cy + radius).ceil() as u32).min(img.height());
    for py in y_min..y_max {
        for px in x_min..x_max {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(px, py, Rgb(color));
            }
        }
    }
}
