use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::info;
use palette::Srgb;
use plotters::prelude::*;

use crate::color::ColorMap;
use crate::error::EmbeddingError;

/// Size and text of the scatter plot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub point_radius: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        PlotStyle {
            width: 1000,
            height: 800,
            title: "t-SNE Visualization of Preprocessed Spectra".to_string(),
            x_label: "t-SNE Component 1".to_string(),
            y_label: "t-SNE Component 2".to_string(),
            point_radius: 4,
        }
    }
}

fn to_rgb(c: Srgb<u8>) -> RGBColor {
    RGBColor(c.red, c.green, c.blue)
}

/// Padded `[min, max]` of one coordinate; never empty.
fn axis_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-6);
    (lo - pad, hi + pad)
}

/// Render a species-coloured scatter of `points` to a PNG at `path`.
///
/// `labels[i]` is the species of `points[i]`. The legend lists every species
/// of `colors` in its order, including species with no points. Parent
/// directories are created.
pub fn render_scatter(
    path: &Path,
    points: &[[f64; 2]],
    labels: &[String],
    colors: &ColorMap,
    style: &PlotStyle,
) -> Result<()> {
    if points.len() != labels.len() {
        return Err(EmbeddingError::LabelMismatch(labels.len(), points.len()).into());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }

    let (w, h) = (style.width, style.height);
    let mut buffer = vec![0u8; w as usize * h as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (w, h)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("filling plot background: {e}"))?;

        let x_range = axis_range(points.iter().map(|p| p[0]));
        let y_range = axis_range(points.iter().map(|p| p[1]));
        let mut chart = ChartBuilder::on(&root)
            .caption(&style.title, ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
            .map_err(|e| anyhow!("building chart: {e}"))?;

        chart
            .configure_mesh()
            .x_desc(style.x_label.as_str())
            .y_desc(style.y_label.as_str())
            .draw()
            .map_err(|e| anyhow!("drawing axes: {e}"))?;

        let radius = style.point_radius;
        for (label, color) in colors.legend_entries() {
            let color = to_rgb(*color);
            let series = points
                .iter()
                .zip(labels)
                .filter(|(_, l)| *l == label)
                .map(move |(p, _)| Circle::new((p[0], p[1]), radius, color.mix(0.7).filled()));
            chart
                .draw_series(series)
                .map_err(|e| anyhow!("drawing {label}: {e}"))?
                .label(label.as_str())
                .legend(move |(x, y)| Circle::new((x + 10, y), radius, color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| anyhow!("drawing legend: {e}"))?;

        root.present().map_err(|e| anyhow!("finishing plot: {e}"))?;
    }

    let image = image::RgbImage::from_raw(w, h, buffer)
        .context("plot buffer does not match the image size")?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing plot {}", path.display()))?;
    info!("plot written to {}", path.display());
    Ok(())
}
