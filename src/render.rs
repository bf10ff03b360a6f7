use crate::config::RenderConfig;
use crate::ir::VertexKind;
use crate::layout::{Drawing, GridPoint};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

/// Maps grid coordinates to SVG user space; grid y points up, SVG y down.
struct Viewport {
    scale: f32,
    margin: f32,
    height: i64,
}

impl Viewport {
    fn x(&self, point: GridPoint) -> f32 {
        self.margin + point.x as f32 * self.scale
    }

    fn y(&self, point: GridPoint) -> f32 {
        self.margin + (self.height - point.y) as f32 * self.scale
    }
}

pub fn render_svg(drawing: &Drawing, theme: &Theme, config: &RenderConfig) -> String {
    let view = Viewport {
        scale: config.scale,
        margin: config.margin,
        height: drawing.height,
    };
    let width = 2.0 * config.margin + drawing.width as f32 * config.scale;
    let height = 2.0 * config.margin + drawing.height as f32 * config.scale;
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    for route in &drawing.edges {
        let d = points_to_path(&view, &route.points);
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-linejoin=\"round\"><title>{} -- {}</title></path>",
            d,
            theme.edge_color,
            theme.edge_width,
            escape_xml(&route.from),
            escape_xml(&route.to)
        ));
    }

    if config.show_bends {
        for point in drawing.points.values() {
            if point.kind == VertexKind::Bend {
                svg.push_str(&format!(
                    "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\"/>",
                    view.x(point.position),
                    view.y(point.position),
                    config.vertex_radius / 2.0,
                    theme.dummy_fill
                ));
            }
        }
    }

    for (id, placement) in &drawing.vertices {
        let r = config.vertex_radius;
        if placement.min == placement.max {
            svg.push_str(&format!(
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{r:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
                view.x(placement.position),
                view.y(placement.position),
                theme.vertex_fill,
                theme.vertex_stroke
            ));
        } else {
            // Expanded vertex: a box around its whole chain.
            let left = view.x(placement.min) - r;
            let top = view.y(placement.max) - r;
            let box_w = view.x(placement.max) - view.x(placement.min) + 2.0 * r;
            let box_h = view.y(placement.min) - view.y(placement.max) + 2.0 * r;
            svg.push_str(&format!(
                "<rect x=\"{left:.2}\" y=\"{top:.2}\" width=\"{box_w:.2}\" height=\"{box_h:.2}\" rx=\"{r:.2}\" ry=\"{r:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
                theme.vertex_fill,
                theme.vertex_stroke
            ));
        }
        if config.show_labels {
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                view.x(placement.max) + r + 2.0,
                view.y(placement.max) - r - 2.0,
                escape_xml(&theme.font_family),
                theme.font_size,
                theme.text_color,
                escape_xml(id)
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

fn points_to_path(view: &Viewport, points: &[GridPoint]) -> String {
    let mut d = String::new();
    for (idx, point) in points.iter().enumerate() {
        let cmd = if idx == 0 { "M" } else { " L" };
        d.push_str(&format!("{cmd} {:.2} {:.2}", view.x(*point), view.y(*point)));
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "Inter".to_string());
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _theme: &Theme) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
