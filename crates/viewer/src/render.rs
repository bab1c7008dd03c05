use std::fmt::{self, Write as _};
use std::fs;
use std::io;
use std::path::Path;

use graphview::{NodeKind, NodeRecord, RenderAdapter, RenderFrame, SignalQuality, TrafficLevel};
use tracing::info;

/// Logs a one-line summary every `every` frames.
pub struct LogAdapter {
    every: u64,
    frames: u64,
}

impl LogAdapter {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frames: 0,
        }
    }
}

impl RenderAdapter for LogAdapter {
    fn present(&mut self, frame: &RenderFrame) {
        self.frames += 1;
        if self.frames % self.every != 0 {
            return;
        }
        let aps = frame
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::AccessPoint)
            .count();
        info!(
            frame = self.frames,
            aps,
            clients = frame.nodes.len() - aps,
            links = frame.links.len(),
            pinned = frame.nodes.iter().filter(|n| n.pinned).count(),
            alerting = frame.nodes.iter().filter(|n| n.alert_active).count(),
            busy = frame
                .nodes
                .iter()
                .filter(|n| n.traffic_level == Some(TrafficLevel::High))
                .count(),
            alpha = frame.alpha,
            "frame"
        );
    }
}

/// Keeps the latest frame and renders it as an SVG document on demand.
#[derive(Default)]
pub struct SvgAdapter {
    latest: Option<RenderFrame>,
}

impl RenderAdapter for SvgAdapter {
    fn present(&mut self, frame: &RenderFrame) {
        self.latest = Some(frame.clone());
    }
}

impl SvgAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self) -> Option<String> {
        self.latest.as_ref().and_then(|frame| render_svg(frame).ok())
    }

    /// Write the latest frame to `path`. Returns false if no frame was presented.
    pub fn write_to(&self, path: &Path) -> io::Result<bool> {
        let Some(frame) = &self.latest else {
            return Ok(false);
        };
        let svg = render_svg(frame).map_err(io::Error::other)?;
        fs::write(path, svg)?;
        Ok(true)
    }
}

fn color(key: SignalQuality) -> &'static str {
    match key {
        SignalQuality::Excellent => "#00ff88",
        SignalQuality::Good => "#00cc66",
        SignalQuality::Fair => "#ffaa00",
        SignalQuality::Weak => "#ff4444",
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_svg(frame: &RenderFrame) -> Result<String, fmt::Error> {
    let canvas = &frame.canvas;
    let center = canvas.center();
    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">"#,
        w = canvas.width,
        h = canvas.height
    )?;
    writeln!(svg, r##"<rect width="100%" height="100%" fill="#0b0f14"/>"##)?;

    for band in 0..canvas.band_fractions.len() {
        writeln!(
            svg,
            r##"<circle class="band" cx="{:.1}" cy="{:.1}" r="{:.1}" fill="none" stroke="#ffeb3b" stroke-opacity="0.3" stroke-dasharray="4 4"/>"##,
            center.x,
            center.y,
            canvas.band_radius(band)
        )?;
    }

    for link in &frame.links {
        writeln!(
            svg,
            r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#ffeb3b" stroke-opacity="0.5" stroke-width="1"/>"##,
            link.x1, link.y1, link.x2, link.y2
        )?;
    }

    for node in &frame.nodes {
        write_node(&mut svg, node)?;
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

fn write_node(svg: &mut String, node: &NodeRecord) -> fmt::Result {
    let outline = if node.alert_active {
        r##" stroke="#ff0000" stroke-width="3""##
    } else {
        r##" stroke="#ffd740" stroke-width="1""##
    };
    write!(
        svg,
        r#"<circle class="node" data-id="{}" cx="{:.1}" cy="{:.1}" r="{}" fill="{}"{}"#,
        escape(&node.id),
        node.x,
        node.y,
        node.radius,
        color(node.color_key),
        outline
    )?;
    if let Some(level) = node.traffic_level {
        write!(svg, r#" data-traffic="{}""#, level.as_str())?;
    }
    writeln!(svg, "/>")?;
    if node.pinned {
        writeln!(
            svg,
            r##"<circle class="pin" cx="{:.1}" cy="{:.1}" r="3" fill="#ffffff"/>"##,
            node.x, node.y
        )?;
    }
    writeln!(
        svg,
        r##"<text x="{:.1}" y="{:.1}" font-family="monospace" font-size="10" fill="#ffeb3b" text-anchor="middle">{}</text>"##,
        node.x,
        node.y + node.radius + 12.0,
        escape(&node.label)
    )
}
