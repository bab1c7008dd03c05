//! KDL configuration file for the viewer.
//!
//! ```kdl
//! stream {
//!     host "10.0.0.2"
//!     port 8000
//! }
//! canvas {
//!     width 1600
//!     height 900
//!     bands 0.15 0.25 0.35
//! }
//! pinning {
//!     policy "auto-release"
//!     release-after-ms 2000
//!     pin "AA:BB:CC:DD:EE:FF" x=300 y=200
//! }
//! render {
//!     fps 30
//!     svg-out "radar.svg"
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use graphview::{PinPolicy, SceneConfig};
use kdl::{KdlDocument, KdlNode, KdlValue};
use stream_client::StreamConfig;
use swanradar_layout::LayoutError;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid KDL document")]
    Parse(#[from] kdl::KdlError),
    #[error("{section}.{key}: expected {expected}")]
    WrongType {
        section: String,
        key: String,
        expected: &'static str,
    },
    #[error("{section}.{key}: {message}")]
    Invalid {
        section: String,
        key: String,
        message: String,
    },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// A node the user wants pinned as soon as it shows up.
#[derive(Debug, Clone, PartialEq)]
pub struct PinRequest {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub fps: u32,
    /// Stop after this many frames.
    pub frames: Option<u64>,
    pub svg_out: Option<PathBuf>,
    /// Log a frame summary every this many frames.
    pub log_every: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            frames: None,
            svg_out: None,
            log_every: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub stream: StreamConfig,
    pub scene: SceneConfig,
    pub pins: Vec<PinRequest>,
    pub render: RenderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            stream: StreamConfig::default(),
            scene: SceneConfig::default(),
            pins: Vec::new(),
            render: RenderConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse a config document on top of the defaults. Unknown sections and
    /// keys are skipped with a warning.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let doc = KdlDocument::parse(content)?;
        let mut config = AppConfig::default();
        for section in doc.nodes() {
            let name = section.name().value();
            let keys = section.children().map(|d| d.nodes()).unwrap_or(&[]);
            match name {
                "stream" => config.parse_stream(keys)?,
                "canvas" => config.parse_canvas(keys)?,
                "layout" => config.parse_layout(keys)?,
                "pinning" => config.parse_pinning(keys)?,
                "alerts" => config.parse_alerts(keys)?,
                "render" => config.parse_render(keys)?,
                other => warn!(section = other, "ignoring unknown config section"),
            }
        }
        config.scene.canvas.validate()?;
        config.scene.forces.validate()?;
        config.scene.placement.validate()?;
        Ok(config)
    }

    fn parse_stream(&mut self, keys: &[KdlNode]) -> Result<(), ConfigError> {
        const S: &str = "stream";
        for node in keys {
            match key(node) {
                "host" => self.host = string(S, node)?,
                "port" => {
                    self.port = u16::try_from(unsigned(S, node)?)
                        .map_err(|_| invalid(S, node, "port out of range"))?
                }
                "path" => self.stream.path = string(S, node)?,
                "close-retry-ms" => self.stream.close_retry = millis(S, node)?,
                "error-retry-ms" => self.stream.error_retry = millis(S, node)?,
                "connect-timeout-ms" => self.stream.connect_timeout = millis(S, node)?,
                "event-buffer" => self.stream.event_buffer = unsigned(S, node)? as usize,
                _ => unknown(S, node),
            }
        }
        Ok(())
    }

    fn parse_canvas(&mut self, keys: &[KdlNode]) -> Result<(), ConfigError> {
        const S: &str = "canvas";
        let canvas = &mut self.scene.canvas;
        for node in keys {
            match key(node) {
                "width" => canvas.width = float(S, node)?,
                "height" => canvas.height = float(S, node)?,
                "bands" => {
                    let bands: Vec<f64> = args(node)
                        .map(|v| as_f64(v).ok_or_else(|| wrong_type(S, node, "numbers")))
                        .collect::<Result<_, _>>()?;
                    canvas.band_fractions = bands
                        .try_into()
                        .map_err(|_| invalid(S, node, "expected three band fractions"))?;
                }
                _ => unknown(S, node),
            }
        }
        Ok(())
    }

    fn parse_layout(&mut self, keys: &[KdlNode]) -> Result<(), ConfigError> {
        const S: &str = "layout";
        let forces = &mut self.scene.forces;
        let placement = &mut self.scene.placement;
        for node in keys {
            let target = match key(node) {
                "ap-charge" => &mut forces.hub.charge,
                "client-charge" => &mut forces.leaf.charge,
                "ap-collide-radius" => &mut forces.hub.collide_radius,
                "client-collide-radius" => &mut forces.leaf.collide_radius,
                "ap-radial-strength" => &mut forces.hub.radial_strength,
                "client-radial-strength" => &mut forces.leaf.radial_strength,
                "charge-distance-max" => &mut forces.charge_distance_max,
                "ap-client-distance" => &mut forces.hub_leaf_distance,
                "link-distance" => &mut forces.link_distance,
                "link-strength" => &mut forces.link_strength,
                "center-strength" => &mut forces.center_strength,
                "collide-strength" => &mut forces.collide_strength,
                "alpha-min" => &mut forces.alpha_min,
                "alpha-decay" => &mut forces.alpha_decay,
                "velocity-decay" => &mut forces.velocity_decay,
                "reheat-alpha" => &mut forces.reheat_alpha,
                "max-step" => &mut forces.max_step,
                "client-distance-min" => &mut placement.client_distance_min,
                "client-distance-max" => &mut placement.client_distance_max,
                "angle-jitter" => &mut placement.angle_jitter,
                _ => {
                    unknown(S, node);
                    continue;
                }
            };
            *target = float(S, node)?;
        }
        Ok(())
    }

    fn parse_pinning(&mut self, keys: &[KdlNode]) -> Result<(), ConfigError> {
        const S: &str = "pinning";
        let mut auto_release = matches!(self.scene.pin_policy, PinPolicy::AutoRelease { .. });
        let mut after = match self.scene.pin_policy {
            PinPolicy::AutoRelease { after } => after,
            PinPolicy::UntilUnpinned => Duration::from_secs(2),
        };
        for node in keys {
            match key(node) {
                "policy" => {
                    auto_release = match string(S, node)?.as_str() {
                        "until-unpinned" => false,
                        "auto-release" => true,
                        other => {
                            return Err(invalid(S, node, &format!("unknown policy {other:?}")));
                        }
                    }
                }
                "release-after-ms" => after = millis(S, node)?,
                "pin" => {
                    let id = string(S, node)?;
                    let coord = |name: &str| {
                        property(node, name)
                            .and_then(as_f64)
                            .ok_or_else(|| wrong_type(S, node, "numeric x= and y= properties"))
                    };
                    self.pins.push(PinRequest {
                        x: coord("x")?,
                        y: coord("y")?,
                        id,
                    });
                }
                _ => unknown(S, node),
            }
        }
        self.scene.pin_policy = if auto_release {
            PinPolicy::AutoRelease { after }
        } else {
            PinPolicy::UntilUnpinned
        };
        Ok(())
    }

    fn parse_alerts(&mut self, keys: &[KdlNode]) -> Result<(), ConfigError> {
        const S: &str = "alerts";
        for node in keys {
            match key(node) {
                "half-period-ms" => self.scene.alerts.half_period = millis(S, node)?,
                _ => unknown(S, node),
            }
        }
        Ok(())
    }

    fn parse_render(&mut self, keys: &[KdlNode]) -> Result<(), ConfigError> {
        const S: &str = "render";
        for node in keys {
            match key(node) {
                "fps" => {
                    self.render.fps = u32::try_from(unsigned(S, node)?)
                        .ok()
                        .filter(|fps| *fps > 0)
                        .ok_or_else(|| invalid(S, node, "fps must be between 1 and 2^32-1"))?
                }
                "frames" => self.render.frames = Some(unsigned(S, node)?),
                "svg-out" => self.render.svg_out = Some(PathBuf::from(string(S, node)?)),
                "log-every" => self.render.log_every = unsigned(S, node)?.max(1),
                _ => unknown(S, node),
            }
        }
        Ok(())
    }
}

fn key(node: &KdlNode) -> &str {
    node.name().value()
}

fn args(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

fn property<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(name))
        .map(|e| e.value())
}

fn as_f64(value: &KdlValue) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn first(section: &str, node: &KdlNode, expected: &'static str) -> Result<KdlValue, ConfigError> {
    args(node)
        .next()
        .cloned()
        .ok_or_else(|| wrong_type(section, node, expected))
}

fn float(section: &str, node: &KdlNode) -> Result<f64, ConfigError> {
    as_f64(&first(section, node, "a number")?).ok_or_else(|| wrong_type(section, node, "a number"))
}

fn unsigned(section: &str, node: &KdlNode) -> Result<u64, ConfigError> {
    first(section, node, "a non-negative integer")?
        .as_integer()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| wrong_type(section, node, "a non-negative integer"))
}

fn millis(section: &str, node: &KdlNode) -> Result<Duration, ConfigError> {
    unsigned(section, node).map(Duration::from_millis)
}

fn string(section: &str, node: &KdlNode) -> Result<String, ConfigError> {
    first(section, node, "a string")?
        .as_string()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(section, node, "a string"))
}

fn wrong_type(section: &str, node: &KdlNode, expected: &'static str) -> ConfigError {
    ConfigError::WrongType {
        section: section.to_string(),
        key: key(node).to_string(),
        expected,
    }
}

fn invalid(section: &str, node: &KdlNode, message: &str) -> ConfigError {
    ConfigError::Invalid {
        section: section.to_string(),
        key: key(node).to_string(),
        message: message.to_string(),
    }
}

fn unknown(section: &str, node: &KdlNode) {
    warn!(section, key = key(node), "ignoring unknown config key");
}
