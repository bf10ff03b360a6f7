use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_BEND_COST: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanarizationConfig {
    /// Upper bound on crossing dummies inserted before giving up.
    pub max_iterations: usize,
}

impl Default for PlanarizationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrthogonalizationConfig {
    /// Cost of one bend. Any positive value yields the minimum total.
    pub bend_cost: i64,
    /// Among shapes with the fewest bends, prefer those that spread bends
    /// over many edges instead of stacking them on a few.
    pub spread_bends: bool,
}

impl Default for OrthogonalizationConfig {
    fn default() -> Self {
        Self {
            bend_cost: 1,
            spread_bends: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Empty grid columns between disconnected components.
    pub component_gap: i64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self { component_gap: 2 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Wall-clock limit for the whole pipeline; `None` means unbounded.
    pub time_budget_ms: Option<u64>,
    pub planarization: PlanarizationConfig,
    pub orthogonalization: OrthogonalizationConfig,
    pub compaction: CompactionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Pixels per grid unit.
    pub scale: f32,
    pub margin: f32,
    pub vertex_radius: f32,
    pub show_bends: bool,
    pub show_labels: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: 40.0,
            margin: 24.0,
            vertex_radius: 6.0,
            show_bends: false,
            show_labels: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    vertex_fill: Option<String>,
    vertex_stroke: Option<String>,
    dummy_fill: Option<String>,
    edge_color: Option<String>,
    edge_width: Option<f32>,
    text_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    time_budget_ms: Option<u64>,
    max_iterations: Option<usize>,
    bend_cost: Option<i64>,
    spread_bends: Option<bool>,
    component_gap: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    scale: Option<f32>,
    margin: Option<f32>,
    vertex_radius: Option<f32>,
    show_bends: Option<bool>,
    show_labels: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    render: Option<RenderConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Overlays the keys present in a JSON5 document onto the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    match parsed.theme.as_deref() {
        Some("classic") | Some("default") => config.theme = Theme::classic(),
        Some("modern") | None => {}
        Some(other) => anyhow::bail!("unknown theme `{other}`"),
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.vertex_fill {
            config.theme.vertex_fill = v;
        }
        if let Some(v) = vars.vertex_stroke {
            config.theme.vertex_stroke = v;
        }
        if let Some(v) = vars.dummy_fill {
            config.theme.dummy_fill = v;
        }
        if let Some(v) = vars.edge_color {
            config.theme.edge_color = v;
        }
        if let Some(v) = vars.edge_width {
            config.theme.edge_width = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if layout.time_budget_ms.is_some() {
            config.layout.time_budget_ms = layout.time_budget_ms;
        }
        if let Some(v) = layout.max_iterations {
            config.layout.planarization.max_iterations = v;
        }
        if let Some(v) = layout.bend_cost {
            anyhow::ensure!(
                (0..=MAX_BEND_COST).contains(&v),
                "bendCost must be between 0 and {MAX_BEND_COST}"
            );
            config.layout.orthogonalization.bend_cost = v;
        }
        if let Some(v) = layout.spread_bends {
            config.layout.orthogonalization.spread_bends = v;
        }
        if let Some(v) = layout.component_gap {
            anyhow::ensure!(v >= 1, "componentGap must be at least 1");
            config.layout.compaction.component_gap = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.scale {
            anyhow::ensure!(v > 0.0, "scale must be positive");
            config.render.scale = v;
        }
        if let Some(v) = render.margin {
            config.render.margin = v;
        }
        if let Some(v) = render.vertex_radius {
            config.render.vertex_radius = v;
        }
        if let Some(v) = render.show_bends {
            config.render.show_bends = v;
        }
        if let Some(v) = render.show_labels {
            config.render.show_labels = v;
        }
    }

    Ok(config)
}
