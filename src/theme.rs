use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub vertex_fill: String,
    pub vertex_stroke: String,
    /// Fill for crossing and expansion points when they are drawn.
    pub dummy_fill: String,
    pub edge_color: String,
    pub edge_width: f32,
    pub text_color: String,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            vertex_fill: "#ECECFF".to_string(),
            vertex_stroke: "#9370DB".to_string(),
            dummy_fill: "#9370DB".to_string(),
            edge_color: "#333333".to_string(),
            edge_width: 2.0,
            text_color: "#333333".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            vertex_fill: "#F8FAFF".to_string(),
            vertex_stroke: "#7A8AA6".to_string(),
            dummy_fill: "#C7D2E5".to_string(),
            edge_color: "#7A8AA6".to_string(),
            edge_width: 1.5,
            text_color: "#1C2430".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}
