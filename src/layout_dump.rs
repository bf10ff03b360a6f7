use crate::ir::Graph;
use crate::layout::{Drawing, LayoutStages};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: i64,
    pub height: i64,
    pub crossings: usize,
    pub bends: usize,
    pub vertices: Vec<VertexDump>,
    pub points: Vec<PointDump>,
    pub edges: Vec<EdgeDump>,
    /// Present when the dump was taken from the full stage output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<StageDump>,
}

#[derive(Debug, Serialize)]
pub struct VertexDump {
    pub id: String,
    pub x: i64,
    pub y: i64,
    pub min: [i64; 2],
    pub max: [i64; 2],
}

#[derive(Debug, Serialize)]
pub struct PointDump {
    pub id: String,
    pub kind: String,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    pub bends: usize,
    pub points: Vec<[i64; 2]>,
}

#[derive(Debug, Serialize)]
pub struct StageDump {
    pub planar_vertices: usize,
    pub planar_edges: usize,
    pub expansions: usize,
    pub shape_bends: usize,
    /// Rotation of every planar vertex, by id.
    pub rotations: Vec<(String, Vec<String>)>,
}

impl LayoutDump {
    pub fn from_drawing(drawing: &Drawing) -> Self {
        let vertices = drawing
            .vertices
            .iter()
            .map(|(id, placement)| VertexDump {
                id: id.clone(),
                x: placement.position.x,
                y: placement.position.y,
                min: [placement.min.x, placement.min.y],
                max: [placement.max.x, placement.max.y],
            })
            .collect();

        let points = drawing
            .points
            .iter()
            .map(|(id, point)| PointDump {
                id: id.clone(),
                kind: format!("{:?}", point.kind),
                x: point.position.x,
                y: point.position.y,
            })
            .collect();

        let edges = drawing
            .edges
            .iter()
            .map(|route| EdgeDump {
                from: route.from.clone(),
                to: route.to.clone(),
                bends: route.bends(),
                points: route.points.iter().map(|p| [p.x, p.y]).collect(),
            })
            .collect();

        LayoutDump {
            width: drawing.width,
            height: drawing.height,
            crossings: drawing.crossings,
            bends: drawing.total_bends(),
            vertices,
            points,
            edges,
            stages: None,
        }
    }

    pub fn from_stages(stages: &LayoutStages) -> Self {
        let mut dump = Self::from_drawing(&stages.drawing);
        let ortho = &stages.ortho;
        let rotations = (0..ortho.graph.vertex_count())
            .map(|v| {
                let around = ortho
                    .embedding
                    .rotation(v)
                    .iter()
                    .map(|&w| ortho.graph.id(w).to_string())
                    .collect();
                (ortho.graph.id(v).to_string(), around)
            })
            .collect();
        dump.stages = Some(StageDump {
            planar_vertices: stages.planar.graph.vertex_count(),
            planar_edges: stages.planar.graph.edge_count(),
            expansions: ortho.expansion_count(),
            shape_bends: ortho.total_bends,
            rotations,
        });
        dump
    }
}

pub fn layout_dump_json(stages: &LayoutStages) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&LayoutDump::from_stages(stages))?)
}

pub fn write_layout_dump(path: &Path, drawing: &Drawing, graph: &Graph) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut dump = LayoutDump::from_drawing(drawing);
    // Input order, so dumps of the same graph diff cleanly.
    dump.vertices.sort_by_key(|vertex| graph.index_of(&vertex.id).unwrap_or(usize::MAX));
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
