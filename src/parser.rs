use crate::ir::{Graph, Point, Positions};
use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

static GML_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[|\]|"(?:[^"\\]|\\.)*"|[^\s\[\]"]+"#).unwrap()
});
static GML_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap());

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub graph: Graph,
    /// Input placement, when every vertex carries one.
    pub positions: Option<Positions>,
}

/// Reads a graph in GML or JSON/JSON5. Objects (`{`) are read as JSON5,
/// everything else as GML.
pub fn parse_graph(input: &str) -> Result<ParseOutput> {
    let first = input
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"));
    match first {
        None => bail!("empty input"),
        Some(line) if line.starts_with('{') => parse_json_graph(input),
        Some(_) => parse_gml(&strip_comment_lines(input)),
    }
}

fn strip_comment_lines(input: &str) -> String {
    input
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq)]
enum GmlValue {
    Number(f64),
    Text(String),
    List(Vec<(String, GmlValue)>),
}

impl GmlValue {
    fn get(&self, key: &str) -> Option<&GmlValue> {
        match self {
            GmlValue::List(items) => items.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a GmlValue> + 'a {
        let items: &[(String, GmlValue)] = match self {
            GmlValue::List(items) => items,
            _ => &[],
        };
        items.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            GmlValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Scalar as a vertex key: integral numbers print without a fraction.
    fn as_key(&self) -> Option<String> {
        match self {
            GmlValue::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            GmlValue::Number(n) => Some(n.to_string()),
            GmlValue::Text(text) => Some(text.clone()),
            GmlValue::List(_) => None,
        }
    }
}

fn tokenize_gml(input: &str) -> Vec<&str> {
    GML_TOKEN_RE.find_iter(input).map(|m| m.as_str()).collect()
}

fn parse_gml_list(
    tokens: &[&str],
    pos: &mut usize,
    nested: bool,
) -> Result<Vec<(String, GmlValue)>> {
    let mut items = Vec::new();
    while *pos < tokens.len() {
        let key = tokens[*pos];
        if key == "]" {
            if !nested {
                bail!("unbalanced ']' in GML");
            }
            *pos += 1;
            return Ok(items);
        }
        if key == "[" || key.starts_with('"') {
            bail!("expected a GML key, found {key}");
        }
        *pos += 1;
        let value = tokens
            .get(*pos)
            .ok_or_else(|| anyhow!("GML key {key} has no value"))?;
        *pos += 1;
        let value = if *value == "[" {
            GmlValue::List(parse_gml_list(tokens, pos, true)?)
        } else if *value == "]" {
            bail!("GML key {key} has no value");
        } else if let Some(text) = value.strip_prefix('"') {
            GmlValue::Text(unescape_gml(text.strip_suffix('"').unwrap_or(text)))
        } else if GML_NUMBER_RE.is_match(value) {
            GmlValue::Number(value.parse()?)
        } else {
            GmlValue::Text(value.to_string())
        };
        items.push((key.to_string(), value));
    }
    if nested {
        bail!("unterminated GML list");
    }
    Ok(items)
}

fn unescape_gml(text: &str) -> String {
    text.replace("\\\"", "\"")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn parse_gml(input: &str) -> Result<ParseOutput> {
    let tokens = tokenize_gml(input);
    let mut pos = 0;
    let root = GmlValue::List(parse_gml_list(&tokens, &mut pos, false)?);
    let body = root
        .get("graph")
        .filter(|value| matches!(value, GmlValue::List(_)))
        .ok_or_else(|| anyhow!("GML input has no graph [ ... ] block"))?;

    let mut graph = Graph::new();
    let mut names: HashMap<String, String> = HashMap::new();
    let mut positions = Positions::new();
    let mut unplaced: Vec<String> = Vec::new();

    for node in body.all("node") {
        let id = node
            .get("id")
            .and_then(GmlValue::as_key)
            .ok_or_else(|| anyhow!("GML node without id"))?;
        let name = node
            .get("label")
            .and_then(GmlValue::as_key)
            .unwrap_or_else(|| id.clone());
        graph
            .add_vertex(&name)
            .with_context(|| format!("GML node {id}"))?;
        match node.get("graphics").map(|g| (g.get("x"), g.get("y"))) {
            Some((Some(x), Some(y))) => {
                let x = x.as_number().ok_or_else(|| anyhow!("node {id}: x is not a number"))?;
                let y = y.as_number().ok_or_else(|| anyhow!("node {id}: y is not a number"))?;
                positions.insert(name.clone(), Point::new(x, y));
            }
            _ => unplaced.push(name.clone()),
        }
        if names.insert(id.clone(), name).is_some() {
            bail!("GML node id {id} is used twice");
        }
    }

    for edge in body.all("edge") {
        let endpoint = |key: &str| -> Result<String> {
            let id = edge
                .get(key)
                .and_then(GmlValue::as_key)
                .ok_or_else(|| anyhow!("GML edge without {key}"))?;
            names
                .get(&id)
                .cloned()
                .ok_or_else(|| anyhow!("GML edge refers to unknown node {id}"))
        };
        let source = endpoint("source")?;
        let target = endpoint("target")?;
        graph
            .add_edge(&source, &target)
            .with_context(|| format!("GML edge {source} -- {target}"))?;
    }

    let positions = placement(positions, &unplaced)?;
    Ok(ParseOutput { graph, positions })
}

/// All or nothing: a partial placement cannot fix an embedding.
fn placement(positions: Positions, unplaced: &[String]) -> Result<Option<Positions>> {
    match (positions.is_empty(), unplaced.first()) {
        (true, _) => Ok(None),
        (false, None) => Ok(Some(positions)),
        (false, Some(id)) => bail!("vertex {id} has no position while others do"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyEntry {
    Text(String),
    Number(i64),
}

impl KeyEntry {
    fn into_key(self) -> String {
        match self {
            KeyEntry::Text(text) => text,
            KeyEntry::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VertexEntry {
    Key(KeyEntry),
    Object { id: KeyEntry },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EdgeEntry {
    Pair(KeyEntry, KeyEntry),
    Object { source: KeyEntry, target: KeyEntry },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointEntry {
    Pair(f64, f64),
    Object { x: f64, y: f64 },
}

impl From<PointEntry> for Point {
    fn from(entry: PointEntry) -> Self {
        match entry {
            PointEntry::Pair(x, y) | PointEntry::Object { x, y } => Point::new(x, y),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    #[serde(default)]
    vertices: Vec<VertexEntry>,
    #[serde(default)]
    edges: Vec<EdgeEntry>,
    #[serde(default)]
    positions: Option<BTreeMap<String, PointEntry>>,
}

fn parse_json_graph(input: &str) -> Result<ParseOutput> {
    let file: GraphFile = json5::from_str(input).context("invalid JSON graph")?;
    let mut graph = Graph::new();
    for entry in file.vertices {
        let id = match entry {
            VertexEntry::Key(key) | VertexEntry::Object { id: key } => key.into_key(),
        };
        graph.add_vertex(&id)?;
    }
    for entry in file.edges {
        let (a, b) = match entry {
            EdgeEntry::Pair(a, b) => (a.into_key(), b.into_key()),
            EdgeEntry::Object { source, target } => (source.into_key(), target.into_key()),
        };
        // Edges may introduce vertices that were not listed.
        graph.ensure_vertex(&a);
        graph.ensure_vertex(&b);
        graph
            .add_edge(&a, &b)
            .with_context(|| format!("edge {a} -- {b}"))?;
    }

    let positions = match file.positions {
        None => None,
        Some(entries) => {
            let mut positions = Positions::new();
            for (id, entry) in entries {
                if graph.index_of(&id).is_none() {
                    bail!("position given for unknown vertex {id}");
                }
                positions.insert(id, entry.into());
            }
            let unplaced: Vec<String> = graph
                .vertices
                .iter()
                .filter(|vertex| !positions.contains_key(&vertex.id))
                .map(|vertex| vertex.id.clone())
                .collect();
            placement(positions, &unplaced)?
        }
    };
    Ok(ParseOutput { graph, positions })
}
