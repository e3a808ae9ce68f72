// loader.rs - Voxel point list to dense grids
//
// Scene files are goxel-style text exports: one `x y z rrggbb` voxel per
// line, `#` comments. Black voxels mark the bounding box, brown ones are
// ground, blue ones are standing water and yellow ones are water that
// also feeds a source.

use log::{info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::SceneSource;
use crate::error::LoadError;
use crate::world::Grid;

const COMMENT_MARKER: char = '#';

/// Largest padded grid a scene may ask for (2048 x 2048).
pub const MAX_CELLS: usize = 1 << 22;

/// Hex color codes that carry meaning in a scene file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub reference: String,
    pub ground: String,
    pub water: String,
    pub source: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            reference: "000000".into(),
            ground: "8f563b".into(),
            water: "639bff".into(),
            source: "fbf236".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VoxelKind {
    Reference,
    Ground,
    Water,
    Source,
}

impl Palette {
    fn classify(&self, color: &str) -> Option<VoxelKind> {
        let matches = |code: &String| code.eq_ignore_ascii_case(color);
        if matches(&self.reference) {
            Some(VoxelKind::Reference)
        } else if matches(&self.ground) {
            Some(VoxelKind::Ground)
        } else if matches(&self.water) {
            Some(VoxelKind::Water)
        } else if matches(&self.source) {
            Some(VoxelKind::Source)
        } else {
            None
        }
    }
}

/// Which reference bound terrain heights are measured from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightDatum {
    #[default]
    ReferenceMin,
    ReferenceMax,
}

/// How the padded ring of the terrain grid is filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderFill {
    /// Border stays at height 0.
    #[default]
    Zero,
    /// Border copies its interior neighbour; corners drop to -1.
    Replicate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub palette: Palette,
    pub padding: usize,
    pub datum: HeightDatum,
    pub border: BorderFill,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            padding: 1,
            datum: HeightDatum::default(),
            border: BorderFill::default(),
        }
    }
}

/// Dense grids produced from one scene file.
#[derive(Clone, Debug)]
pub struct LoadedScene {
    terrain: Grid,
    water: Grid,
    source: Grid,
}

impl LoadedScene {
    pub fn rows(&self) -> usize { self.terrain.nrows() }
    pub fn cols(&self) -> usize { self.terrain.ncols() }
    pub fn terrain(&self) -> &Grid { &self.terrain }
    pub fn water(&self) -> &Grid { &self.water }
    pub fn source(&self) -> &Grid { &self.source }

    pub(crate) fn into_grids(self) -> (Grid, Grid, Grid) {
        (self.terrain, self.water, self.source)
    }
}

struct Voxel {
    x: i64,
    y: i64,
    z: i64,
    kind: VoxelKind,
}

/// Reference-voxel bounding box and the padding added around it.
struct Bounds {
    xmin: i64,
    xmax: i64,
    ymin: i64,
    ymax: i64,
    zmin: i64,
    zmax: i64,
    padding: usize,
}

impl Bounds {
    /// Padded grid shape, refused past [`MAX_CELLS`].
    fn shape(&self) -> Result<(usize, usize), LoadError> {
        let extent = |lo: i64, hi: i64| {
            usize::try_from(hi.abs_diff(lo))
                .ok()
                .and_then(|span| span.checked_add(1 + 2 * self.padding))
                .unwrap_or(usize::MAX)
        };
        let (m, n) = (extent(self.xmin, self.xmax), extent(self.ymin, self.ymax));
        match m.checked_mul(n) {
            Some(cells) if cells <= MAX_CELLS => Ok((m, n)),
            _ => Err(LoadError::TooLarge { rows: m, cols: n }),
        }
    }

    /// Only valid once `shape` has accepted the box.
    fn cell(&self, x: i64, y: i64) -> Option<[usize; 2]> {
        if x < self.xmin || x > self.xmax || y < self.ymin || y > self.ymax {
            return None;
        }
        Some([
            x.abs_diff(self.xmin) as usize + self.padding,
            y.abs_diff(self.ymin) as usize + self.padding,
        ])
    }
}

#[derive(Clone, Debug, Default)]
pub struct SceneLoader {
    config: LoaderConfig,
}

impl SceneLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Fetch `scene_id` from `source` and parse it.
    pub fn load_from(&self, source: &dyn SceneSource, scene_id: &str) -> Result<LoadedScene, LoadError> {
        let text = source.fetch(scene_id)?;
        self.load(&text)
    }

    /// Parse scene text into terrain, water and source grids.
    pub fn load(&self, text: &str) -> Result<LoadedScene, LoadError> {
        let padding = self.config.padding;
        if padding > 1 || (self.config.border == BorderFill::Replicate && padding != 1) {
            return Err(LoadError::InvalidPadding(padding));
        }

        let mut voxels = Vec::new();
        let mut data_lines = 0usize;
        for (idx, line) in text.lines().enumerate() {
            let Some((x, y, z, color)) = parse_line(idx + 1, line)? else { continue };
            data_lines += 1;
            if let Some(kind) = self.config.palette.classify(color) {
                voxels.push(Voxel { x, y, z, kind });
            }
        }
        if data_lines == 0 {
            return Err(LoadError::Empty);
        }

        let bounds = reference_bounds(&voxels, padding)?;
        let shape = bounds.shape()?;
        let datum = match self.config.datum {
            HeightDatum::ReferenceMin => bounds.zmin,
            HeightDatum::ReferenceMax => bounds.zmax,
        };

        let mut terrain = Array2::<f32>::zeros(shape);
        let mut water = Array2::<f32>::zeros(shape);
        let mut source = Array2::<f32>::zeros(shape);
        let mut outside = 0usize;

        // Terrain first: water depth is measured against the finished column.
        for v in voxels.iter().filter(|v| v.kind == VoxelKind::Ground) {
            let Some(c) = bounds.cell(v.x, v.y) else { outside += 1; continue };
            let height = (i128::from(v.z) - i128::from(datum)) as f32;
            terrain[c] = terrain[c].max(height);
        }

        for v in voxels.iter().filter(|v| matches!(v.kind, VoxelKind::Water | VoxelKind::Source)) {
            let Some(c) = bounds.cell(v.x, v.y) else { outside += 1; continue };
            water[c] = water[c].max(v.z as f32 - terrain[c]);
            if v.kind == VoxelKind::Source {
                source[c] += 1.0;
            }
        }

        if self.config.border == BorderFill::Replicate {
            replicate_border(&mut terrain);
        }

        if outside > 0 {
            warn!("skipped {} voxels outside the reference bounds", outside);
        }
        info!(
            "loaded scene {}x{}: {} voxels, {} source cells",
            shape.0,
            shape.1,
            voxels.len(),
            source.iter().filter(|&&s| s > 0.0).count()
        );

        Ok(LoadedScene { terrain, water, source })
    }
}

/// Split one line into coordinates and color; `None` for comments and blanks.
fn parse_line(line_no: usize, line: &str) -> Result<Option<(i64, i64, i64, &str)>, LoadError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
        return Ok(None);
    }

    let parse_err = |reason: String| LoadError::Parse { line: line_no, reason };
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let &[x, y, z, color] = tokens.as_slice() else {
        return Err(parse_err(format!("expected 4 fields, found {}", tokens.len())));
    };

    let coord = |tok: &str| {
        tok.parse::<i64>()
            .map_err(|_| parse_err(format!("bad coordinate '{}'", tok)))
    };
    let (x, y, z) = (coord(x)?, coord(y)?, coord(z)?);

    if color.len() != 6 || !color.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(parse_err(format!("bad color '{}'", color)));
    }

    Ok(Some((x, y, z, color)))
}

fn reference_bounds(voxels: &[Voxel], padding: usize) -> Result<Bounds, LoadError> {
    let mut refs = voxels.iter().filter(|v| v.kind == VoxelKind::Reference);
    let first = refs.next().ok_or(LoadError::MissingReference)?;
    let init = Bounds {
        xmin: first.x,
        xmax: first.x,
        ymin: first.y,
        ymax: first.y,
        zmin: first.z,
        zmax: first.z,
        padding,
    };
    Ok(refs.fold(init, |b, v| Bounds {
        xmin: b.xmin.min(v.x),
        xmax: b.xmax.max(v.x),
        ymin: b.ymin.min(v.y),
        ymax: b.ymax.max(v.y),
        zmin: b.zmin.min(v.z),
        zmax: b.zmax.max(v.z),
        padding,
    }))
}

/// Copy the first/last interior row and column outward, then sink the corners.
fn replicate_border(terrain: &mut Grid) {
    let (m, n) = terrain.dim();
    if m < 3 || n < 3 {
        return;
    }

    let top = terrain.row(1).to_owned();
    terrain.row_mut(0).assign(&top);
    let bottom = terrain.row(m - 2).to_owned();
    terrain.row_mut(m - 1).assign(&bottom);

    let left = terrain.column(1).to_owned();
    terrain.column_mut(0).assign(&left);
    let right = terrain.column(n - 2).to_owned();
    terrain.column_mut(n - 1).assign(&right);

    for c in [[0, 0], [0, n - 1], [m - 1, 0], [m - 1, n - 1]] {
        terrain[c] = -1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOX_3X3: &str = "\
# Goxel 0.15.1
# One line per voxel
# X Y Z RRGGBB
0 0 0 000000
2 2 4 000000
";

    fn scene(body: &str) -> String {
        format!("{}{}", BOX_3X3, body)
    }

    #[test]
    fn padded_grid_is_sized_from_reference_box() {
        let loaded = SceneLoader::default().load(BOX_3X3).unwrap();
        assert_eq!((loaded.rows(), loaded.cols()), (5, 5));
        assert_eq!(loaded.water().dim(), (5, 5));
        assert_eq!(loaded.source().dim(), (5, 5));
        assert!(loaded.terrain().iter().all(|&h| h == 0.0));
    }

    #[test]
    fn unpadded_grid_matches_box() {
        let loader = SceneLoader::new(LoaderConfig { padding: 0, ..Default::default() });
        let loaded = loader.load(BOX_3X3).unwrap();
        assert_eq!((loaded.rows(), loaded.cols()), (3, 3));
    }

    #[test]
    fn water_depth_is_measured_above_ground() {
        let text = scene("1 2 2 8f563b\n1 2 5 639bff\n");
        let loaded = SceneLoader::default().load(&text).unwrap();

        // padding shifts (1, 2) to (2, 3)
        assert_eq!(loaded.terrain()[[2, 3]], 2.0);
        assert_eq!(loaded.water()[[2, 3]], 3.0);
        let wet: Vec<_> = loaded.water().indexed_iter().filter(|(_, d)| **d != 0.0).collect();
        assert_eq!(wet.len(), 1);
    }

    #[test]
    fn tallest_voxel_wins_per_column() {
        let text = scene("0 0 1 8f563b\n0 0 3 8f563b\n0 0 2 8f563b\n0 0 4 639bff\n0 0 6 639bff\n");
        let loaded = SceneLoader::default().load(&text).unwrap();
        assert_eq!(loaded.terrain()[[1, 1]], 3.0);
        assert_eq!(loaded.water()[[1, 1]], 3.0);
    }

    #[test]
    fn source_voxels_accumulate_and_count_as_water() {
        let text = scene("1 1 1 fbf236\n1 1 2 FBF236\n1 1 3 fbf236\n");
        let loaded = SceneLoader::default().load(&text).unwrap();
        assert_eq!(loaded.source()[[2, 2]], 3.0);
        assert_eq!(loaded.water()[[2, 2]], 3.0);
        assert_eq!(loaded.source().sum(), 3.0);
    }

    #[test]
    fn reference_max_datum_measures_down_from_the_top() {
        let loader = SceneLoader::new(LoaderConfig {
            datum: HeightDatum::ReferenceMax,
            ..Default::default()
        });
        let loaded = loader.load(&scene("1 1 6 8f563b\n1 2 2 8f563b\n")).unwrap();
        assert_eq!(loaded.terrain()[[2, 2]], 2.0);
        // below the datum: the zero-initialized grid wins the max
        assert_eq!(loaded.terrain()[[2, 3]], 0.0);
    }

    #[test]
    fn unknown_colors_and_out_of_box_voxels_are_ignored() {
        let text = scene("1 1 1 ff00ff\n9 9 1 8f563b\n-4 0 7 639bff\n");
        let loaded = SceneLoader::default().load(&text).unwrap();
        assert_eq!(loaded.terrain().sum(), 0.0);
        assert_eq!(loaded.water().sum(), 0.0);
    }

    #[test]
    fn replicated_border_copies_interior_and_sinks_corners() {
        let loader = SceneLoader::new(LoaderConfig {
            border: BorderFill::Replicate,
            ..Default::default()
        });
        let loaded = loader.load(&scene("0 1 3 8f563b\n2 2 1 8f563b\n")).unwrap();
        let t = loaded.terrain();
        assert_eq!(t[[0, 2]], 3.0);
        assert_eq!(t[[1, 2]], 3.0);
        assert_eq!(t[[3, 4]], 1.0);
        assert_eq!(t[[4, 3]], 1.0);
        assert_eq!(t[[0, 0]], -1.0);
        assert_eq!(t[[4, 4]], -1.0);
    }

    #[test]
    fn replicate_needs_padding() {
        let loader = SceneLoader::new(LoaderConfig {
            padding: 0,
            border: BorderFill::Replicate,
            ..Default::default()
        });
        assert!(matches!(loader.load(BOX_3X3), Err(LoadError::InvalidPadding(0))));
    }

    #[test]
    fn empty_and_comment_only_scenes_fail() {
        let loader = SceneLoader::default();
        assert!(matches!(loader.load(""), Err(LoadError::Empty)));
        assert!(matches!(loader.load("# nothing\n\n   \n"), Err(LoadError::Empty)));
    }

    #[test]
    fn scene_without_reference_fails() {
        let err = SceneLoader::default().load("0 0 0 8f563b\n").unwrap_err();
        assert!(matches!(err, LoadError::MissingReference));
    }

    #[test]
    fn malformed_lines_report_line_number() {
        let loader = SceneLoader::default();
        match loader.load("0 0 0 000000\n1 2 000000\n") {
            Err(LoadError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(matches!(
            loader.load("# c\n0 0 x 000000\n"),
            Err(LoadError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            loader.load("0 0 0 00000g\n"),
            Err(LoadError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn extreme_reference_span_is_too_large() {
        let text = "-9223372036854775808 0 0 000000\n9223372036854775807 0 0 000000\n";
        match SceneLoader::default().load(text) {
            Err(LoadError::TooLarge { rows, cols }) => {
                assert_eq!(rows, usize::MAX);
                assert_eq!(cols, 3);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn oversized_box_is_refused_before_allocating() {
        let text = "0 0 0 000000\n200000 200000 0 000000\n";
        assert!(matches!(
            SceneLoader::default().load(text),
            Err(LoadError::TooLarge { rows: 200003, cols: 200003 })
        ));

        // 2046 + 1 + 2 = 2049 rows by 2048 columns is just past the cap
        let edge = "0 0 0 000000\n2046 2045 0 000000\n";
        assert!(matches!(SceneLoader::default().load(edge), Err(LoadError::TooLarge { .. })));
        let fits = "0 0 0 000000\n2045 2045 0 000000\n";
        assert_eq!(SceneLoader::default().load(fits).unwrap().rows(), 2048);
    }

    #[test]
    fn extreme_heights_fold_without_overflow() {
        let text = "0 0 -5 000000\n2 2 0 000000\n1 1 9223372036854775807 8f563b\n";
        let loaded = SceneLoader::default().load(text).unwrap();
        let h = loaded.terrain()[[2, 2]];
        assert!(h.is_finite() && h > 9.0e18);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: LoaderConfig =
            serde_json::from_str(r#"{"datum":"reference_max","palette":{"ground":"112233"}}"#)
                .unwrap();
        assert_eq!(config.datum, HeightDatum::ReferenceMax);
        assert_eq!(config.padding, 1);
        assert_eq!(config.palette.ground, "112233");
        assert_eq!(config.palette.reference, "000000");
    }
}
