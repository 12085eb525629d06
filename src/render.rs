//! Raster figures for the three pipeline stages.
//!
//! Graph figures place node `(row, col)` at `x = row`, `y = col` with `y`
//! pointing up, the grid figure draws cell `(i, j)` as the unit square at
//! `(i, j)`. All drawing goes through a [`RenderContext`] owned by the run.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::graph::{GridEdge, ImageGraph};
use crate::grid::PixelGrid;
use crate::solution::{boundary_segments, Assignment, CutPartition};

pub const GRAPH_FILE : &str = "image_graph.png";
pub const SOLUTION_FILE : &str = "boundary_graph.png";
pub const BOUNDARY_FILE : &str = "boundary_line.png";

/// Largest figure side in pixels.
pub const MAX_CANVAS_SIDE : u32 = 8192;

const WHITE : Rgb<u8> = Rgb([255, 255, 255]);
const BLACK : Rgb<u8> = Rgb([0, 0, 0]);
const RED : Rgb<u8> = Rgb([220, 20, 20]);
const FAINT : Rgb<u8> = Rgb([215, 215, 215]);
const INK : Rgb<u8> = Rgb([25, 25, 25]);

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{path}: {source}")]
    Io { path : PathBuf, source : std::io::Error },

    #[error("failed to encode figure: {0}")]
    Image(#[from] image::ImageError),

    #[error("cell size {0} is too small to draw")]
    CellSize(u32),

    #[error("{width}x{height} figure exceeds {MAX_CANVAS_SIDE} pixels per side")]
    CanvasTooLarge { width : u64, height : u64 },
}

// Removes a half-written figure unless the write went through.
struct PendingFile {
    path : PathBuf,
    done : bool,
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.done {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Per-run drawing state: where figures go, how big they are, and which
/// files were written so far.
#[derive(Debug)]
pub struct RenderContext {
    output_dir : PathBuf,
    cell : u32,
    written : Vec<PathBuf>,
}

impl RenderContext {
    pub fn new(output_dir : impl Into<PathBuf>, cell : u32) -> Result<Self, RenderError> {
        if cell < 8 {
            return Err(RenderError::CellSize(cell));
        }
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|source| RenderError::Io { path : output_dir.clone(), source })?;
        Ok(RenderContext { output_dir, cell, written : Vec::new() })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Ends the run and hands back every figure written.
    pub fn finish(self) -> Vec<PathBuf> {
        self.written
    }

    fn margin(&self) -> f32 {
        self.cell as f32 / 2.0
    }

    fn line_width(&self) -> f32 {
        (self.cell as f32 / 40.0).max(2.0)
    }

    fn node_radius(&self) -> i32 {
        (self.cell as i32 / 8).max(4)
    }

    fn glyph_scale(&self) -> u32 {
        (self.cell / 40).max(2)
    }

    fn graph_canvas(&self, graph : &ImageGraph) -> Result<RgbImage, RenderError> {
        let (rows, cols) = graph.shape();
        let cell = u64::from(self.cell);
        let w = 2 * (cell / 2) + (rows as u64).saturating_sub(1) * cell;
        let h = 2 * (cell / 2) + (cols as u64).saturating_sub(1) * cell;
        canvas(w, h)
    }

    // graph coordinates to pixels
    fn node_px(&self, img : &RgbImage, x : f64, y : f64) -> (f32, f32) {
        let m = self.margin();
        let c = self.cell as f32;
        (m + x as f32 * c, img.height() as f32 - m - y as f32 * c)
    }

    fn edge_px(&self, img : &RgbImage, e : &GridEdge) -> ((f32, f32), (f32, f32)) {
        (
            self.node_px(img, e.a.row as f64, e.a.col as f64),
            self.node_px(img, e.b.row as f64, e.b.col as f64),
        )
    }

    fn save(&mut self, name : &str, img : &RgbImage) -> Result<PathBuf, RenderError> {
        let path = self.output_dir.join(name);
        let mut pending = PendingFile { path : self.output_dir.join(format!(".{name}.partial")), done : false };
        img.save_with_format(&pending.path, ImageFormat::Png)?;
        fs::rename(&pending.path, &path).map_err(|source| RenderError::Io { path : path.clone(), source })?;
        pending.done = true;

        tracing::info!(path = %path.display(), width = img.width(), height = img.height(), "saved figure");
        self.written.push(path.clone());
        Ok(path)
    }
}

fn canvas(width : u64, height : u64) -> Result<RgbImage, RenderError> {
    if width > u64::from(MAX_CANVAS_SIDE) || height > u64::from(MAX_CANVAS_SIDE) {
        return Err(RenderError::CanvasTooLarge { width, height });
    }
    Ok(RgbImage::from_pixel(width.max(1) as u32, height.max(1) as u32, WHITE))
}

fn draw_thick_line(img : &mut RgbImage, from : (f32, f32), to : (f32, f32), width : f32, color : Rgb<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return;
    }
    let (nx, ny) = (-dy / len, dx / len);
    let steps = (width * 2.0).ceil() as i32;
    for k in 0..=steps {
        let off = -width / 2.0 + width * k as f32 / steps.max(1) as f32;
        draw_line_segment_mut(img, (from.0 + nx * off, from.1 + ny * off), (to.0 + nx * off, to.1 + ny * off), color);
    }
}

// dash, gap, dot, gap, in multiples of the line width
const DASH_DOT : [(f32, bool); 4] = [(6.0, true), (2.5, false), (1.0, true), (2.5, false)];

fn draw_dash_dot_line(img : &mut RgbImage, from : (f32, f32), to : (f32, f32), width : f32, color : Rgb<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return;
    }
    let at = |t : f32| (from.0 + dx * t / len, from.1 + dy * t / len);
    let mut t = 0.0;
    for (piece, ink) in DASH_DOT.iter().cycle() {
        if t >= len {
            break;
        }
        let end = (t + piece * width).min(len);
        if *ink {
            draw_thick_line(img, at(t), at(end), width, color);
        }
        t = end;
    }
}

// 3x5 bitmaps, top row first, most significant bit on the left.
const GLYPHS : [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Draws `value` centred on `center` over a white box.
fn draw_label(img : &mut RgbImage, center : (f32, f32), value : u32, scale : u32) {
    let digits : Vec<usize> = value.to_string().bytes().map(|b| (b - b'0') as usize).collect();
    let s = scale as i32;
    let glyph_w = 3 * s;
    let text_w = digits.len() as i32 * glyph_w + (digits.len() as i32 - 1) * s;
    let text_h = 5 * s;
    let left = center.0.round() as i32 - text_w / 2;
    let top = center.1.round() as i32 - text_h / 2;

    let pad = s;
    draw_filled_rect_mut(
        img,
        Rect::at(left - pad, top - pad).of_size((text_w + 2 * pad) as u32, (text_h + 2 * pad) as u32),
        WHITE,
    );
    for (n, &d) in digits.iter().enumerate() {
        let x0 = left + n as i32 * (glyph_w + s);
        for (row, bits) in GLYPHS[d].iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    draw_filled_rect_mut(img, Rect::at(x0 + col * s, top + row as i32 * s).of_size(scale, scale), BLACK);
                }
            }
        }
    }
}

fn draw_nodes(ctx : &RenderContext, img : &mut RgbImage, graph : &ImageGraph) {
    let r = ctx.node_radius();
    for node in graph.nodes() {
        let (x, y) = ctx.node_px(img, node.pos.0 as f64, node.pos.1 as f64);
        let center = (x.round() as i32, y.round() as i32);
        let fill = if node.color == 0 { WHITE } else { BLACK };
        draw_filled_circle_mut(img, center, r, fill);
        draw_hollow_circle_mut(img, center, r, BLACK);
    }
}

fn draw_weights(ctx : &RenderContext, img : &mut RgbImage, graph : &ImageGraph) {
    for e in graph.edges() {
        let (p, q) = ctx.edge_px(img, &e);
        draw_label(img, ((p.0 + q.0) / 2.0, (p.1 + q.1) / 2.0), u32::from(e.weight), ctx.glyph_scale());
    }
}

/// The input graph: edges in black, nodes in their pixel colour, and each
/// edge's weight at its midpoint.
pub fn draw_graph(ctx : &mut RenderContext, graph : &ImageGraph) -> Result<PathBuf, RenderError> {
    let mut img = ctx.graph_canvas(graph)?;
    for e in graph.edges() {
        let (p, q) = ctx.edge_px(&img, &e);
        draw_thick_line(&mut img, p, q, ctx.line_width(), BLACK);
    }
    draw_nodes(ctx, &mut img, graph);
    draw_weights(ctx, &mut img, graph);
    ctx.save(GRAPH_FILE, &img)
}

/// The graph again with uncut edges faint and dash-dotted and cut edges in
/// solid red.
pub fn draw_solution(ctx : &mut RenderContext, graph : &ImageGraph, assignment : &Assignment) -> Result<PathBuf, RenderError> {
    let partition = CutPartition::from_assignment(graph, assignment);
    let mut img = ctx.graph_canvas(graph)?;
    let width = ctx.line_width() * 1.5;
    for e in &partition.uncut {
        let (p, q) = ctx.edge_px(&img, e);
        draw_dash_dot_line(&mut img, p, q, width, FAINT);
    }
    for e in &partition.cut {
        let (p, q) = ctx.edge_px(&img, e);
        draw_thick_line(&mut img, p, q, width, RED);
    }
    draw_nodes(ctx, &mut img, graph);
    draw_weights(ctx, &mut img, graph);
    tracing::debug!(cut = partition.cut.len(), uncut = partition.uncut.len(), "drew solution graph");
    ctx.save(SOLUTION_FILE, &img)
}

/// The pixel grid with a red boundary piece along every cut edge.
pub fn draw_boundary(
    ctx : &mut RenderContext,
    grid : &PixelGrid,
    graph : &ImageGraph,
    assignment : &Assignment,
) -> Result<PathBuf, RenderError> {
    let c = ctx.cell;
    let mut img = canvas(grid.rows() as u64 * u64::from(c), grid.cols() as u64 * u64::from(c))?;
    let h = img.height();

    for (coord, value) in grid.cells() {
        let left = coord.row as u32 * c;
        let top = h - (coord.col as u32 + 1) * c;
        let fill = if value == 0 { WHITE } else { INK };
        draw_filled_rect_mut(&mut img, Rect::at(left as i32, top as i32).of_size(c, c), fill);
    }

    let to_px = |(x, y) : (f64, f64)| (x as f32 * c as f32, h as f32 - y as f32 * c as f32);
    let width = (c as f32 / 16.0).max(3.0);
    let segments = boundary_segments(graph, assignment);
    for seg in &segments {
        draw_thick_line(&mut img, to_px(seg.from), to_px(seg.to), width, RED);
    }
    tracing::debug!(segments = segments.len(), "drew boundary");
    ctx.save(BOUNDARY_FILE, &img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PixelGrid, ImageGraph, Assignment) {
        let dir = TempDir::new().unwrap();
        let grid = PixelGrid::example();
        let graph = ImageGraph::build(&grid);
        let assignment = Assignment::from_labels(grid.cells());
        (dir, grid, graph, assignment)
    }

    #[test]
    fn writes_all_three_figures() {
        let (dir, grid, graph, assignment) = setup();
        let mut ctx = RenderContext::new(dir.path().join("figures"), 40).unwrap();
        draw_graph(&mut ctx, &graph).unwrap();
        draw_solution(&mut ctx, &graph, &assignment).unwrap();
        draw_boundary(&mut ctx, &grid, &graph, &assignment).unwrap();

        let written = ctx.finish();
        let names : Vec<_> = written.iter().map(|p| p.file_name().unwrap().to_str().unwrap().to_string()).collect();
        assert_eq!(names, vec![GRAPH_FILE, SOLUTION_FILE, BOUNDARY_FILE]);
        for p in &written {
            assert!(p.exists());
        }
        let leftovers = fs::read_dir(dir.path().join("figures"))
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".partial"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn graph_figure_layout() {
        let (dir, _, graph, _) = setup();
        let mut ctx = RenderContext::new(dir.path(), 40).unwrap();
        let img = image::open(draw_graph(&mut ctx, &graph).unwrap()).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (120, 120));
        // node (0,0) is white, node (1,0) black, joined by a black edge
        assert_eq!(*img.get_pixel(20, 100), WHITE);
        assert_eq!(*img.get_pixel(60, 100), BLACK);
        assert_eq!(*img.get_pixel(30, 100), BLACK);
    }

    #[test]
    fn solution_highlights_cut_edges() {
        let (dir, _, graph, assignment) = setup();
        let mut ctx = RenderContext::new(dir.path(), 40).unwrap();
        let img = image::open(draw_solution(&mut ctx, &graph, &assignment).unwrap()).unwrap().to_rgb8();
        // (0,0)-(1,0) changes colour, so it is cut
        assert_eq!(*img.get_pixel(30, 100), RED);
        // (0,0)-(0,1) is uncut; its first dash starts right after the node
        assert_ne!(*img.get_pixel(20, 88), RED);
    }

    #[test]
    fn boundary_figure() {
        let (dir, grid, graph, assignment) = setup();
        let mut ctx = RenderContext::new(dir.path(), 40).unwrap();
        let img = image::open(draw_boundary(&mut ctx, &grid, &graph, &assignment).unwrap()).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (120, 120));
        assert_eq!(*img.get_pixel(20, 100), WHITE); // cell (0,0)
        assert_eq!(*img.get_pixel(60, 100), INK); // cell (1,0)
        assert_eq!(*img.get_pixel(40, 100), RED); // between them
        assert_eq!(*img.get_pixel(60, 60), WHITE); // centre cell, away from lines
    }

    #[test]
    fn labels_render_digits() {
        let mut img = RgbImage::from_pixel(20, 20, Rgb([9, 9, 9]));
        draw_label(&mut img, (10.0, 10.0), 1, 2);
        // glyph "1" at scale 2 spans x 7..13, y 5..15; its stem is the middle column
        assert_eq!(*img.get_pixel(9, 10), BLACK);
        assert_eq!(*img.get_pixel(7, 14), BLACK);
        assert_eq!(*img.get_pixel(7, 10), WHITE);
        assert_eq!(*img.get_pixel(0, 0), Rgb([9, 9, 9]));
    }

    #[test]
    fn pending_file_is_removed_unless_done() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".x.partial");
        fs::write(&path, b"half").unwrap();
        drop(PendingFile { path : path.clone(), done : false });
        assert!(!path.exists());

        fs::write(&path, b"whole").unwrap();
        drop(PendingFile { path : path.clone(), done : true });
        assert!(path.exists());
    }

    #[test]
    fn refuses_oversized_figures() {
        let dir = TempDir::new().unwrap();
        let grid = PixelGrid::new(vec![vec![0; 64]; 64]).unwrap();
        let graph = ImageGraph::build(&grid);
        let assignment = Assignment::from_labels(grid.cells());
        let mut ctx = RenderContext::new(dir.path(), 200).unwrap();
        assert!(matches!(draw_graph(&mut ctx, &graph), Err(RenderError::CanvasTooLarge { .. })));
        assert!(matches!(
            draw_boundary(&mut ctx, &grid, &graph, &assignment),
            Err(RenderError::CanvasTooLarge { width : 12800, height : 12800 })
        ));
        assert!(ctx.written().is_empty());
    }

    #[test]
    fn rejects_tiny_cells() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(RenderContext::new(dir.path(), 4), Err(RenderError::CellSize(4))));
    }
}
