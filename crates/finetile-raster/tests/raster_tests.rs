//! End-to-end tests: bin a scene into a grid, seal it and rasterize it

use anyhow::Result;
use finetile_core::{
    Color, FinetileConfig, OverflowPolicy, RasterConfig, TileConfig, TileCoord, TileError,
};
use finetile_raster::{
    pipeline, Command, Evaluator, FineRasterizer, TileFault, TileGrid, TileStatus,
};
use glam::Vec2;
use pretty_assertions::assert_eq;

fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> [Command; 4] {
    [
        Command::line_fill((x0, y0), (x1, y0)),
        Command::line_fill((x1, y0), (x1, y1)),
        Command::line_fill((x1, y1), (x0, y1)),
        Command::line_fill((x0, y1), (x0, y0)),
    ]
}

fn hard_edges(workers: usize) -> FineRasterizer {
    FineRasterizer::new(RasterConfig {
        worker_threads: workers,
        antialias: false,
        ..RasterConfig::default()
    })
}

fn covered(frame: &finetile_raster::Frame, color: i32) -> usize {
    frame
        .pixels
        .iter()
        .filter(|p| p.color == Some(color))
        .count()
}

#[test]
fn test_shape_split_across_tiles() -> Result<()> {
    // A 24x8 rectangle at (4, 4) spans two tiles; each tile gets its part in
    // local coordinates.
    let mut grid = TileGrid::new(32, 16, &TileConfig::default())?;
    let mut left = vec![Command::solid(3)];
    left.extend(rect(4.0, 4.0, 16.0, 12.0));
    let mut right = vec![Command::solid(3)];
    right.extend(rect(0.0, 4.0, 12.0, 12.0));
    grid.bin(TileCoord::new(0, 0), &left)?;
    grid.bin(TileCoord::new(1, 0), &right)?;

    let (frame, report) = hard_edges(2).render(&grid.seal())?;
    assert!(report.is_clean());
    assert_eq!(report.tiles, 2);
    assert_eq!(covered(&frame, 3), 24 * 8);
    assert_eq!(frame.get(15, 8).and_then(|p| p.color), Some(3));
    assert_eq!(frame.get(16, 8).and_then(|p| p.color), Some(3));
    assert_eq!(frame.get(28, 8).and_then(|p| p.color), None);
    Ok(())
}

#[test]
fn test_later_color_wins_for_stroke() -> Result<()> {
    let mut grid = TileGrid::new(16, 16, &TileConfig::default())?;
    grid.bin(
        TileCoord::new(0, 0),
        &[
            Command::solid(1),
            Command::segment((0.0, 8.0), (16.0, 8.0), 1.0),
            Command::solid(2),
        ],
    )?;

    let (frame, _) = hard_edges(1).render(&grid.seal())?;
    assert_eq!(covered(&frame, 2), 16 * 2);
    assert_eq!(covered(&frame, 1), 0);
    Ok(())
}

#[test]
fn test_truncate_and_fallback_policies() -> Result<()> {
    let tiles = TileConfig {
        capacity: 32,
        ..TileConfig::default()
    };
    let mut scene = vec![Command::solid(6)];
    scene.extend(rect(0.0, 0.0, 16.0, 16.0));

    let mut truncating =
        TileGrid::new(16, 16, &tiles)?.with_overflow_policy(OverflowPolicy::Truncate);
    let status = truncating.bin(TileCoord::new(0, 0), &scene)?;
    assert_eq!(status, TileStatus::Truncated { dropped: 3 });
    let (frame, report) = hard_edges(1).render(&truncating.seal())?;
    assert_eq!(report.fallback_tiles, 0);
    // Only the top edge survived, so nothing is enclosed.
    assert_eq!(covered(&frame, 6), 0);

    let mut falling_back =
        TileGrid::new(16, 16, &tiles)?.with_overflow_policy(OverflowPolicy::Fallback);
    let status = falling_back.bin(TileCoord::new(0, 0), &scene)?;
    assert_eq!(status, TileStatus::Fallback);
    let (frame, report) = hard_edges(1).render(&falling_back.seal())?;
    assert_eq!(report.fallback_tiles, 1);
    assert_eq!(covered(&frame, 6), 256);
    Ok(())
}

#[test]
fn test_faulty_tiles_are_isolated() -> Result<()> {
    let mut grid = TileGrid::new(48, 16, &TileConfig::default())?;
    let mut scene = vec![Command::solid(4)];
    scene.extend(rect(0.0, 0.0, 16.0, 16.0));

    grid.bin(TileCoord::new(0, 0), &scene)?;
    // A Solid tag with no payload behind it.
    grid.load_raw(TileCoord::new(1, 0), &3u32.to_ne_bytes())?;
    grid.bin(TileCoord::new(2, 0), &scene)?;

    let (frame, report) = hard_edges(3).render(&grid.seal())?;
    assert_eq!(
        report.faults,
        vec![TileFault {
            coord: TileCoord::new(1, 0),
            error: TileError::UnterminatedBuffer { offset: 0 },
        }]
    );
    assert_eq!(report.tiles, 2);
    assert_eq!(covered(&frame, 4), 2 * 256);
    assert_eq!(frame.get(24, 8).and_then(|p| p.color), None);
    Ok(())
}

#[test]
fn test_worker_count_does_not_change_output() -> Result<()> {
    let build = || -> Result<_> {
        let mut grid = TileGrid::new(64, 64, &TileConfig::default())?;
        for y in 0..4 {
            for x in 0..4 {
                let mut scene = vec![Command::solid((x * 4 + y) as i32)];
                scene.extend(rect(2.0, 2.0, 12.0, 9.0));
                grid.bin(TileCoord::new(x, y), &scene)?;
            }
        }
        Ok(grid.seal())
    };

    let sealed = build()?;
    let (single, _) = hard_edges(1).render(&sealed)?;
    let (many, _) = hard_edges(5).render(&sealed)?;
    assert_eq!(single, many);
    Ok(())
}

#[test]
fn test_antialiased_edges_resolve_partially() -> Result<()> {
    let config = FinetileConfig::default();
    let (mut grid, rasterizer) = pipeline(16, 16, &config)?;
    let mut scene = vec![Command::solid(0)];
    scene.extend(rect(0.0, 0.0, 8.25, 16.0));
    grid.bin(TileCoord::new(0, 0), &scene)?;

    let (frame, _) = rasterizer.render(&grid.seal())?;
    let edge = frame.get(8, 4).copied().unwrap_or_default();
    assert_eq!(edge.color, Some(0));
    assert!((edge.coverage - 0.25).abs() < 1e-4);

    let rgba = frame.resolve(&[Color::WHITE]);
    assert_eq!(rgba[4 * 16], [255, 255, 255, 255]);
    assert_eq!(rgba[4 * 16 + 8], [255, 255, 255, 64]);
    assert_eq!(rgba[4 * 16 + 9], [0, 0, 0, 0]);
    Ok(())
}

#[test]
fn test_far_vertex_renders_unclamped() -> Result<()> {
    // One vertex sits ~3000 px from the tile, outside the fixed-point range.
    // Clamping it would move the diagonal edge and uncover (8, 12).
    let mut grid = TileGrid::new(16, 16, &TileConfig::default())?
        .with_overflow_policy(OverflowPolicy::Truncate);
    let scene = [
        Command::solid(6),
        Command::line_fill((-3000.0, -1000.0), (16.0, 16.0)),
        Command::line_fill((16.0, 16.0), (16.0, -1000.0)),
        Command::line_fill((16.0, -1000.0), (-3000.0, -1000.0)),
    ];
    let coord = TileCoord::new(0, 0);
    assert_eq!(grid.bin(coord, &scene)?, TileStatus::Fallback);

    let (frame, report) = hard_edges(1).render(&grid.seal())?;
    assert_eq!(report.fallback_tiles, 1);
    assert!(report.is_clean());
    assert_eq!(frame.get(8, 12).and_then(|p| p.color), Some(6));
    assert_eq!(frame.get(15, 0).and_then(|p| p.color), Some(6));
    assert_eq!(frame.get(8, 14).and_then(|p| p.color), None);
    Ok(())
}

#[test]
fn test_bezier_shape_decodes_and_renders() -> Result<()> {
    let (mut grid, rasterizer) = pipeline(16, 16, &FinetileConfig::default())?;

    // Half-disc-like shape: a curve over a straight base.
    let shape = [
        Command::solid(2),
        Command::bez_fill((0.0, 0.0), (8.0, 16.0), (16.0, 0.0)),
        Command::line_fill((16.0, 0.0), (0.0, 0.0)),
    ];
    assert_eq!(grid.bin(TileCoord::new(0, 0), &shape)?, TileStatus::Encoded);

    let sealed = grid.seal();
    let view = sealed.tile(TileCoord::new(0, 0))?;
    let sample = Evaluator::default().eval_view(&view, Vec2::new(8.0, 5.0))?;
    assert!(sample.inside);

    let (frame, report) = rasterizer.render(&sealed)?;
    assert!(report.is_clean());
    assert_eq!(frame.get(8, 4).and_then(|p| p.color), Some(2));
    assert_eq!(frame.get(8, 12).and_then(|p| p.color), None);
    Ok(())
}
