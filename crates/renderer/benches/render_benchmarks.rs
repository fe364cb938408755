//! Benchmarks for the renderer crate: colorization and PNG encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use raster_common::{Grid, NodataPolicy};
use renderer::{Color, Colorizer, ContinuousPalette, PaletteConfig, PngMode};
use test_utils::create_test_grid;

fn ramp() -> Colorizer {
    Colorizer::new(&PaletteConfig::Continuous(ContinuousPalette::from_colors(vec![
        Color::new(102, 51, 153, 26),
        Color::rgb(255, 225, 0),
    ])))
    .unwrap()
}

/// Gradient grid with every seventh cell nodata.
fn test_grid(size: usize) -> Grid {
    let mut grid =
        Grid::from_vec(size, size, create_test_grid(size, size), NodataPolicy::default()).unwrap();
    for i in (0..size * size).step_by(7) {
        grid.set(i % size, i / size, None);
    }
    grid
}

fn bench_colorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("colorize");
    let colorizer = ramp();

    for size in [256usize, 512] {
        let grid = test_grid(size);
        let range = grid.value_range();
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &grid, |b, grid| {
            b.iter(|| colorizer.colorize_grid(black_box(grid), 0, range))
        });
    }
    group.finish();
}

fn bench_png(c: &mut Criterion) {
    let mut group = c.benchmark_group("png");
    let grid = test_grid(256);
    let image = ramp().colorize_grid(&grid, 0, grid.value_range());

    for mode in [PngMode::Auto, PngMode::Rgba] {
        group.bench_with_input(
            BenchmarkId::new("encode", format!("{:?}", mode)),
            &image,
            |b, image| b.iter(|| image.to_png(black_box(mode))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_colorize, bench_png);
criterion_main!(benches);
