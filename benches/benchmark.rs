use criterion::measurement::WallTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkGroup, Criterion, Throughput};
use pixmask::filters::dct::hf_attenuate;
use pixmask::filters::regen::regenerate;
use pixmask::filters::resample::resample_cubic;
use pixmask::vectorization::par_blend3_clamped;
use pixmask::{
    quantize_bitdepth, FloatImage, PixelFormat, PixelView, PixelViewMut, Pixmask, PixmaskConfig,
    ThreadPool,
};

// shared criterion settings for every target
fn custom_criterion_config() -> Criterion<WallTime> {
    Criterion::default()
        .confidence_level(0.99)
        .sample_size(30) // whole-image stages are slow, keep runs short
        .measurement_time(std::time::Duration::from_secs(5))
        .warm_up_time(std::time::Duration::from_secs(1))
        .with_plots()
}

fn test_image(width: usize, height: usize) -> FloatImage {
    let mut image = FloatImage::new(width, height, 3);
    for (i, value) in image.pixels_mut().iter_mut().enumerate() {
        *value = (i.wrapping_mul(2_654_435_761) % 1021) as f32 / 1020.0;
    }
    image
}

fn image_sizes() -> Vec<usize> {
    #[cfg(debug_assertions)]
    let sizes = vec![64, 128]; // for faster development runs

    #[cfg(not(debug_assertions))]
    let sizes = vec![128, 256, 512, 1024];

    sizes
}

fn worker_counts() -> Vec<usize> {
    let mut counts = vec![1, 2, 4];
    let hw = pixmask::cpu_caps::hw_threads();
    if !counts.contains(&hw) {
        counts.push(hw);
    }
    counts
}

// per-stage timings on one shared pool
fn stage_benchmarks(c: &mut Criterion) {
    let pool = ThreadPool::with_default_workers();
    let mut group = c.benchmark_group("stages");

    for size in image_sizes() {
        let image = test_image(size, size);
        group.throughput(Throughput::Elements((size * size) as u64));
        bench_stages(&mut group, &pool, &image, size);
    }

    group.finish();
}

fn bench_stages(group: &mut BenchmarkGroup<WallTime>, pool: &ThreadPool, image: &FloatImage, size: usize) {
    group.bench_function(format!("downscale_{}px", size), |b| {
        b.iter(|| resample_cubic(pool, black_box(image), size / 4, size / 4).unwrap());
    });

    let low = resample_cubic(pool, image, size / 4, size / 4).unwrap();
    group.bench_function(format!("upscale_{}px", size), |b| {
        b.iter(|| resample_cubic(pool, black_box(&low), size, size).unwrap());
    });

    group.bench_function(format!("dct_attenuate_{}px", size), |b| {
        b.iter(|| hf_attenuate(pool, black_box(image), 60).unwrap());
    });

    group.bench_function(format!("quantize_{}px", size), |b| {
        let mut data = image.pixels().to_vec();
        b.iter(|| {
            data.copy_from_slice(image.pixels());
            quantize_bitdepth(pool, black_box(&mut data), size, size, 3, 6).unwrap();
        });
    });

    let half = resample_cubic(pool, image, size / 2, size / 2).unwrap();
    group.bench_function(format!("regenerate_{}px", size), |b| {
        b.iter(|| regenerate(pool, black_box(&half)).unwrap());
    });

    group.bench_function(format!("composite_{}px", size), |b| {
        let mut out = vec![0.0f32; image.len()];
        b.iter(|| {
            par_blend3_clamped(
                pool,
                black_box(&mut out),
                image.pixels(),
                image.pixels(),
                image.pixels(),
                0.15,
                0.35,
                0.5,
            )
        });
    });
}

// end-to-end sanitize across image sizes and worker counts
fn sanitize_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");

    for size in image_sizes() {
        let input: Vec<u8> = (0..size * size * 3).map(|i| ((i * 7919) % 256) as u8).collect();
        let mut output = vec![0u8; input.len()];
        group.throughput(Throughput::Elements((size * size) as u64));

        for workers in worker_counts() {
            let pixmask = Pixmask::new(PixmaskConfig {
                workers: Some(workers),
                ..PixmaskConfig::default()
            })
            .unwrap();

            group.bench_function(format!("rgb8_{}px_{}_workers", size, workers), |b| {
                b.iter(|| {
                    let src = PixelView::packed(PixelFormat::Rgb8, size, size, black_box(&input)).unwrap();
                    let mut dst = PixelViewMut::packed(PixelFormat::Rgb8, size, size, &mut output).unwrap();
                    pixmask.sanitize(&src, &mut dst).unwrap()
                });
            });
        }
    }

    group.finish();
}

// dispatch overhead of the pool on trivial bodies
fn pool_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");
    for workers in worker_counts() {
        let pool = ThreadPool::new(workers);
        group.bench_function(format!("parallel_for_4096_{}_workers", workers), |b| {
            b.iter(|| {
                pool.parallel_for(0, 4096, |i| {
                    black_box(i);
                })
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = custom_criterion_config();
    targets = stage_benchmarks, sanitize_benchmarks, pool_benchmarks
}
criterion_main!(benches);
