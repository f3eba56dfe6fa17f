use std::sync::atomic::{AtomicUsize, Ordering};

use pixmask::cpu_caps;
use pixmask::filters::bitdepth::{dither_threshold, levels};
use pixmask::filters::boundary::mirror_index;
use pixmask::filters::regen::regenerate;
use pixmask::filters::resample::resample_cubic;
use pixmask::{quantize_bitdepth, FloatImage, ThreadPool};
use proptest::prelude::*;

fn image_from_seeds(width: usize, height: usize, seeds: &[u8]) -> FloatImage {
    let pixels: Vec<f32> = (0..width * height * 3)
        .map(|i| f32::from(seeds[i % seeds.len()]) / 255.0)
        .collect();
    FloatImage::from_vec(width, height, 3, pixels).unwrap()
}

proptest! {
    #[test]
    fn prop_mirror_index_stays_in_range(index in -10_000isize..10_000, len in 1usize..64) {
        let mirrored = mirror_index(index, len);
        prop_assert!(mirrored < len);
        if (0..len as isize).contains(&index) {
            prop_assert_eq!(mirrored, index as usize);
        }
        // reflection is symmetric about sample 0
        prop_assert_eq!(mirrored, mirror_index(-index, len));
    }

    #[test]
    fn prop_quantizer_output_is_on_the_level_grid(
        width in 1usize..24,
        height in 1usize..24,
        bits in 0u32..10,
        seeds in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let pool = ThreadPool::new(2);
        let image = image_from_seeds(width, height, &seeds);
        let mut first = image.clone().into_vec();
        let mut second = image.into_vec();
        quantize_bitdepth(&pool, &mut first, width, height, 3, bits).unwrap();
        quantize_bitdepth(&pool, &mut second, width, height, 3, bits).unwrap();

        let max_level = (levels(bits) - 1) as f32;
        for &v in &first {
            prop_assert!((0.0..=1.0).contains(&v));
            let level = v * max_level;
            prop_assert!((level - level.round()).abs() < 1e-3, "{} is off grid", v);
        }
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_dither_threshold_in_open_unit_interval(x in 0usize..4096, y in 0usize..4096) {
        let t = dither_threshold(x, y);
        prop_assert!(t > 0.0 && t < 1.0);
        prop_assert_eq!(t, dither_threshold(x % 8, y % 8));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_parallel_for_visits_each_index_once(
        begin in 0usize..500,
        len in 0usize..3000,
        worker_choice in 0usize..3,
    ) {
        let workers = [1, 2, cpu_caps::hw_threads()][worker_choice];
        let pool = ThreadPool::new(workers);
        let hits: Vec<AtomicUsize> = (0..len).map(|_| AtomicUsize::new(0)).collect();
        pool.parallel_for(begin, begin + len, |i| {
            hits[i - begin].fetch_add(1, Ordering::Relaxed);
        });
        prop_assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn prop_resize_to_same_size_is_identity(
        width in 1usize..20,
        height in 1usize..20,
        seeds in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        let pool = ThreadPool::new(3);
        let image = image_from_seeds(width, height, &seeds);
        let out = resample_cubic(&pool, &image, width, height).unwrap();
        prop_assert_eq!(out.pixels(), image.pixels());
    }

    #[test]
    fn prop_resample_output_shape_and_range(
        width in 1usize..24,
        height in 1usize..24,
        new_width in 1usize..40,
        new_height in 1usize..40,
        seeds in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        let pool = ThreadPool::new(2);
        let image = image_from_seeds(width, height, &seeds);
        let out = resample_cubic(&pool, &image, new_width, new_height).unwrap();
        prop_assert_eq!(out.dimensions(), (new_width, new_height));
        prop_assert!(out.pixels().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn prop_constant_survives_any_downscale(
        width in 2usize..48,
        height in 2usize..48,
        shrink_x in 0.0f64..1.0,
        shrink_y in 0.0f64..1.0,
        level in any::<u8>(),
    ) {
        // covers non-integer ratios such as 17 -> 5
        let new_width = ((width as f64 * shrink_x) as usize).clamp(1, width - 1);
        let new_height = ((height as f64 * shrink_y) as usize).clamp(1, height - 1);
        let value = f32::from(level) / 255.0;
        let pool = ThreadPool::new(2);
        let image = FloatImage::from_vec(width, height, 3, vec![value; width * height * 3]).unwrap();
        let out = resample_cubic(&pool, &image, new_width, new_height).unwrap();
        prop_assert_eq!(out.dimensions(), (new_width, new_height));
        for &v in out.pixels() {
            prop_assert!((v - value).abs() < 1e-5, "{} drifted to {} at {}x{} -> {}x{}",
                value, v, width, height, new_width, new_height);
        }
    }

    #[test]
    fn prop_regenerated_image_doubles_and_stays_in_range(
        width in 1usize..16,
        height in 1usize..16,
        seeds in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        let pool = ThreadPool::new(2);
        let image = image_from_seeds(width, height, &seeds);
        let out = regenerate(&pool, &image).unwrap();
        prop_assert_eq!(out.dimensions(), (width * 2, height * 2));
        prop_assert_eq!(out.channels(), 3);
        prop_assert!(out.pixels().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
