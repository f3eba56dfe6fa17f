use clap::{Args, Parser, Subcommand, ValueEnum};
use image::{DynamicImage, ImageBuffer, Rgb, Rgba};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use pixmask::filters::resample::scaled_size;
use pixmask::filters::regen_weights::UPSCALE;
use pixmask::security::{self, FileCapError, DEFAULT_MAX_MEGAPIXELS};
use pixmask::{PixelFormat, PixelView, PixelViewMut, Pixmask, PixmaskConfig, SanitizeReport};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "pixmask", version = pixmask::version(),
    about = "pixmask - strips low-amplitude, high-frequency perturbations from images before inference.\n\
             Use 'pixmask help <command>' for more information on a specific command.",
    long_about = None)]
struct Cli {
    /// Log every pipeline stage with its timing.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sanitizes one image file.
    Sanitize {
        /// Input image path
        input: PathBuf,
        /// Output image path
        output: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Sanitizes many image files into one directory.
    Batch {
        /// Input image paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory receiving the sanitized files (same file names)
        #[arg(long)]
        out_dir: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Resizes an image with the cubic resampler.
    Resample {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        scale_x: f32,
        #[arg(long)]
        scale_y: f32,
        /// Worker threads (default: hardware thread count)
        #[arg(long)]
        threads: Option<usize>,
        /// Reject images larger than this many megapixels
        #[arg(long, default_value_t = DEFAULT_MAX_MEGAPIXELS)]
        max_megapixels: f64,
    },
    /// Doubles an image's resolution with the detail regeneration network.
    Regenerate {
        input: PathBuf,
        output: PathBuf,
        /// Worker threads (default: hardware thread count)
        #[arg(long)]
        threads: Option<usize>,
        /// Reject images larger than this many megapixels
        #[arg(long, default_value_t = DEFAULT_MAX_MEGAPIXELS)]
        max_megapixels: f64,
    },
    /// Runs the pixel-cap and embedded-format checks on a file without sanitizing it.
    Check {
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_MEGAPIXELS)]
        max_megapixels: f64,
    },
    /// Prints the pixmask version.
    Version,
}

#[derive(Args, Debug, Clone)]
struct PipelineArgs {
    /// Pixel type written to the output file.
    #[arg(long, value_enum, default_value_t = OutputType::Native)]
    output_type: OutputType,
    /// Worker threads (default: PIXMASK_THREADS, then hardware thread count)
    #[arg(long)]
    threads: Option<usize>,
    /// JSON pipeline configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reject images larger than this many megapixels
    #[arg(long, default_value_t = DEFAULT_MAX_MEGAPIXELS)]
    max_megapixels: f64,
    /// Write the per-stage timing report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputType {
    /// Same pixel type as the input
    Native,
    /// 8 bits per channel
    U8,
    /// 32-bit float per channel
    F32,
}

impl OutputType {
    fn resolve(self, input: PixelFormat) -> PixelFormat {
        match (self, input) {
            (OutputType::Native, format) => format,
            (OutputType::U8, PixelFormat::Rgba8) => PixelFormat::Rgba8,
            (OutputType::U8, _) => PixelFormat::Rgb8,
            (OutputType::F32, _) => PixelFormat::RgbF32,
        }
    }
}

// decoded file in one of the three buffer layouts the library accepts
struct LoadedImage {
    format: PixelFormat,
    width: usize,
    height: usize,
    bytes: Vec<u8>,
}

impl LoadedImage {
    fn blank(format: PixelFormat, width: usize, height: usize) -> Self {
        LoadedImage {
            format,
            width,
            height,
            bytes: vec![0u8; width * height * format.bytes_per_pixel()],
        }
    }

    fn view(&self) -> Result<PixelView<'_>, String> {
        PixelView::packed(self.format, self.width, self.height, &self.bytes).map_err(|e| e.to_string())
    }

    fn view_mut(&mut self) -> Result<PixelViewMut<'_>, String> {
        PixelViewMut::packed(self.format, self.width, self.height, &mut self.bytes)
            .map_err(|e| e.to_string())
    }
}

fn f32_to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
}

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn load_image(path: &Path) -> Result<LoadedImage, String> {
    let img = image::open(path).map_err(|e| format!("failed to decode {}: {}", path.display(), e))?;
    let (width, height) = (img.width() as usize, img.height() as usize);

    let format = if matches!(img, DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)) {
        PixelFormat::RgbF32
    } else if img.color().has_alpha() {
        PixelFormat::Rgba8
    } else {
        PixelFormat::Rgb8
    };
    let bytes = match format {
        PixelFormat::RgbF32 => f32_to_bytes(&img.to_rgb32f().into_raw()),
        PixelFormat::Rgba8 => img.to_rgba8().into_raw(),
        PixelFormat::Rgb8 => img.to_rgb8().into_raw(),
    };
    Ok(LoadedImage {
        format,
        width,
        height,
        bytes,
    })
}

fn is_float_container(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("exr") | Some("hdr")
    )
}

fn save_image(path: &Path, img: LoadedImage) -> Result<(), String> {
    let (w, h) = (img.width as u32, img.height as u32);
    let size_err = || format!("buffer size does not match {}x{}", w, h);

    let dynamic = match img.format {
        PixelFormat::Rgb8 => DynamicImage::ImageRgb8(
            ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, img.bytes).ok_or_else(size_err)?,
        ),
        PixelFormat::Rgba8 => DynamicImage::ImageRgba8(
            ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, img.bytes).ok_or_else(size_err)?,
        ),
        PixelFormat::RgbF32 => {
            let buffer = ImageBuffer::<Rgb<f32>, _>::from_raw(w, h, bytes_to_f32(&img.bytes))
                .ok_or_else(size_err)?;
            let dynamic = DynamicImage::ImageRgb32F(buffer);
            if is_float_container(path) {
                dynamic
            } else {
                // most containers have no float variant
                DynamicImage::ImageRgb8(dynamic.to_rgb8())
            }
        }
    };
    dynamic
        .save(path)
        .map_err(|e| format!("failed to write {}: {}", path.display(), e))
}

fn build_engine(config_path: Option<&Path>, threads: Option<usize>) -> Result<Pixmask, String> {
    let mut config = match config_path {
        Some(path) => PixmaskConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => PixmaskConfig::default(),
    }
    .with_env_overrides();
    if let Some(n) = threads {
        if n == 0 {
            return Err("--threads must be at least 1".to_string());
        }
        config.workers = Some(n);
    }
    let engine = Pixmask::new(config).map_err(|e| e.to_string())?;
    info!("pixmask {} using {} worker(s)", pixmask::version(), engine.workers());
    Ok(engine)
}

fn sanitize_file(
    engine: &Pixmask,
    input: &Path,
    output: &Path,
    args: &PipelineArgs,
) -> Result<SanitizeReport, String> {
    security::check_file_pixel_cap(input, args.max_megapixels).map_err(|e| e.to_string())?;
    let src = load_image(input)?;
    if src.width % 2 != 0 || src.height % 2 != 0 {
        return Err(format!(
            "{} is {}x{}: width and height must both be even",
            input.display(),
            src.width,
            src.height
        ));
    }

    let mut dst = LoadedImage::blank(args.output_type.resolve(src.format), src.width, src.height);
    let report = {
        let view = src.view()?;
        let mut out = dst.view_mut()?;
        engine
            .sanitize(&view, &mut out)
            .map_err(|e| format!("failed to sanitize {}: {}", input.display(), e))?
    };
    save_image(output, dst)?;
    Ok(report)
}

fn write_report<T: serde::Serialize>(path: &Path, report: &T) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("failed to create {}: {}", path.display(), e))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| format!("failed to write report {}: {}", path.display(), e))
}

fn run_batch(inputs: &[PathBuf], out_dir: &Path, args: &PipelineArgs) -> Result<(), String> {
    fs::create_dir_all(out_dir).map_err(|e| format!("failed to create {}: {}", out_dir.display(), e))?;
    let engine = build_engine(args.config.as_deref(), args.threads)?;

    let progress_bar = ProgressBar::new(inputs.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5} (eta {eta_precise}) {msg}")
            .map_err(|e| e.to_string())?
            .progress_chars("##-"),
    );

    let start = Instant::now();
    let mut reports = Vec::with_capacity(inputs.len());
    let mut failures = 0usize;
    for input in inputs {
        let name = input.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("output.png"));
        progress_bar.set_message(name.display().to_string());
        match sanitize_file(&engine, input, &out_dir.join(&name), args) {
            Ok(report) => reports.push(report),
            Err(e) => {
                failures += 1;
                progress_bar.suspend(|| warn!("{}", e));
            }
        }
        progress_bar.inc(1);
    }
    progress_bar.finish_with_message("done");

    info!(
        "sanitized {}/{} file(s) in {:.2}s",
        reports.len(),
        inputs.len(),
        start.elapsed().as_secs_f64()
    );
    if let Some(path) = &args.report {
        write_report(path, &reports)?;
    }
    if failures > 0 {
        return Err(format!("{} of {} file(s) failed", failures, inputs.len()));
    }
    Ok(())
}

fn run_check(file: &Path, max_megapixels: f64) -> Result<(), String> {
    let bytes = fs::read(file).map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
    let mut problems = Vec::new();

    match security::check_file_pixel_cap(file, max_megapixels) {
        Ok((w, h)) => println!("dimensions: {}x{}", w, h),
        Err(FileCapError::OverCap { width, height, .. }) => {
            println!("dimensions: {}x{}", width, height);
            problems.push(format!("exceeds the {} megapixel cap", max_megapixels));
        }
        Err(FileCapError::Header { source, .. }) => {
            problems.push(format!("not a decodable image: {}", source))
        }
    }
    if let Some(signature) = security::find_polyglot_signature(&bytes) {
        problems.push(format!("contains an embedded {} signature", signature));
    }

    if problems.is_empty() {
        println!("{}: ok", file.display());
        return Ok(());
    }
    for problem in &problems {
        println!("{}: {}", file.display(), problem);
    }
    Err(format!("{} failed {} check(s)", file.display(), problems.len()))
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Sanitize {
            input,
            output,
            pipeline,
        } => {
            let engine = build_engine(pipeline.config.as_deref(), pipeline.threads)?;
            let report = sanitize_file(&engine, &input, &output, &pipeline)?;
            println!(
                "sanitized '{}' to '{}' in {:.2} ms",
                input.display(),
                output.display(),
                report.total_ms
            );
            if let Some(path) = &pipeline.report {
                write_report(path, &report)?;
            }
        }
        Commands::Batch {
            inputs,
            out_dir,
            pipeline,
        } => run_batch(&inputs, &out_dir, &pipeline)?,
        Commands::Resample {
            input,
            output,
            scale_x,
            scale_y,
            threads,
            max_megapixels,
        } => {
            security::check_file_pixel_cap(&input, max_megapixels).map_err(|e| e.to_string())?;
            let engine = build_engine(None, threads)?;
            let src = load_image(&input)?;
            let width = scaled_size(src.width, f64::from(scale_x));
            let height = scaled_size(src.height, f64::from(scale_y));
            let mut dst = LoadedImage::blank(src.format, width.max(1), height.max(1));
            {
                let view = src.view()?;
                let mut out = dst.view_mut()?;
                engine
                    .resample(&view, &mut out, scale_x, scale_y)
                    .map_err(|e| format!("failed to resample {}: {}", input.display(), e))?;
            }
            save_image(&output, dst)?;
            println!("resampled '{}' to {}x{} at '{}'", input.display(), width, height, output.display());
        }
        Commands::Regenerate {
            input,
            output,
            threads,
            max_megapixels,
        } => {
            security::check_file_pixel_cap(&input, max_megapixels).map_err(|e| e.to_string())?;
            let engine = build_engine(None, threads)?;
            let src = load_image(&input)?;
            let mut dst = LoadedImage::blank(src.format, src.width * UPSCALE, src.height * UPSCALE);
            {
                let view = src.view()?;
                let mut out = dst.view_mut()?;
                engine
                    .regenerate_detail(&view, &mut out)
                    .map_err(|e| format!("failed to regenerate {}: {}", input.display(), e))?;
            }
            save_image(&output, dst)?;
            println!("regenerated '{}' into '{}'", input.display(), output.display());
        }
        Commands::Check {
            file,
            max_megapixels,
        } => run_check(&file, max_megapixels)?,
        Commands::Version => {
            let (target, profile) = pixmask::build_info();
            println!("pixmask version {} ({}, {})", pixmask::version(), target, profile);
        }
    }

    Ok(())
}
