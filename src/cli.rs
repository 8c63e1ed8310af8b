// ============================================================================
// SpotHeal CLI — replay heal clicks and strokes on image files
// ============================================================================
//
// Usage examples:
//   spotheal -i photo.png --heal 120,88 -o fixed.png
//   spotheal -i scan.jpg --size 30 --mode continuous \
//            --stroke "40,40 44,41 48,43 52,44" -o out.png
//   spotheal -i "shots/*.png" --brush soft.json --heal 10,10 --output-dir out/
//   spotheal -i photo.png --brightness 15 --contrast 110 --crop 0,0,640,480
//
// Per file: load → heal clicks → strokes → adjustments → crop → save.
// Everything runs synchronously on the calling thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::components::tools::{BrushState, CursorType, HealTool, StrokeEvent};
use crate::io::{SaveFormat, encode_and_write, load_brush_preset, load_image_sync, save_brush_preset};
use crate::ops::adjustments::{AdjustmentParams, apply_adjustments};
use crate::ops::canvas_ops::crop;
use crate::ops::inpaint::BlendFalloff;
use crate::{log_err, log_info, log_warn};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Pointer position in image pixels, written `X,Y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Drag path: pressed at the first point, moved through the rest, released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stroke(pub Vec<Point>);

/// Crop rectangle, written `X,Y,W,H`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

/// SpotHeal headless spot-healing tool.
#[derive(Parser, Debug)]
#[command(
    name = "spotheal",
    version,
    about = "Spot-heal images from the command line",
    long_about = "Replays heal-brush clicks and strokes on image files, then optionally\n\
                  adjusts brightness/contrast/saturation and crops.\n\n\
                  Example:\n  \
                  spotheal -i photo.png --heal 120,88 -o fixed.png\n  \
                  spotheal -i scan.jpg --mode continuous --stroke \"40,40 44,41 48,43\" -o out.png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, webp, bmp, tga, tiff.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    // -- brush ----------------------------------------------------------------
    /// Brush preset (JSON). Flags below override individual fields.
    #[arg(long, value_name = "PRESET.json")]
    pub brush: Option<PathBuf>,

    /// Write the effective brush settings to a preset file.
    #[arg(long, value_name = "PRESET.json")]
    pub save_brush: Option<PathBuf>,

    /// Brush diameter in pixels.
    #[arg(long, value_name = "PX")]
    pub size: Option<i32>,

    /// Blend intensity. Values above 1 overshoot the source colour.
    #[arg(long, value_name = "F")]
    pub intensity: Option<f32>,

    /// How far the source search reaches from the target, per axis.
    #[arg(long, value_name = "PX")]
    pub search_radius: Option<i32>,

    /// Fraction of the brush radius that is blended (0–1).
    #[arg(long, value_name = "F")]
    pub affected_area: Option<f32>,

    /// Stored in presets; has no effect on the blend.
    #[arg(long, value_name = "F")]
    pub feathering: Option<f32>,

    /// Brush mode: basic (one heal per press) or continuous (heal while dragging).
    #[arg(long, value_name = "MODE", value_parser = parse_cursor_type)]
    pub mode: Option<CursorType>,

    /// Weight falloff: gaussian or wide.
    #[arg(long, value_name = "KIND", value_parser = parse_falloff)]
    pub falloff: Option<BlendFalloff>,

    /// Minimum pointer travel between continuous heals (0 = every move).
    #[arg(long, value_name = "PX")]
    pub min_spacing: Option<f32>,

    // -- actions ---------------------------------------------------------------
    /// Click to heal at X,Y. Repeatable.
    #[arg(long = "heal", value_name = "X,Y", value_parser = parse_point, allow_hyphen_values = true)]
    pub heals: Vec<Point>,

    /// Drag through space-separated points. Repeatable.
    #[arg(long = "stroke", value_name = "\"X,Y X,Y ...\"", value_parser = parse_stroke, allow_hyphen_values = true)]
    pub strokes: Vec<Stroke>,

    /// Brightness offset (0 = unchanged).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub brightness: f32,

    /// Contrast percent (100 = unchanged).
    #[arg(long, default_value_t = 100.0)]
    pub contrast: f32,

    /// Saturation percent (100 = unchanged).
    #[arg(long, default_value_t = 100.0)]
    pub saturation: f32,

    /// Crop to X,Y,W,H after healing and adjusting.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_crop, allow_hyphen_values = true)]
    pub crop: Option<CropRect>,

    // -- session -----------------------------------------------------------------
    /// Write the session log here instead of the per-user data directory.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Do not write a session log.
    #[arg(long, conflicts_with = "log_file")]
    pub no_log: bool,

    /// Print per-file heal counts and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

// -- value parsers -------------------------------------------------------------

fn parse_i32_list(s: &str, n: usize, what: &str) -> Result<Vec<i32>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != n {
        return Err(format!("expected {}, got '{}'", what, s));
    }
    parts
        .iter()
        .map(|p| p.parse::<i32>().map_err(|_| format!("'{}' is not an integer", p)))
        .collect()
}

pub fn parse_point(s: &str) -> Result<Point, String> {
    let v = parse_i32_list(s, 2, "X,Y")?;
    Ok(Point { x: v[0], y: v[1] })
}

pub fn parse_stroke(s: &str) -> Result<Stroke, String> {
    let points = s
        .split_whitespace()
        .map(parse_point)
        .collect::<Result<Vec<_>, _>>()?;
    if points.is_empty() {
        return Err("a stroke needs at least one X,Y point".to_string());
    }
    Ok(Stroke(points))
}

pub fn parse_crop(s: &str) -> Result<CropRect, String> {
    let v = parse_i32_list(s, 4, "X,Y,W,H")?;
    if v[2] <= 0 || v[3] <= 0 {
        return Err(format!("crop size must be positive, got {}×{}", v[2], v[3]));
    }
    Ok(CropRect { x: v[0], y: v[1], w: v[2] as u32, h: v[3] as u32 })
}

fn parse_cursor_type(s: &str) -> Result<CursorType, String> {
    CursorType::from_name(s).ok_or_else(|| format!("unknown mode '{}' (basic, continuous)", s))
}

fn parse_falloff(s: &str) -> Result<BlendFalloff, String> {
    match s.to_lowercase().as_str() {
        "gaussian" => Ok(BlendFalloff::Gaussian),
        "wide" => Ok(BlendFalloff::Wide),
        _ => Err(format!("unknown falloff '{}' (gaussian, wide)", s)),
    }
}

fn override_with<T>(field: &mut T, flag: Option<T>) {
    if let Some(v) = flag {
        *field = v;
    }
}

impl CliArgs {
    /// Preset (or defaults) with every brush flag applied on top.
    pub fn resolve_brush(&self) -> Result<BrushState, String> {
        let mut brush = match &self.brush {
            Some(path) => load_brush_preset(path)?,
            None => BrushState::default(),
        };
        override_with(&mut brush.cursor_size, self.size);
        override_with(&mut brush.blending_intensity, self.intensity);
        override_with(&mut brush.search_radius, self.search_radius);
        override_with(&mut brush.affected_area, self.affected_area);
        override_with(&mut brush.feathering, self.feathering);
        override_with(&mut brush.cursor_type, self.mode);
        override_with(&mut brush.falloff, self.falloff);
        override_with(&mut brush.min_spacing, self.min_spacing);
        Ok(brush)
    }

    pub fn adjustments(&self) -> AdjustmentParams {
        AdjustmentParams {
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Everything that is the same for every input file.
struct Job<'a> {
    brush: BrushState,
    heals: &'a [Point],
    strokes: &'a [Stroke],
    adjust: AdjustmentParams,
    crop: Option<CropRect>,
    format: SaveFormat,
    quality: u8,
}

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if !args.no_log {
        match &args.log_file {
            Some(path) => crate::logger::init_at(path),
            None => crate::logger::init(),
        };
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir alone to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let brush = match args.resolve_brush() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if brush.radius() <= 0 && (!args.heals.is_empty() || !args.strokes.is_empty()) {
        eprintln!(
            "warning: brush size {} is too small to heal; heal actions will be skipped.",
            brush.cursor_size
        );
    }
    if let Some(path) = &args.save_brush {
        if let Err(e) = save_brush_preset(&brush, path) {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "error: could not create output directory '{}': {}",
                dir.display(), e
            );
            return ExitCode::FAILURE;
        }
    }

    log_info!(
        "CLI run: {} file(s), brush {:?}, {} click(s), {} stroke(s)",
        inputs.len(), brush, args.heals.len(), args.strokes.len()
    );

    let job = Job {
        brush,
        heals: &args.heals,
        strokes: &args.strokes,
        adjust: args.adjustments(),
        crop: args.crop,
        format,
        quality: args.quality,
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &job) {
            Ok(summary) => {
                log_info!(
                    "{} → {}: {} heal(s), {} applied",
                    input_path.display(), output_path.display(), summary.heals, summary.applied
                );
                if args.verbose {
                    println!("  heals: {} ({} applied)", summary.heals, summary.applied);
                }
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

#[derive(Debug, Default, PartialEq, Eq)]
struct RunSummary {
    heals: usize,
    applied: usize,
}

impl RunSummary {
    fn add(&mut self, event: Option<StrokeEvent>) {
        if let Some(ev) = event {
            self.heals += ev.heals;
            self.applied += ev.applied;
        }
    }
}

fn run_one(input: &Path, output: &Path, job: &Job<'_>) -> Result<RunSummary, String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut img = load_image_sync(input).map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Heal ----------------------------------------------------
    let summary = replay(&mut img, &job.brush, job.heals, job.strokes);
    if summary.heals > 0 && summary.applied == 0 {
        log_warn!("{}: no heal found a usable source patch", input.display());
    }

    // -- Step 3: Adjust + crop -------------------------------------------
    apply_adjustments(&mut img, &job.adjust);
    if let Some(r) = job.crop {
        img = crop(&img, r.x, r.y, r.w, r.h)
            .ok_or_else(|| format!("crop {},{},{},{} is outside the image", r.x, r.y, r.w, r.h))?;
    }

    // -- Step 4: Save ----------------------------------------------------
    encode_and_write(&img, output, job.format, job.quality)
        .map_err(|e| format!("save failed: {}", e))?;

    Ok(summary)
}

/// Feed clicks, then strokes, through one heal tool.
fn replay(img: &mut image::RgbaImage, brush: &BrushState, heals: &[Point], strokes: &[Stroke]) -> RunSummary {
    let mut tool = HealTool::new(brush.clone());
    let mut summary = RunSummary::default();

    for p in heals {
        tool.on_pointer_down(img, p.x, p.y);
        summary.add(tool.on_pointer_up());
    }

    for Stroke(points) in strokes {
        let Some((first, rest)) = points.split_first() else { continue };
        tool.on_pointer_down(img, first.x, first.y);
        for p in rest {
            tool.on_pointer_move(img, p.x, p.y);
        }
        summary.add(tool.on_pointer_up());
    }

    summary
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from `--format`, else the output extension,
/// else PNG. An unknown `--format` is an error; an unknown extension falls
/// back to PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<SaveFormat, String> {
    if let Some(f) = format_arg {
        return SaveFormat::from_name(f).ok_or_else(|| format!("unsupported format '{}'", f));
    }
    let from_ext = output
        .and_then(|out| out.extension())
        .and_then(|e| e.to_str())
        .and_then(SaveFormat::from_name);
    Ok(from_ext.unwrap_or_default())
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: `<stem>_healed.<ext>` next to the input
fn build_output_path(
    input:      &Path,
    output:     Option<&Path>,
    output_dir: Option<&Path>,
    format:     SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext  = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_healed.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn points_and_strokes_parse() {
        assert_eq!(parse_point("12, -4"), Ok(Point { x: 12, y: -4 }));
        assert!(parse_point("12").is_err());
        assert!(parse_point("a,b").is_err());

        let s = parse_stroke("1,2  3,4\t5,6").unwrap();
        assert_eq!(s.0.len(), 3);
        assert_eq!(s.0[2], Point { x: 5, y: 6 });
        assert!(parse_stroke("   ").is_err());
        assert!(parse_stroke("1,2 3").is_err());
    }

    #[test]
    fn crop_parse_rejects_empty_sizes() {
        assert_eq!(parse_crop("-2,3,10,20"), Ok(CropRect { x: -2, y: 3, w: 10, h: 20 }));
        assert!(parse_crop("0,0,0,5").is_err());
        assert!(parse_crop("0,0,5").is_err());
    }

    #[test]
    fn flags_override_preset_fields() {
        let args = CliArgs::parse_from([
            "spotheal", "-i", "a.png", "--size", "12", "--mode", "continuous",
            "--intensity", "1.5", "--heal", "3,4", "--heal", "-1,2",
            "--stroke", "1,1 2,2", "--brightness", "-20",
        ]);
        let brush = args.resolve_brush().unwrap();
        assert_eq!(brush.cursor_size, 12);
        assert_eq!(brush.cursor_type, CursorType::Continuous);
        assert_eq!(brush.blending_intensity, 1.5);
        assert_eq!(brush.search_radius, BrushState::default().search_radius);
        assert_eq!(args.heals, vec![Point { x: 3, y: 4 }, Point { x: -1, y: 2 }]);
        assert_eq!(args.strokes.len(), 1);
        assert_eq!(args.adjustments().brightness, -20.0);
    }

    #[test]
    fn format_resolution() {
        assert_eq!(parse_format(Some("JPG"), None), Ok(SaveFormat::Jpeg));
        assert!(parse_format(Some("pfe"), None).is_err());
        assert_eq!(parse_format(None, Some(Path::new("x/out.tif"))), Ok(SaveFormat::Tiff));
        assert_eq!(parse_format(None, Some(Path::new("out.weird"))), Ok(SaveFormat::Png));
        assert_eq!(parse_format(None, None), Ok(SaveFormat::Png));
    }

    #[test]
    fn output_paths() {
        let input = Path::new("shots/cat.jpg");
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), SaveFormat::Png),
            Some(PathBuf::from("out/cat.png"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Jpeg),
            Some(PathBuf::from("shots/cat_healed.jpg"))
        );
        assert_eq!(
            build_output_path(input, Some(Path::new("x.bmp")), None, SaveFormat::Bmp),
            Some(PathBuf::from("x.bmp"))
        );
    }

    #[test]
    fn replay_counts_clicks_and_strokes() {
        let mut img = RgbaImage::from_fn(40, 40, |x, y| Rgba([(x * 6) as u8, (y * 6) as u8, 0, 255]));
        let brush = BrushState {
            cursor_size: 6,
            search_radius: 3,
            cursor_type: CursorType::Continuous,
            ..BrushState::default()
        };
        let heals = [Point { x: 10, y: 10 }, Point { x: -3, y: 0 }];
        let strokes = [Stroke(vec![Point { x: 20, y: 20 }, Point { x: 21, y: 20 }, Point { x: 22, y: 21 }])];
        let summary = replay(&mut img, &brush, &heals, &strokes);
        assert_eq!(summary, RunSummary { heals: 5, applied: 4 });
    }

    #[test]
    fn batch_rejects_single_output_file() {
        let dir = std::env::temp_dir().join(format!("spotheal-batch-{}", std::process::id()));
        let out_dir = dir.join("out");
        std::fs::create_dir_all(&dir).unwrap();
        let (a, b) = (dir.join("a.png"), dir.join("b.png"));
        let single = dir.join("single.png");
        for path in [&a, &b] {
            RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255])).save(path).unwrap();
        }

        let args = CliArgs::parse_from([
            "spotheal", "--no-log", "-i", a.to_str().unwrap(), b.to_str().unwrap(),
            "-o", single.to_str().unwrap(), "--output-dir", out_dir.to_str().unwrap(),
        ]);
        assert_eq!(format!("{:?}", run(args)), format!("{:?}", ExitCode::FAILURE));
        assert!(!single.exists());

        let args = CliArgs::parse_from([
            "spotheal", "--no-log", "-i", a.to_str().unwrap(), b.to_str().unwrap(),
            "--output-dir", out_dir.to_str().unwrap(),
        ]);
        assert_eq!(format!("{:?}", run(args)), format!("{:?}", ExitCode::SUCCESS));
        assert!(out_dir.join("a.png").exists() && out_dir.join("b.png").exists());
    }

    #[test]
    fn end_to_end_heals_and_saves() {
        let dir = std::env::temp_dir().join(format!("spotheal-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.png");
        let output = dir.join("out.png");

        let mut img = RgbaImage::from_pixel(32, 32, Rgba([80, 120, 160, 255]));
        img.put_pixel(16, 16, Rgba([255, 0, 0, 255]));
        img.save(&input).unwrap();

        let args = CliArgs::parse_from([
            "spotheal", "--no-log", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap(),
            "--size", "8", "--search-radius", "6", "--heal", "16,16", "--crop", "8,8,16,16",
        ]);
        assert_eq!(format!("{:?}", run(args)), format!("{:?}", ExitCode::SUCCESS));

        let out = load_image_sync(&output).unwrap();
        assert_eq!(out.dimensions(), (16, 16));
        assert_eq!(out.get_pixel(8, 8).0, [80, 120, 160, 255]);
    }
}
