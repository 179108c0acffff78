//! FrameBridge CLI
//!
//! Command-line interface for exercising the bridge outside a pipeline.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use framebridge::{
    BridgeConfig, ChromaSampling, ColorConverter, ConversionPath, EncoderConfig, FrameBridge,
    PlanarLayout, Resolution, MAX_DECODER_SLOTS,
};

/// Chroma sampling for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Chroma {
    /// Top-left pixel of each 2x2 block
    #[default]
    TopLeft,
    /// Mean of each 2x2 block
    Average,
}

impl From<Chroma> for ChromaSampling {
    fn from(c: Chroma) -> Self {
        match c {
            Chroma::TopLeft => ChromaSampling::TopLeft,
            Chroma::Average => ChromaSampling::BoxAverage,
        }
    }
}

#[derive(Parser)]
#[command(name = "framebridge")]
#[command(about = "H.264 boundary layer - Convert, Encode, Decode")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, slot capacity and backend availability
    Info,

    /// Encode synthetic frames and decode them back through slot 0
    Roundtrip {
        #[arg(long, default_value = "640")]
        width: u32,

        #[arg(long, default_value = "480")]
        height: u32,

        /// Number of frames to push through
        #[arg(short, long, default_value = "30")]
        frames: u32,

        /// Bitrate in bits per second
        #[arg(short, long, default_value = "1000000")]
        bitrate: u32,

        /// Fill color as R,G,B
        #[arg(long, default_value = "255,255,255")]
        color: String,

        /// Chroma sampling (top-left, average)
        #[arg(long, value_enum, default_value = "top-left")]
        chroma: Chroma,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Compare direct and table conversion throughput
    Bench {
        #[arg(long, default_value = "1920")]
        width: u32,

        #[arg(long, default_value = "1080")]
        height: u32,

        #[arg(short, long, default_value = "100")]
        iterations: u32,
    },

    /// Print the default configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("framebridge=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info => cmd_info(),
        Commands::Roundtrip {
            width,
            height,
            frames,
            bitrate,
            color,
            chroma,
            config,
        } => cmd_roundtrip(width, height, frames, bitrate, &color, chroma, config),
        Commands::Bench {
            width,
            height,
            iterations,
        } => cmd_bench(width, height, iterations),
        Commands::Config => cmd_config(),
    }
}

fn cmd_info() -> anyhow::Result<()> {
    println!("FrameBridge System Information");
    println!("==============================\n");

    println!("Version: {}", framebridge::VERSION);
    println!("Decoder slots: {}", MAX_DECODER_SLOTS);
    println!(
        "H.264 backend: {}",
        if framebridge::is_codec_available() {
            "OpenH264"
        } else {
            "None (build with --features openh264)"
        }
    );

    Ok(())
}

fn parse_color(text: &str) -> anyhow::Result<[u8; 3]> {
    let parts = text
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [r, g, b] => Ok([*r, *g, *b]),
        _ => anyhow::bail!("expected R,G,B, got {:?}", text),
    }
}

fn cmd_roundtrip(
    width: u32,
    height: u32,
    frames: u32,
    bitrate: u32,
    color: &str,
    chroma: Chroma,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let [r, g, b] = parse_color(color)?;

    let config = match config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default().with_chroma_sampling(chroma.into()),
    };

    let mut bridge = FrameBridge::new(config)?;
    bridge.try_configure_encoder(EncoderConfig::new(width, height, bitrate))?;
    if !bridge.init_decoder_slot(0) {
        anyhow::bail!("failed to initialize decoder slot 0");
    }

    println!("Configuration:");
    println!("  Resolution: {}", Resolution::new(width, height));
    println!("  Bitrate: {} kbps", bitrate / 1000);
    println!("  Color: {},{},{}", r, g, b);
    println!("  Backend: {}", bridge.backend());
    println!();

    let mut frame = Vec::with_capacity(Resolution::new(width, height).rgba_len());
    for _ in 0..width * height {
        frame.extend_from_slice(&[r, g, b, 255]);
    }

    // Expected luma, from a local conversion of the input
    let layout = PlanarLayout::new(width, height);
    let mut reference = vec![0u8; layout.total_len()];
    bridge
        .converter()
        .rgba_to_i420(&frame, Resolution::new(width, height), &mut reference)?;

    let mut decoded = vec![0u8; layout.total_len()];
    let mut max_luma_error = 0i32;
    let mut decoded_frames = 0u32;
    let start = Instant::now();

    for i in 0..frames {
        if i > 0 && i % 10 == 0 {
            bridge.request_key_frame();
        }
        let bitstream = bridge.encode_packed(&frame, width, height).to_vec();
        let info = bridge.decode_to_planar_into(0, &bitstream, &mut decoded);
        if info.is_empty() {
            continue;
        }
        decoded_frames += 1;

        let err = reference[..layout.y_len()]
            .iter()
            .zip(&decoded[..layout.y_len()])
            .map(|(&a, &b)| (a as i32 - b as i32).abs())
            .max()
            .unwrap_or(0);
        max_luma_error = max_luma_error.max(err);
    }

    let elapsed = start.elapsed();
    let stats = bridge.stats();

    println!("Results:");
    println!("  Frames encoded: {}", stats.encoder.frames_encoded);
    println!("  Key frames: {}", stats.encoder.key_frames);
    println!("  Frames decoded: {}", decoded_frames);
    println!("  Avg frame size: {:.0} bytes", stats.encoder.avg_frame_bytes());
    println!("  Max luma error: {}", max_luma_error);
    println!(
        "  ms/frame: {:.2}",
        elapsed.as_secs_f64() * 1000.0 / frames.max(1) as f64
    );
    println!("\nBuffers:");
    println!("  Planar capacity: {} bytes", stats.planar_capacity);
    println!("  Bitstream capacity: {} bytes", stats.bitstream_capacity);

    Ok(())
}

fn cmd_bench(width: u32, height: u32, iterations: u32) -> anyhow::Result<()> {
    println!("FrameBridge Conversion Benchmark");
    println!("================================\n");

    let res = Resolution::new(width, height);
    let layout = PlanarLayout::new(width, height);
    println!("Resolution: {}", res);
    println!("Iterations: {}", iterations);
    println!();

    let rgba: Vec<u8> = (0..res.rgba_len()).map(|i| (i * 7 % 251) as u8).collect();
    let mut planar = vec![0u8; layout.total_len()];
    let mut packed = vec![0u8; res.rgba_len()];

    for path in [ConversionPath::Direct, ConversionPath::Table] {
        let config = BridgeConfig::default().with_conversion_path(path).conversion;
        let converter = ColorConverter::new(config);

        let start = Instant::now();
        for _ in 0..iterations {
            converter.rgba_to_i420(&rgba, res, &mut planar)?;
        }
        let forward = start.elapsed();

        let picture = layout.view(&planar)?;
        let start = Instant::now();
        for _ in 0..iterations {
            converter.i420_to_rgba(&picture, &mut packed)?;
        }
        let backward = start.elapsed();

        println!("{:?}:", path);
        println!(
            "  RGBA -> I420: {:.3} ms/frame",
            forward.as_secs_f64() * 1000.0 / iterations.max(1) as f64
        );
        println!(
            "  I420 -> RGBA: {:.3} ms/frame",
            backward.as_secs_f64() * 1000.0 / iterations.max(1) as f64
        );
    }

    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    print!("{}", BridgeConfig::default().to_toml_string()?);
    Ok(())
}
