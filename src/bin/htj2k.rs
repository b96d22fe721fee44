//! htj2k CLI - inspect and generate HTJ2K codestream headers.
//!
//! Also exposes a one-level lifting round-trip as a diagnostic for the
//! wavelet kernels.

use clap::{ArgAction, Parser, Subcommand};
use htj2k_core::params::{Comment, Point, ProgressionOrder, Size, Sot, Tlm};
use htj2k_core::transform::{self, LineBuf, SampleType};
use htj2k_core::{Codestream, MarkerCode, StreamReader, StreamWriter};
use log::{Level, LevelFilter, Metadata, Record};
use std::fs;
use std::path::PathBuf;

/// HTJ2K codestream header tool
#[derive(Parser)]
#[command(name = "htj2k")]
#[command(version)]
#[command(about = "Inspect and generate HTJ2K codestream headers", long_about = None)]
#[command(after_help = "EXAMPLES:
    htj2k info -i image.j2c
    htj2k header -o empty.j2c -w 512 -H 512 -d 5 --reversible
    htj2k dwt --samples 10,20,30,40,50 --odd")]
struct Cli {
    /// Log verbosity: -v for notices, -vv for debug output
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a codestream main header and print its parameters
    #[command(visible_alias = "i")]
    Info {
        #[arg(short, long, help = "Path to the codestream file to inspect")]
        input: PathBuf,

        /// Also walk the tile-parts that follow the main header
        #[arg(short, long)]
        extended: bool,

        /// Skip damaged tile-parts instead of stopping at the first error
        #[arg(long)]
        resilient: bool,
    },

    /// Write a main header followed by one empty tile-part per tile
    #[command(visible_alias = "h")]
    Header {
        #[arg(short, long, help = "Path for the generated codestream")]
        output: PathBuf,

        /// Image width in pixels
        #[arg(short, long)]
        width: u32,

        /// Image height in pixels
        #[arg(short = 'H', long)]
        height: u32,

        /// Number of components
        #[arg(short = 'n', long, default_value = "1")]
        components: u16,

        /// Bits per sample
        #[arg(short, long, default_value = "8")]
        bit_depth: u32,

        /// Samples are signed
        #[arg(long)]
        signed: bool,

        /// Number of wavelet decompositions
        #[arg(short, long, default_value = "5")]
        decompositions: u32,

        /// Use the reversible 5/3 kernel instead of the irreversible 9/7
        #[arg(short, long)]
        reversible: bool,

        /// Apply the colour transform to the first three components
        #[arg(long)]
        color_transform: bool,

        /// Progression order: LRCP, RLCP, RPCL, PCRL or CPRL
        #[arg(short, long, default_value = "RPCL")]
        progression: ProgressionOrder,

        /// Code-block width
        #[arg(long, default_value = "64")]
        block_width: u32,

        /// Code-block height
        #[arg(long, default_value = "64")]
        block_height: u32,

        /// Tile width and height, e.g. 256x256; one tile when omitted
        #[arg(short, long, value_parser = parse_size)]
        tile: Option<Size>,

        /// Base quantization step size for irreversible coding
        #[arg(long)]
        qstep: Option<f32>,

        /// Add a TLM segment listing the tile-parts
        #[arg(long)]
        tlm: bool,

        /// Text comment to embed in the main header
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Run one level of horizontal analysis and synthesis over a line
    Dwt {
        /// Comma-separated samples
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        samples: Vec<f64>,

        /// Use the irreversible 9/7 kernel on float samples
        #[arg(short, long)]
        float: bool,

        /// The line starts on an odd coordinate
        #[arg(long)]
        odd: bool,
    },
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let tag = match record.level() {
                Level::Error => "error",
                Level::Warn => "warning",
                Level::Info => "info",
                Level::Debug | Level::Trace => "debug",
            };
            eprintln!("[{}] {}", tag, record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    let cli = Cli::parse();

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        });
    }

    let result = match cli.command {
        Commands::Info {
            input,
            extended,
            resilient,
        } => show_info(&input, extended, resilient),
        Commands::Header {
            output,
            width,
            height,
            components,
            bit_depth,
            signed,
            decompositions,
            reversible,
            color_transform,
            progression,
            block_width,
            block_height,
            tile,
            qstep,
            tlm,
            comment,
        } => {
            let options = HeaderOptions {
                width,
                height,
                components,
                bit_depth,
                signed,
                decompositions,
                reversible,
                color_transform,
                progression,
                block: Size::new(block_width, block_height),
                tile,
                qstep,
                tlm,
                comment,
            };
            write_header(&output, &options)
        }
        Commands::Dwt {
            samples,
            float,
            odd,
        } => run_dwt(&samples, float, !odd),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_size(text: &str) -> Result<Size, String> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok(Size::new(w, h))
}

fn show_info(
    input: &PathBuf,
    extended: bool,
    resilient: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();

    let mut codestream = Codestream::new();
    let mut reader = StreamReader::new(&data);
    codestream.read_headers(&mut reader)?;

    let siz = codestream.siz();
    let cod = codestream.cod();
    let qcd = codestream.qcd();
    println!("Format: HTJ2K codestream");
    println!(
        "  Dimensions: {}x{} at offset ({}, {})",
        siz.image_extent().x.saturating_sub(siz.image_offset().x),
        siz.image_extent().y.saturating_sub(siz.image_offset().y),
        siz.image_offset().x,
        siz.image_offset().y
    );
    let tiles = siz.num_tiles();
    println!(
        "  Tile size:  {}x{} ({} tiles)",
        siz.tile_size().w,
        siz.tile_size().h,
        u64::from(tiles.w) * u64::from(tiles.h)
    );
    println!("  Rsiz:       0x{:04X}", siz.rsiz());
    println!("  Components: {}", siz.num_components());
    for c in 0..siz.num_components() {
        let sub = siz.downsampling(c);
        println!(
            "    [{}] {}x{}, {} bits {}, subsampling {}x{}",
            c,
            siz.width(c),
            siz.height(c),
            siz.bit_depth(c),
            if siz.is_signed(c) { "signed" } else { "unsigned" },
            sub.x,
            sub.y
        );
    }

    println!("  Progression: {}", cod.progression_order());
    println!("  Layers:      {}", cod.num_layers());
    println!(
        "  Colour transform: {}",
        if cod.is_using_color_transform() { "yes" } else { "no" }
    );
    println!("  DWT levels:  {}", cod.num_decompositions());
    let style = cod.main();
    let block = style.block_dims();
    println!("  Code-block:  {}x{}", block.w, block.h);
    match style.kernel() {
        Some(kernel) => println!(
            "  Kernel:      {} ({} steps, {})",
            kernel.index(),
            kernel.num_steps(),
            if kernel.is_reversible() { "reversible" } else { "irreversible" }
        ),
        None => println!("  Kernel:      {}", style.wavelet_kernel()),
    }
    for (comp, style) in cod.overrides() {
        println!(
            "    COC[{}] {} levels, kernel {}",
            comp,
            cod.component_num_decompositions(comp),
            style.wavelet_kernel()
        );
    }

    let quant = qcd.main();
    println!(
        "  Quantization: {}, {} guard bits, {} subbands",
        if quant.is_reversible() { "reversible" } else { "irreversible" },
        quant.num_guard_bits(),
        quant.num_subbands()
    );
    println!("  Kmax:        {}", quant.largest_kmax());
    for (comp, _) in qcd.overrides() {
        println!("    QCC[{}]", comp);
    }
    println!("  CAP Ccap15:  0x{:04X}", codestream.cap().part15());

    for kernel in codestream.atk().custom_kernels() {
        println!(
            "  ATK[{}]: {} steps, K = {}",
            kernel.index(),
            kernel.num_steps(),
            kernel.k()
        );
    }
    for record in codestream.dfs().iter() {
        println!("  DFS[{}]: {} levels", record.index(), record.num_levels());
    }
    for comment in codestream.comments() {
        match comment.as_text() {
            Some(text) => println!("  Comment:     {}", text),
            None => println!("  Comment:     {} binary bytes", comment.data().len()),
        }
    }

    if extended {
        println!();
        let mut count = 0;
        while let Some(part) = codestream.read_tile_part(&mut reader, resilient)? {
            if part.intact {
                println!(
                    "  Tile {} part {}/{}: {} bytes",
                    part.sot.tile_index(),
                    part.sot.tile_part_index(),
                    part.sot.num_tile_parts(),
                    part.data.len()
                );
            } else {
                println!("  Damaged tile-part skipped");
            }
            count += 1;
        }
        println!("  {} tile-parts", count);
    }
    Ok(())
}

struct HeaderOptions {
    width: u32,
    height: u32,
    components: u16,
    bit_depth: u32,
    signed: bool,
    decompositions: u32,
    reversible: bool,
    color_transform: bool,
    progression: ProgressionOrder,
    block: Size,
    tile: Option<Size>,
    qstep: Option<f32>,
    tlm: bool,
    comment: Option<String>,
}

fn write_header(output: &PathBuf, options: &HeaderOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut codestream = Codestream::new();

    let siz = codestream.siz_mut();
    siz.set_image_extent(Point::new(options.width, options.height));
    if let Some(tile) = options.tile {
        siz.set_tile_size(tile);
    }
    siz.set_num_components(options.components)?;
    for c in 0..options.components {
        siz.set_component(c, Point::new(1, 1), options.bit_depth, options.signed)?;
    }

    let cod = codestream.cod_mut();
    cod.set_num_decompositions(options.decompositions)?;
    cod.set_block_dims(options.block.w, options.block.h)?;
    cod.set_reversible(options.reversible);
    cod.set_color_transform(options.color_transform);
    cod.set_progression_order(options.progression);

    if let Some(step) = options.qstep {
        codestream.qcd_mut().set_delta(step)?;
    }

    let comments = match &options.comment {
        Some(text) => vec![Comment::text(text)?],
        None => Vec::new(),
    };

    let mut writer = StreamWriter::new();
    codestream.write_headers(&mut writer, &comments)?;

    let tiles = codestream.siz().num_tiles();
    let count = u64::from(tiles.w) * u64::from(tiles.h);
    let num_tiles = u16::try_from(count)
        .map_err(|_| format!("{count} tiles do not fit in 16-bit tile indices"))?;
    if options.tlm {
        let mut tlm = Tlm::new(usize::from(num_tiles))?;
        for t in 0..num_tiles {
            tlm.set_next_pair(t, 0)?;
        }
        tlm.write(&mut writer)?;
    }
    for t in 0..num_tiles {
        Sot::new(t, 0, 1).write(&mut writer, 0);
        writer.write_marker(MarkerCode::StartOfData);
    }
    writer.write_marker(MarkerCode::EndOfCodestream);

    let bytes = writer.into_bytes();
    fs::write(output, &bytes)?;
    println!(
        "✓ Wrote {}x{} header ({} components, {} tiles, {} bytes) to {:?}",
        options.width,
        options.height,
        options.components,
        num_tiles,
        bytes.len(),
        output
    );
    Ok(())
}

fn run_dwt(samples: &[f64], float: bool, even: bool) -> Result<(), Box<dyn std::error::Error>> {
    let width = samples.len();
    let l_width = (width + usize::from(even)) / 2;
    let h_width = (width + usize::from(!even)) / 2;

    if float {
        let kernel = htj2k_core::params::Kernel::irv97();
        let values: Vec<f32> = samples.iter().map(|&s| s as f32).collect();
        let src = LineBuf::from_slice(&values);
        let mut low = LineBuf::new(SampleType::F32, l_width);
        let mut high = LineBuf::new(SampleType::F32, h_width);
        transform::horz_ana(&kernel, &mut low, &mut high, &src, width, even)?;
        println!("L: {:?}", low.payload::<f32>().unwrap_or_default());
        println!("H: {:?}", high.payload::<f32>().unwrap_or_default());

        let mut out = LineBuf::new(SampleType::F32, width);
        transform::horz_syn(&kernel, &mut out, &mut low, &mut high, width, even)?;
        let out = out.payload::<f32>().unwrap_or_default();
        let max_err = values
            .iter()
            .zip(out)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        println!("Reconstructed: {:?} (max error {:e})", out, max_err);
    } else {
        let kernel = htj2k_core::params::Kernel::rev53();
        let values: Vec<i64> = samples.iter().map(|&s| s.round() as i64).collect();
        let src = LineBuf::from_slice(&values);
        let mut low = LineBuf::new(SampleType::I64, l_width);
        let mut high = LineBuf::new(SampleType::I64, h_width);
        transform::horz_ana(&kernel, &mut low, &mut high, &src, width, even)?;
        println!("L: {:?}", low.payload::<i64>().unwrap_or_default());
        println!("H: {:?}", high.payload::<i64>().unwrap_or_default());

        let mut out = LineBuf::new(SampleType::I64, width);
        transform::horz_syn(&kernel, &mut out, &mut low, &mut high, width, even)?;
        let out = out.payload::<i64>().unwrap_or_default();
        println!(
            "Reconstructed: {:?} ({})",
            out,
            if out == values.as_slice() { "exact" } else { "MISMATCH" }
        );
    }
    Ok(())
}
