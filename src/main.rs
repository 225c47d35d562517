use anyhow::Context;
use clap::{Parser, Subcommand};
use enviconv::{read_envi_header, ConversionParams, RasterConverter, WidenStrategy};
use env_logger::{Builder, Env};
use std::path::PathBuf;

/// Convert 64-bit integer ENVI rasters to float rasters
#[derive(Parser, Debug)]
#[command(name = "enviconv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert int64 ENVI rasters to Float32 GeoTIFF or float64 ENVI", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rescale to a Float32 GeoTIFF
    Tiff {
        /// Source pixel file (.bsq) with a .hdr sidecar
        source: PathBuf,

        /// Output GeoTIFF
        target: PathBuf,

        /// EPSG code of the output spatial reference
        #[arg(long, default_value_t = ConversionParams::default().epsg)]
        epsg: u32,

        /// Rotate the geotransform by this many degrees
        #[arg(long)]
        rotate: Option<f64>,

        /// Raw values are divided by this
        #[arg(long, default_value_t = ConversionParams::default().scale_divisor)]
        divisor: f64,

        /// Added after division
        #[arg(long, default_value_t = ConversionParams::default().scale_offset, allow_hyphen_values = true)]
        offset: f64,
    },

    /// Duplicate as a float64 ENVI raster next to the source
    Envi {
        /// Source pixel file (.bsq) with a .hdr sidecar
        source: PathBuf,

        /// Suffix for the duplicated pair
        #[arg(long, default_value_t = ConversionParams::default().tag)]
        tag: String,

        /// auto, buffered or mmap
        #[arg(long, default_value = "auto")]
        strategy: WidenStrategy,
    },

    /// Print the header geometry and geotransform
    Info {
        source: PathBuf,
    },

    /// Print the geotransform rotated by DEGREES
    Rotate {
        source: PathBuf,

        #[arg(allow_hyphen_values = true)]
        degrees: f64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    Builder::from_env(Env::default().default_filter_or(cli.log_level.as_str())).init();

    match cli.command {
        Commands::Tiff {
            source,
            target,
            epsg,
            rotate,
            divisor,
            offset,
        } => {
            let params = ConversionParams {
                epsg,
                rotation_degrees: rotate,
                scale_divisor: divisor,
                scale_offset: offset,
                ..ConversionParams::default()
            };
            let written = RasterConverter::new(params)
                .to_geotiff(&source, &target)
                .with_context(|| format!("Failed to convert {:?} to GeoTIFF", source))?;
            println!("{}", written.display());
        }
        Commands::Envi { source, tag, strategy } => {
            let params = ConversionParams {
                tag,
                widen_strategy: strategy,
                ..ConversionParams::default()
            };
            let written = RasterConverter::new(params)
                .to_envi_float64(&source)
                .with_context(|| format!("Failed to convert {:?} to float64 ENVI", source))?;
            println!("{}", written.display());
        }
        Commands::Info { source } => {
            let header = read_envi_header(&source)
                .with_context(|| format!("Failed to read header of {:?}", source))?;
            println!("columns: {}", header.columns);
            println!("rows: {}", header.rows);
            println!("bands: {}", header.bands);
            println!("data type: {:?}", header.data_type);
            println!("byte order: {}", header.byte_order);
            println!("geotransform: {:?}", header.geo_transform.to_array());
        }
        Commands::Rotate { source, degrees } => {
            let header = read_envi_header(&source)
                .with_context(|| format!("Failed to read header of {:?}", source))?;
            println!("{:?}", header.geo_transform.rotated(degrees).to_array());
        }
    }

    Ok(())
}
