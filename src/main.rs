use clap::Parser;
use log::{debug, info};
use splicemap::pipeline::{map_reads, MappingParams, SpliceStrand};
use splicemap::process::SystemRunner;
use splicemap::tools::{check_tools, ToolPaths};
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// minimap2 executable (overrides MINIMAP2_PATH)
    #[clap(long, value_parser)]
    minimap2_path: Option<String>,

    /// samtools executable (overrides SAMTOOLS_PATH)
    #[clap(long, value_parser)]
    samtools_path: Option<String>,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

/// Map long reads to a reference with minimap2 and produce a sorted, indexed BAM.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Align reads, then convert, sort and index the alignments
    Map {
        #[clap(flatten)]
        common: CommonOpts,

        /// Reads to map (FASTQ/FASTA, optionally gzipped)
        #[clap(short = 'r', long, value_parser)]
        reads: PathBuf,

        /// Reference genome (FASTA or minimap2 index)
        #[clap(short = 'g', long, value_parser)]
        reference: PathBuf,

        /// Output path for the sorted BAM; the index is written next to it
        #[clap(short = 'o', long, value_parser)]
        output: PathBuf,

        /// Number of threads for minimap2 and samtools sort
        #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::MIN)]
        threads: NonZeroUsize,

        /// Minimizer k-mer length
        #[clap(short = 'k', long, value_parser, default_value_t = 14)]
        kmer_size: u32,

        /// Minimizer window size
        #[clap(short = 'w', long, value_parser, default_value_t = 5)]
        window_size: u32,

        /// Disable the splice flank assumption (--splice-flank=no)
        #[clap(long, action)]
        no_splice_flank: bool,

        /// Penalty for non-canonical splicing
        #[clap(long, value_parser, default_value_t = 9)]
        noncanon_pen: u32,

        /// Strand to look for canonical splice sites on
        #[clap(long, value_enum, default_value_t = SpliceStrand::Forward)]
        canon_splice_strand: SpliceStrand,

        /// BED12 file of known junctions
        #[clap(long, value_parser)]
        junc_bed: Option<PathBuf>,

        /// Score bonus for junctions in --junc-bed
        #[clap(long, value_parser, default_value_t = 12)]
        junc_bonus: u32,

        /// Maximum intron size
        #[clap(short = 'G', long, value_parser, default_value_t = 100_000)]
        max_intron_size: u64,

        /// Ends of spliced alignments must have seeds longer than this
        #[clap(long, value_parser, default_value_t = 12)]
        end_seed_pen: u32,

        /// Directory for intermediate SAM/BAM files
        #[clap(long, value_parser)]
        temp_dir: Option<PathBuf>,
    },
    /// Check that minimap2 and samtools can be launched
    Check {
        #[clap(flatten)]
        common: CommonOpts,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> io::Result<()> {
    match args {
        Args::Map {
            common,
            reads,
            reference,
            output,
            threads,
            kmer_size,
            window_size,
            no_splice_flank,
            noncanon_pen,
            canon_splice_strand,
            junc_bed,
            junc_bonus,
            max_intron_size,
            end_seed_pen,
            temp_dir,
        } => {
            let tools = initialize_tools(&common)?;

            if let Some(ref temp_path) = temp_dir {
                if !temp_path.is_dir() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("Temporary directory '{}' does not exist", temp_path.display()),
                    ));
                }
            }

            let params = MappingParams {
                threads,
                kmer_size,
                window_size,
                splice_flank: !no_splice_flank,
                noncanon_pen,
                canon_splice_strand,
                junc_bed,
                junc_bonus,
                max_intron_size,
                end_seed_pen,
                temp_dir,
            };
            info!(
                "Mapping {} to {} with {} threads",
                reads.display(),
                reference.display(),
                params.threads
            );

            let report = map_reads(&reads, &reference, &output, &params, &tools, &SystemRunner)?;
            for stage in &report.stages {
                if !stage.stderr.is_empty() {
                    debug!("{} stderr:\n{}", stage.stage, stage.stderr);
                }
            }
            info!("Wrote {}", output.display());
        }
        Args::Check { common } => {
            initialize_tools(&common)?;
            println!("minimap2 and samtools are available");
        }
    }

    Ok(())
}

/// Initialize logging and resolve and check the external tools
fn initialize_tools(common: &CommonOpts) -> io::Result<ToolPaths> {
    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let mut tools = ToolPaths::from_env();
    if let Some(path) = &common.minimap2_path {
        tools.minimap2 = path.clone();
    }
    if let Some(path) = &common.samtools_path {
        tools.samtools = path.clone();
    }

    check_tools(&tools, &SystemRunner)?;
    Ok(tools)
}
