// Spliced read mapping: minimap2 -> samtools view -> samtools sort -> samtools index
//
// Stages run one after another; each reads the file the previous one wrote.
// Intermediates live in scoped temp files and are gone on every exit path.

use crate::error::MapError;
use crate::process::{CommandSpec, ProcessRunner, StdoutSink};
use crate::tools::ToolPaths;
use log::{debug, info};
use std::fmt;
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

pub const ALIGN_STAGE: &str = "minimap2";
pub const CONVERT_STAGE: &str = "samtools view";
pub const SORT_STAGE: &str = "samtools sort";
pub const INDEX_STAGE: &str = "samtools index";

/// Which strand canonical splice sites are looked for on (minimap2 `-u`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SpliceStrand {
    /// Transcript strand only
    #[default]
    #[value(alias = "f")]
    Forward,
    /// Either strand
    #[value(alias = "b")]
    Both,
    /// Don't match GT-AG
    #[value(aliases = ["n", "none"])]
    Ignore,
}

impl SpliceStrand {
    pub fn code(self) -> char {
        match self {
            SpliceStrand::Forward => 'f',
            SpliceStrand::Both => 'b',
            SpliceStrand::Ignore => 'n',
        }
    }
}

impl fmt::Display for SpliceStrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for SpliceStrand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "f" | "forward" => Ok(SpliceStrand::Forward),
            "b" | "both" => Ok(SpliceStrand::Both),
            "n" | "ignore" | "none" => Ok(SpliceStrand::Ignore),
            _ => Err(format!(
                "Invalid canonical splice strand '{s}' (expected one of f, b, n)"
            )),
        }
    }
}

/// Tunables for one mapping job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingParams {
    /// Threads for minimap2 and samtools sort
    pub threads: NonZeroUsize,
    /// Minimizer k-mer (seed) length
    pub kmer_size: u32,
    /// Minimizer window size
    pub window_size: u32,
    /// Assume the next base after GT donors is A/G and the base before AG acceptors is C/T
    pub splice_flank: bool,
    /// Penalty for non-canonical splicing
    pub noncanon_pen: u32,
    pub canon_splice_strand: SpliceStrand,
    /// BED12 of known junctions; `junc_bonus` is only passed alongside it
    pub junc_bed: Option<PathBuf>,
    pub junc_bonus: u32,
    pub max_intron_size: u64,
    pub end_seed_pen: u32,
    /// Directory for the intermediate SAM/BAM files (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for MappingParams {
    fn default() -> Self {
        MappingParams {
            threads: NonZeroUsize::MIN,
            kmer_size: 14,
            window_size: 5,
            splice_flank: true,
            noncanon_pen: 9,
            canon_splice_strand: SpliceStrand::Forward,
            junc_bed: None,
            junc_bonus: 12,
            max_intron_size: 100_000,
            end_seed_pen: 12,
            temp_dir: None,
        }
    }
}

/// Diagnostics left by one stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub command: CommandSpec,
    /// Trimmed standard error of the stage
    pub stderr: String,
}

/// Per-stage diagnostics of a successful run, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingReport {
    pub stages: Vec<StageReport>,
}

impl MappingReport {
    pub fn stderr_of(&self, stage: &str) -> Option<&str> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.stderr.as_str())
    }
}

struct Stage {
    name: &'static str,
    command: CommandSpec,
    stdout: StdoutSink,
}

impl Stage {
    fn run(self, runner: &dyn ProcessRunner) -> Result<StageReport, MapError> {
        debug!("cmd: {}", self.command);
        // Create the destination before launching so an unwritable path is an
        // I/O error rather than a launch failure
        if let StdoutSink::File(path) = &self.stdout {
            File::create(path).map_err(|e| MapError::io(e, path))?;
        }
        let output = runner
            .run(&self.command, &self.stdout)
            .map_err(|source| MapError::Spawn {
                stage: self.name.to_string(),
                program: self.command.program.clone(),
                source,
            })?;

        if !output.success() {
            return Err(MapError::StageFailed {
                stage: self.name.to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }

        Ok(StageReport {
            stage: self.name,
            command: self.command,
            stderr: output.stderr,
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Build the spliced-alignment command line.
pub fn minimap2_command(
    tools: &ToolPaths,
    params: &MappingParams,
    reference: &Path,
    reads: &Path,
) -> CommandSpec {
    let splice_flank = if params.splice_flank { "yes" } else { "no" };
    let mut cmd = CommandSpec::new(&tools.minimap2).args([
        format!("-t{}", params.threads),
        "-a".to_string(),
        "-x".to_string(),
        "splice".to_string(),
        "-L".to_string(),
        "--cs=long".to_string(),
        format!("-k{}", params.kmer_size),
        format!("-w{}", params.window_size),
        format!("-G{}", params.max_intron_size),
        format!("-C{}", params.noncanon_pen),
        format!("--splice-flank={splice_flank}"),
        format!("-u{}", params.canon_splice_strand.code()),
        format!("--end-seed-pen={}", params.end_seed_pen),
    ]);
    if let Some(junc_bed) = &params.junc_bed {
        cmd = cmd
            .arg("--junc-bed")
            .arg(path_arg(junc_bed))
            .arg(format!("--junc-bonus={}", params.junc_bonus));
    }
    cmd.arg(path_arg(reference)).arg(path_arg(reads))
}

pub fn samtools_view_command(tools: &ToolPaths, sam: &Path) -> CommandSpec {
    CommandSpec::new(&tools.samtools).args([
        "view".to_string(),
        "-bS".to_string(),
        path_arg(sam),
    ])
}

pub fn samtools_sort_command(
    tools: &ToolPaths,
    threads: NonZeroUsize,
    bam: &Path,
) -> CommandSpec {
    CommandSpec::new(&tools.samtools).args([
        "sort".to_string(),
        "-@".to_string(),
        threads.to_string(),
        "-o".to_string(),
        "-".to_string(),
        path_arg(bam),
    ])
}

pub fn samtools_index_command(tools: &ToolPaths, bam: &Path) -> CommandSpec {
    CommandSpec::new(&tools.samtools).args(["index".to_string(), path_arg(bam)])
}

fn require_input(role: &'static str, path: &Path) -> Result<(), MapError> {
    if path.exists() {
        Ok(())
    } else {
        Err(MapError::MissingInput {
            role,
            path: path.to_path_buf(),
        })
    }
}

fn create_temp(params: &MappingParams, suffix: &str) -> Result<NamedTempFile, MapError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("splicemap.").suffix(suffix);
    match &params.temp_dir {
        Some(dir) => builder.tempfile_in(dir).map_err(|e| MapError::io(e, dir)),
        None => builder
            .tempfile()
            .map_err(|e| MapError::io(e, std::env::temp_dir())),
    }
}

fn remove_temp(file: NamedTempFile) -> Result<(), MapError> {
    let path = file.path().to_path_buf();
    debug!("Removing {}", path.display());
    file.close().map_err(|e| MapError::io(e, path))
}

/// Map `reads` against `reference` and leave a coordinate-sorted, indexed
/// BAM at `output` (index written by samtools next to it).
///
/// Both inputs are checked before anything is launched. The first stage to
/// exit nonzero aborts the run with its stderr in the error.
pub fn map_reads(
    reads: &Path,
    reference: &Path,
    output: &Path,
    params: &MappingParams,
    tools: &ToolPaths,
    runner: &dyn ProcessRunner,
) -> Result<MappingReport, MapError> {
    require_input("reads", reads)?;
    require_input("reference", reference)?;
    if let Some(junc_bed) = &params.junc_bed {
        require_input("junction annotation", junc_bed)?;
    }

    let sam = create_temp(params, ".sam")?;
    let bam = create_temp(params, ".bam")?;
    let mut report = MappingReport::default();

    info!("Running minimap2");
    report.stages.push(
        Stage {
            name: ALIGN_STAGE,
            command: minimap2_command(tools, params, reference, reads),
            stdout: StdoutSink::File(sam.path().to_path_buf()),
        }
        .run(runner)?,
    );
    info!("Mapping complete");

    info!("Converting alignments to BAM");
    report.stages.push(
        Stage {
            name: CONVERT_STAGE,
            command: samtools_view_command(tools, sam.path()),
            stdout: StdoutSink::File(bam.path().to_path_buf()),
        }
        .run(runner)?,
    );
    remove_temp(sam)?;

    info!("Sorting alignments into {}", output.display());
    report.stages.push(
        Stage {
            name: SORT_STAGE,
            command: samtools_sort_command(tools, params.threads, bam.path()),
            stdout: StdoutSink::File(output.to_path_buf()),
        }
        .run(runner)?,
    );
    remove_temp(bam)?;

    info!("Indexing {}", output.display());
    report.stages.push(
        Stage {
            name: INDEX_STAGE,
            command: samtools_index_command(tools, output),
            stdout: StdoutSink::Discard,
        }
        .run(runner)?,
    );

    Ok(report)
}
