//! # CLI Module
//!
//! Command implementations for the seisresp binary.
//!
//! Each `cmd_*` function is one subcommand. They are plain functions over
//! file paths and argument structs so integration tests can drive them
//! without spawning a process.

use crate::config::EvalConfig;
use clap::{Args, ValueEnum};
use seisresp_core::{
    AmplitudeScale, AssembledResponse, Cascade, CascadeOptions, CascadeWarning, ChannelId,
    FrequencyGrid, GroundMotion, OutputFormat, PhaseUnit, Response, ResponseError, Spacing, Stage,
    UnitTable, assemble, evaluate_batch,
};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors surfaced by the CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode JSON: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Sweep spacing on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpacingArg {
    Lin,
    Log,
}

impl From<SpacingArg> for Spacing {
    fn from(arg: SpacingArg) -> Self {
        match arg {
            SpacingArg::Lin => Self::Linear,
            SpacingArg::Log => Self::Logarithmic,
        }
    }
}

/// Output representation on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    AmpPhase,
    RealImag,
}

/// Target ground motion on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitsArg {
    Dis,
    Vel,
    Acc,
}

impl From<UnitsArg> for GroundMotion {
    fn from(arg: UnitsArg) -> Self {
        match arg {
            UnitsArg::Dis => Self::Displacement,
            UnitsArg::Vel => Self::Velocity,
            UnitsArg::Acc => Self::Acceleration,
        }
    }
}

/// Frequency selection. Unset fields fall back to the config grid.
#[derive(Debug, Clone, Default, Args)]
pub struct GridArgs {
    /// First frequency of the sweep (Hz)
    #[arg(long)]
    pub start: Option<f64>,

    /// Last frequency of the sweep (Hz)
    #[arg(long)]
    pub stop: Option<f64>,

    /// Number of sweep points
    #[arg(long)]
    pub points: Option<usize>,

    /// Sweep spacing
    #[arg(long, value_enum)]
    pub spacing: Option<SpacingArg>,

    /// Explicit comma-separated frequencies (Hz)
    #[arg(
        long,
        value_delimiter = ',',
        conflicts_with_all = ["start", "stop", "points", "spacing"]
    )]
    pub freqs: Option<Vec<f64>>,
}

/// Output selection. Unset fields fall back to the config format.
#[derive(Debug, Clone, Default, Args)]
pub struct OutputArgs {
    /// Output representation
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Amplitude in decibels
    #[arg(long)]
    pub db: bool,

    /// Phase in radians instead of degrees
    #[arg(long)]
    pub radians: bool,

    /// Remove 2π jumps from the phase
    #[arg(long)]
    pub unwrap: bool,

    /// Emit JSON instead of a text table
    #[arg(long)]
    pub json: bool,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments of `seisresp eval`.
#[derive(Debug, Clone, Default, Args)]
pub struct EvalArgs {
    /// Response JSON file (one response or an array)
    #[arg(short, long)]
    pub response: PathBuf,

    /// Eval config JSON file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Re-express the response against this ground motion (SI units)
    #[arg(long, value_enum)]
    pub units: Option<UnitsArg>,
}

// =============================================================================
// LOADING
// =============================================================================

/// Load a response file holding either one response or an array of them.
pub fn load_responses(path: &Path) -> Result<Vec<Response>, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let responses = if content.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<Response>>(&content).map_err(parse_error)?
    } else {
        vec![serde_json::from_str::<Response>(&content).map_err(parse_error)?]
    };
    if responses.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "{} contains no responses",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), count = responses.len(), "loaded responses");
    Ok(responses)
}

/// Resolve the frequency grid from flags over the configured default.
pub fn build_grid(args: &GridArgs, default: &FrequencyGrid) -> Result<FrequencyGrid, CliError> {
    if let Some(freqs) = &args.freqs {
        return Ok(FrequencyGrid::explicit(freqs.clone()));
    }
    if args.start.is_none() && args.stop.is_none() && args.points.is_none() && args.spacing.is_none()
    {
        return Ok(default.clone());
    }

    let (start, stop, num_points, spacing) = match default {
        FrequencyGrid::Sweep {
            start,
            stop,
            num_points,
            spacing,
        } => (Some(*start), Some(*stop), Some(*num_points), *spacing),
        FrequencyGrid::Explicit(_) => (None, None, None, Spacing::default()),
    };
    let missing = |flag: &str| {
        CliError::InvalidArgument(format!(
            "{flag} is required when the configured grid is an explicit list"
        ))
    };

    Ok(FrequencyGrid::Sweep {
        start: args.start.or(start).ok_or_else(|| missing("--start"))?,
        stop: args.stop.or(stop).ok_or_else(|| missing("--stop"))?,
        num_points: args.points.or(num_points).ok_or_else(|| missing("--points"))?,
        spacing: args.spacing.map_or(spacing, Spacing::from),
    })
}

/// Resolve the output format from flags over the configured default.
pub fn resolve_format(args: &OutputArgs, default: OutputFormat) -> Result<OutputFormat, CliError> {
    let polar_flags = args.db || args.radians || args.unwrap;
    let real_imaginary = match args.format {
        Some(FormatArg::RealImag) => true,
        Some(FormatArg::AmpPhase) => false,
        None => default == OutputFormat::RealImaginary && !polar_flags,
    };
    if real_imaginary {
        if polar_flags {
            return Err(CliError::InvalidArgument(
                "--db/--radians/--unwrap require amp-phase output".to_string(),
            ));
        }
        return Ok(OutputFormat::RealImaginary);
    }

    let (mut amplitude, mut phase, mut unwrap) = match default {
        OutputFormat::AmplitudePhase {
            amplitude,
            phase,
            unwrap,
        } => (amplitude, phase, unwrap),
        OutputFormat::RealImaginary => (AmplitudeScale::Linear, PhaseUnit::Degrees, false),
    };
    if args.db {
        amplitude = AmplitudeScale::Decibel;
    }
    if args.radians {
        phase = PhaseUnit::Radians;
    }
    unwrap |= args.unwrap;

    Ok(OutputFormat::AmplitudePhase {
        amplitude,
        phase,
        unwrap,
    })
}

// =============================================================================
// EVAL COMMAND
// =============================================================================

/// Evaluate every response of the input file and format the results.
///
/// A response that cannot be prepared (e.g. non-motion input units with a
/// unit conversion requested) is logged and skipped. The call only fails if
/// no response could be evaluated.
pub fn run_eval(args: &EvalArgs) -> Result<Vec<AssembledResponse>, CliError> {
    let config = EvalConfig::load_or_default(args.config.as_deref())?;
    let mut options = config.cascade.clone();
    if let Some(units) = args.units {
        options.target_units = Some(units.into());
    }
    let grid = build_grid(&args.grid, &config.grid)?;
    let format = resolve_format(&args.output, config.output)?;
    let responses = load_responses(&args.response)?;

    tracing::info!(
        responses = responses.len(),
        points = grid.len(),
        "evaluating responses"
    );
    let table = UnitTable::standard();
    let results = evaluate_batch(&responses, &grid, &options, &table)?;

    let mut assembled = Vec::with_capacity(results.len());
    let mut first_error = None;
    for (response, result) in responses.iter().zip(results) {
        match result {
            Ok(evaluated) => {
                log_warnings(&evaluated.channel, &evaluated.warnings);
                let failures = evaluated.failure_count();
                if failures > 0 {
                    tracing::warn!(
                        channel = %evaluated.channel,
                        failures,
                        total = evaluated.points.len(),
                        "some frequencies could not be evaluated"
                    );
                }
                assembled.push(assemble(&evaluated, format));
            }
            Err(error) => {
                tracing::error!(channel = %response.channel(), %error, "response skipped");
                first_error.get_or_insert(error);
            }
        }
    }

    match first_error {
        Some(error) if assembled.is_empty() => Err(error.into()),
        _ => Ok(assembled),
    }
}

/// `seisresp eval`: evaluate and print (or write) the results.
pub fn cmd_eval(args: &EvalArgs) -> Result<(), CliError> {
    let assembled = run_eval(args)?;
    let rendered = if args.output.json {
        let mut json = serde_json::to_string_pretty(&assembled)?;
        json.push('\n');
        json
    } else {
        render_table(&assembled)
    };
    write_output(args.output.output.as_deref(), &rendered)
}

/// Tab-separated text rendering, one block per channel.
#[must_use]
pub fn render_table(assembled: &[AssembledResponse]) -> String {
    let mut out = String::new();
    for (i, response) in assembled.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("# {}\n", response.channel));
        for warning in &response.warnings {
            out.push_str(&format!("# warning: {warning}\n"));
        }
        let (first, second) = response.format.columns();
        out.push_str(&format!("frequency\t{first}\t{second}\n"));
        for row in &response.rows {
            match (&row.values, &row.failure) {
                (Some((a, b)), _) => {
                    out.push_str(&format!("{:.6e}\t{a:.6e}\t{b:.6e}\n", row.frequency));
                }
                (None, Some(failure)) => out.push_str(&format!(
                    "{:.6e}\tFAILED\t{}: {}\n",
                    row.frequency, failure.kind, failure.message
                )),
                (None, None) => out.push_str(&format!("{:.6e}\tFAILED\n", row.frequency)),
            }
        }
    }
    out
}

fn write_output(path: Option<&Path>, rendered: &str) -> Result<(), CliError> {
    match path {
        Some(path) => {
            std::fs::write(path, rendered).map_err(|source| CliError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(path = %path.display(), "output written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn log_warnings(channel: &ChannelId, warnings: &[CascadeWarning]) {
    for warning in warnings {
        match warning {
            CascadeWarning::NormalizationMismatch {
                reported,
                computed,
                relative_error,
            } => tracing::warn!(
                channel = %channel,
                reported = *reported,
                computed = *computed,
                relative_error = *relative_error,
                "reported sensitivity differs from stage gain product"
            ),
            CascadeWarning::NormalizationFactorMismatch {
                stage_index,
                stated,
                computed,
            } => tracing::warn!(
                channel = %channel,
                stage = *stage_index,
                stated = *stated,
                computed = *computed,
                "normalization factor differs from computed value"
            ),
            CascadeWarning::SampleRateMismatch {
                stage_index,
                declared,
                running,
            } => tracing::warn!(
                channel = %channel,
                stage = *stage_index,
                declared = *declared,
                running = *running,
                "declared sample rate differs from upstream rate"
            ),
        }
    }
}

// =============================================================================
// STAGES COMMAND
// =============================================================================

/// One line of the stage listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRow {
    pub index: usize,
    pub kind: &'static str,
    pub input_sample_rate: Option<f64>,
    pub output_sample_rate: Option<f64>,
    pub gain: Option<f64>,
    pub summary: String,
}

/// Stage listing of a prepared cascade, with the sample rate in effect at
/// each stage's input and output.
#[must_use]
pub fn stage_rows(cascade: &Cascade<'_>) -> Vec<StageRow> {
    cascade
        .response()
        .stages()
        .iter()
        .zip(cascade.contexts())
        .enumerate()
        .map(|(index, (stage, ctx))| StageRow {
            index,
            kind: stage.kind(),
            input_sample_rate: ctx.sample_rate,
            output_sample_rate: match stage {
                Stage::Decimation(d) => ctx
                    .sample_rate
                    .map(|rate| rate / f64::from(d.decimation_factor)),
                _ => ctx.sample_rate,
            },
            gain: stage.gain_value(),
            summary: describe_stage(stage),
        })
        .collect()
}

fn describe_stage(stage: &Stage) -> String {
    match stage {
        Stage::PolesZeros(pz) => format!(
            "{} poles, {} zeros, A0={:e}, {:?}",
            pz.poles.len(),
            pz.zeros.len(),
            pz.normalization_factor,
            pz.transfer_function_type
        ),
        Stage::Coefficients(c) if c.is_fir() => format!(
            "FIR, {} taps, {:?}",
            c.numerator.len(),
            c.transfer_function_type
        ),
        Stage::Coefficients(c) => format!(
            "{} numerator, {} denominator, {:?}",
            c.numerator.len(),
            c.denominator.len(),
            c.transfer_function_type
        ),
        Stage::ResponseList(list) => match list.bounds() {
            Some((low, high)) => format!("{} entries, {low}-{high} Hz", list.entries.len()),
            None => "empty".to_string(),
        },
        Stage::Polynomial(p) => format!(
            "{} coefficients, {}-{} Hz",
            p.coefficients.len(),
            p.valid_frequency_range.0,
            p.valid_frequency_range.1
        ),
        Stage::Decimation(d) => format!(
            "factor {}, offset {}, delay {} s, correction {} s",
            d.decimation_factor, d.offset, d.delay, d.correction_applied
        ),
        Stage::Gain(g) => format!(
            "{:e} at {} Hz",
            g.sensitivity, g.frequency_of_sensitivity
        ),
    }
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{r}"))
}

/// `seisresp stages`: list every stage with its sample rates.
pub fn cmd_stages(response_path: &Path) -> Result<(), CliError> {
    let responses = load_responses(response_path)?;
    let table = UnitTable::standard();
    let options = CascadeOptions::default();

    let mut out = String::new();
    for (i, response) in responses.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let cascade = Cascade::new(response, &options, &table)?;
        out.push_str(&format!(
            "# {} ({} -> {})\n",
            response.channel(),
            response.input_units(),
            response.output_units()
        ));
        out.push_str("index\tkind\tin_rate\tout_rate\tgain\tsummary\n");
        for row in stage_rows(&cascade) {
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\n",
                row.index,
                row.kind,
                format_rate(row.input_sample_rate),
                format_rate(row.output_sample_rate),
                row.gain.map_or_else(|| "-".to_string(), |g| format!("{g:e}")),
                row.summary
            ));
        }
    }
    write_output(None, &out)
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Validation summary of one response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub channel: ChannelId,
    pub input_units: String,
    pub output_units: String,
    pub stage_count: usize,
    pub gain_product: f64,
    pub reported_sensitivity: Option<f64>,
    pub output_sample_rate: Option<f64>,
    pub warnings: Vec<CascadeWarning>,
}

/// Prepare every response and collect its warnings.
pub fn check_responses(
    responses: &[Response],
    options: &CascadeOptions,
) -> Result<Vec<CheckReport>, CliError> {
    let table = UnitTable::standard();
    responses
        .iter()
        .map(|response| {
            let cascade = Cascade::new(response, options, &table)?;
            let output_sample_rate = stage_rows(&cascade)
                .last()
                .and_then(|row| row.output_sample_rate);
            Ok(CheckReport {
                channel: response.channel().clone(),
                input_units: response.input_units().to_string(),
                output_units: response.output_units().to_string(),
                stage_count: response.stages().len(),
                gain_product: response.gain_product(),
                reported_sensitivity: response.sensitivity().map(|s| s.value),
                output_sample_rate,
                warnings: cascade.warnings().to_vec(),
            })
        })
        .collect()
}

/// `seisresp check`: validate responses and report warnings.
pub fn cmd_check(response_path: &Path, json: bool) -> Result<(), CliError> {
    let responses = load_responses(response_path)?;
    let reports = check_responses(&responses, &CascadeOptions::default())?;
    for report in &reports {
        log_warnings(&report.channel, &report.warnings);
    }

    let rendered = if json {
        let mut json = serde_json::to_string_pretty(&reports)?;
        json.push('\n');
        json
    } else {
        let mut out = String::new();
        for report in &reports {
            out.push_str(&format!(
                "{}\t{} -> {}\tstages={}\tgain_product={:e}\treported={}\toutput_rate={}\n",
                report.channel,
                report.input_units,
                report.output_units,
                report.stage_count,
                report.gain_product,
                report
                    .reported_sensitivity
                    .map_or_else(|| "-".to_string(), |s| format!("{s:e}")),
                format_rate(report.output_sample_rate)
            ));
            if report.warnings.is_empty() {
                out.push_str("  ok\n");
            }
            for warning in &report.warnings {
                out.push_str(&format!("  warning: {warning}\n"));
            }
        }
        out
    };
    write_output(None, &rendered)
}

// =============================================================================
// TESTS
// =============================================================================
