use anemia_core::{Feature, Pipeline, PipelineConfig, PipelineError, Verdict};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Screen five blood-test values for anemia")]
struct Args {
    /// Path to the classifier artifact
    #[arg(long, default_value = anemia_core::pipeline::DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// Path to the scaler artifact
    #[arg(long, default_value = anemia_core::pipeline::DEFAULT_SCALER_PATH)]
    scaler: PathBuf,

    /// Read artifacts into memory instead of mapping them
    #[arg(long)]
    no_mmap: bool,

    /// CSV file with one request per line: HB,RBC,PCV,MCH,MCHC
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Prompt for values on stdin
    #[arg(long)]
    interactive: bool,

    /// HB RBC PCV MCH MCHC
    #[arg(num_args = 0.., allow_negative_numbers = true)]
    values: Vec<String>,
}

/// Parse one request. Empty fields are missing values and become NaN.
fn parse_row(line: &str) -> Result<Vec<f64>> {
    let fields: Vec<&str> = if line.contains(',') {
        line.split(',').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    };
    fields
        .into_iter()
        .map(|field| {
            if field.is_empty() {
                Ok(f64::NAN)
            } else {
                field
                    .parse::<f64>()
                    .with_context(|| format!("{:?} is not a number", field))
            }
        })
        .collect()
}

/// Parse one interactive answer. A blank answer is a missing value.
fn single_value(line: &str) -> Result<f64> {
    match parse_row(line)?.as_slice() {
        [] => Ok(f64::NAN),
        [v] => Ok(*v),
        many => bail!("expected one value, got {}", many.len()),
    }
}

fn render(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::NoAnemia => "No Anemia: No signs of anemia detected. Stay healthy!",
        Verdict::HasAnemia => "Has Anemia: High likelihood of anemia detected. Please consult a doctor.",
    }
}

/// Run one request and print the outcome. Request-level problems are
/// printed, not returned, so a session keeps going.
fn answer(pipeline: &Pipeline, raw: &[f64]) -> bool {
    match pipeline.evaluate(raw) {
        Ok(verdict) => {
            println!("{}", render(verdict));
            true
        }
        Err(e @ PipelineError::Validation(_)) => {
            println!("Warning: {}", e);
            false
        }
        Err(e) => {
            println!("Error: {}", e);
            false
        }
    }
}

fn load_requests(path: &Path) -> Result<Vec<(usize, String)>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading input file {}", path.display()))?;
    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .map(|(i, l)| (i + 1, l.to_owned()))
        .collect())
}

fn interactive(pipeline: &Pipeline) -> Result<()> {
    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        let mut raw = Vec::with_capacity(Feature::ALL.len());
        for feature in Feature::ALL {
            let (lo, hi) = feature.typical_range();
            print!("{} ({}, typical {}-{}): ", feature, feature.unit(), lo, hi);
            io::stdout().flush()?;
            input.clear();
            if stdin.read_line(&mut input)? == 0 {
                return Ok(());
            }
            let trimmed = input.trim();
            if trimmed == "/exit" {
                return Ok(());
            }
            match single_value(trimmed) {
                Ok(v) => raw.push(v),
                Err(e) => {
                    println!("Warning: {:#}; treating {} as missing", e, feature);
                    raw.push(f64::NAN);
                }
            }
        }
        answer(pipeline, &raw);
        println!();
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = PipelineConfig {
        model_path: args.model,
        scaler_path: args.scaler,
        use_mmap: !args.no_mmap,
    };

    let pipeline = match Pipeline::load(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Cannot start: {}", e);
            if let Some(artifact) = e.artifact() {
                eprintln!("Please provide a valid {} artifact.", artifact);
            }
            return Ok(ExitCode::from(2));
        }
    };

    if args.interactive {
        interactive(&pipeline)?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(path) = &args.input_file {
        let mut failures = 0usize;
        for (line_no, line) in load_requests(path)? {
            print!("line {}: ", line_no);
            let ok = match parse_row(&line) {
                Ok(raw) => answer(&pipeline, &raw),
                Err(e) => {
                    println!("Warning: {:#}", e);
                    false
                }
            };
            if !ok {
                failures += 1;
            }
        }
        log::info!("batch finished with {} failed request(s)", failures);
        return Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::from(1) });
    }

    if args.values.is_empty() {
        bail!("pass five values, --input-file or --interactive");
    }
    let raw = parse_row(&args.values.join(" "))?;
    Ok(if answer(&pipeline, &raw) { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    run(Args::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_with_missing_fields() {
        let row = parse_row("13.0, ,40,28,33").unwrap();
        assert_eq!(row.len(), 5);
        assert!(row[1].is_nan());
        assert_eq!(row[2], 40.0);
    }

    #[test]
    fn parses_whitespace_rows() {
        assert_eq!(parse_row("13 4.5 40 28 33").unwrap(), vec![13.0, 4.5, 40.0, 28.0, 33.0]);
    }

    #[test]
    fn rejects_words() {
        assert!(parse_row("13,abc,40,28,33").is_err());
    }

    #[test]
    fn batch_file_skips_blank_and_comment_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("requests.csv");
        fs::write(&path, "# HB,RBC,PCV,MCH,MCHC\n13,4.5,40,28,33\n\n9,3.5,28,23,30\n").unwrap();
        let requests = load_requests(&path).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].0, 2);
        assert_eq!(requests[1].0, 4);
    }

    #[test]
    fn interactive_answer_takes_exactly_one_value() {
        assert_eq!(single_value("13.5").unwrap(), 13.5);
        assert!(single_value("").unwrap().is_nan());
        let err = single_value("13 4.5").unwrap_err();
        assert!(err.to_string().contains("expected one value, got 2"), "{}", err);
        assert!(single_value("abc").is_err());
    }

    #[test]
    fn missing_artifact_exits_with_startup_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let model = dir.path().join("anemia_model.json");
        let scaler = dir.path().join("scaler.json");
        let args = Args::parse_from([
            "anemia",
            "--model",
            model.to_str().unwrap(),
            "--scaler",
            scaler.to_str().unwrap(),
            "13",
            "4.5",
            "40",
            "28",
            "33",
        ]);
        let code = run(args).unwrap();
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(2)));
    }

    #[test]
    fn renders_both_fixed_messages() {
        assert!(render(Verdict::NoAnemia).starts_with("No Anemia"));
        assert!(render(Verdict::HasAnemia).starts_with("Has Anemia"));
    }

    #[test]
    fn args_accept_positional_values() {
        let args = Args::parse_from(["anemia", "13", "4.5", "40", "28", "33"]);
        assert_eq!(args.values.len(), 5);
        assert_eq!(args.model, PathBuf::from("anemia_model.json"));
        assert!(!args.no_mmap);
    }
}
