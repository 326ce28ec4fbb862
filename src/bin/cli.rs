//! CLI application for scoring a handwritten letter.
//!
//! Usage:
//!   akuru <image> --target ක                 # Human-readable output
//!   akuru <image> --target ක --json          # JSON output
//!   akuru <image> --target ක -o result.json  # Save to file

use akuru::{decode, init_tracing, Analyzer, AnalyzerConfig, GrayImage, ImageAccess, Label};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "akuru")]
#[command(author, version, about = "Score a handwritten Sinhala letter", long_about = None)]
struct Args {
    /// Input image file (PNG or JPEG)
    #[arg(required = true)]
    image: PathBuf,

    /// Letter the drawing is meant to be
    #[arg(short, long)]
    target: String,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Analyzer configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    image: String,
    width: u32,
    height: u32,
    target: Label,
    prediction: Label,
    confidence: f64,
    is_correct: bool,
    ensemble_type: String,
    feedback: String,
    processing_ms: u64,
    methods: Vec<MethodOutput>,
    top_predictions: Vec<ScoreOutput>,
}

#[derive(Serialize)]
struct MethodOutput {
    method: String,
    prediction: Label,
    confidence: f64,
    features: akuru::FeatureSet,
}

#[derive(Serialize)]
struct ScoreOutput {
    letter: Label,
    confidence: f64,
}

fn main() {
    let args = Args::parse();
    init_tracing(if args.verbose { "akuru=debug" } else { "warn" });

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            if args.verbose {
                eprintln!("Loading configuration from {:?}...", path);
            }
            AnalyzerConfig::from_file(path)?
        }
        None => AnalyzerConfig::default(),
    }
    .with_env_overrides();
    let analyzer = Analyzer::from_config(&config)?;

    if args.verbose {
        eprintln!("Loading image {:?}...", args.image);
    }
    let img = image::open(&args.image)?;
    let gray: GrayImage = decode::flatten(&img);
    let (width, height) = (gray.width(), gray.height());

    let analysis = analyzer.analyze_str(&gray, &args.target)?;
    if args.verbose {
        eprintln!(
            "Ran {} method(s) in {} ms",
            analysis.result.method_results.len(),
            analysis.processing_ms()
        );
    }

    let processing_ms = analysis.processing_ms();
    let result = analysis.result;
    let output = Output {
        image: args.image.display().to_string(),
        width,
        height,
        target: analysis.target,
        prediction: result.prediction,
        confidence: result.confidence,
        is_correct: result.is_correct,
        ensemble_type: result.ensemble_type.to_string(),
        feedback: analysis.feedback,
        processing_ms,
        top_predictions: result
            .top(3)
            .iter()
            .map(|s| ScoreOutput {
                letter: s.letter,
                confidence: s.confidence,
            })
            .collect(),
        methods: result
            .method_results
            .into_iter()
            .map(|r| MethodOutput {
                method: r.method,
                prediction: r.prediction,
                confidence: r.confidence,
                features: r.features,
            })
            .collect(),
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        if args.verbose {
            eprintln!("Output written to {:?}", path);
        }
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Image: {} ({}x{})\n", output.image, output.width, output.height));
    s.push_str(&format!("Target: {}\n", output.target));
    s.push_str(&format!(
        "Prediction: {} ({:.1}%, {})\n",
        output.prediction,
        output.confidence * 100.0,
        if output.is_correct { "correct" } else { "incorrect" }
    ));
    s.push_str(&format!("Ensemble: {}\n", output.ensemble_type));
    s.push_str(&format!("\n{}\n", output.feedback));

    if output.methods.is_empty() {
        s.push_str("\nNo method produced a result.\n");
        return s;
    }

    s.push_str("\nMethods:\n");
    for m in &output.methods {
        s.push_str(&format!(
            "  {:<14} {} ({:.1}%)\n",
            m.method,
            m.prediction,
            m.confidence * 100.0
        ));
    }

    s.push_str("\nTop predictions:\n");
    for p in &output.top_predictions {
        s.push_str(&format!("  {}  {:.1}%\n", p.letter, p.confidence * 100.0));
    }

    s
}
