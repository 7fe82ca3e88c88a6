use clap::Parser;
use std::path::PathBuf;
use anemia_mobile::demo_artifacts;

#[derive(Parser)]
struct Args {
    /// Directory to write anemia_model.json and scaler.json into
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let (model, scaler) = demo_artifacts(&args.out_dir)?;
    println!("Saved demo classifier to {:?} and scaler to {:?}", model, scaler);
    Ok(())
}
