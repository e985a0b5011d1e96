//! # CRD Generator
//!
//! Prints every CRD the controller serves as multi-document YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/secretgen.yaml
//! cargo run --bin crdgen -- --output config/crd
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use secretgen_controller::crd::all_crds;
use std::path::PathBuf;

const HEADER: &str = "# This file is auto-generated by crdgen\n# DO NOT EDIT THIS FILE MANUALLY\n";

#[derive(Debug, Parser)]
#[command(name = "crdgen", about = "Generate the secretgen controller CRDs")]
struct Args {
    /// Write one `<plural>.<group>.yaml` file per CRD into this directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.output {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            for crd in all_crds() {
                let yaml = serde_yaml::to_string(&crd).context("serializing CRD to YAML")?;
                let path = dir.join(format!("{}.yaml", crd.metadata.name.unwrap_or_default()));
                std::fs::write(&path, format!("{HEADER}---\n{yaml}"))
                    .with_context(|| format!("writing {}", path.display()))?;
                eprintln!("wrote {}", path.display());
            }
        }
        None => {
            print!("{HEADER}");
            for crd in all_crds() {
                let yaml = serde_yaml::to_string(&crd).context("serializing CRD to YAML")?;
                print!("---\n{yaml}");
            }
        }
    }

    Ok(())
}
