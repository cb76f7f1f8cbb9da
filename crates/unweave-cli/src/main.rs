//! The unweave binary: detect a webpack or browserify bundle, reconstruct
//! its modules, and write each one out as a standalone `.js` file.

#![allow(clippy::print_stderr)]

mod args;
mod tracing_config;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use unweave_unpack::{Bundle, unpack_and_reconstruct};

use crate::args::CliArgs;

fn main() -> Result<()> {
    tracing_config::init_tracing();
    let args = CliArgs::parse();

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let Some(bundle) = unpack_and_reconstruct(&source)? else {
        eprintln!("{}", "no bundle detected".yellow());
        std::process::exit(1);
    };

    if args.list {
        for module in bundle.modules.values() {
            if module.is_entry {
                println!("{} (entry)", module.id);
            } else {
                println!("{}", module.id);
            }
        }
        return Ok(());
    }
    write_output(&args, &bundle)
}

fn write_output(args: &CliArgs, bundle: &Bundle) -> Result<()> {
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let mut failures = 0usize;
    for module in bundle.modules.values() {
        let path = args.out_dir.join(format!("{}.js", sanitize_id(&module.id.0)));
        fs::write(&path, module.code())
            .with_context(|| format!("failed to write {}", path.display()))?;
        for diagnostic in &module.diagnostics {
            eprintln!("{} {diagnostic}", "warning:".yellow());
        }
        if module.failed {
            failures += 1;
            eprintln!(
                "{} module '{}' could not be fully reconstructed",
                "warning:".yellow(),
                module.id
            );
        }
    }

    if args.json {
        let summary = serde_json::to_string_pretty(&bundle.summary())
            .context("failed to serialize the bundle summary")?;
        let path = args.out_dir.join("bundle.json");
        fs::write(&path, summary)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let line = format!(
        "{} bundle: {} module(s) written to {}",
        bundle.kind.as_str(),
        bundle.modules.len(),
        args.out_dir.display()
    );
    if failures == 0 {
        println!("{}", line.green());
    } else {
        println!("{}", line.yellow());
    }
    Ok(())
}

/// Module ids may contain path fragments; keep file names flat.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}
