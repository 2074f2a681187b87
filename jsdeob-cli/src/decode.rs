use std::{path::Path, time::Duration};

use anyhow::Context;
use jsdeob::deobfuscation::{CleanupConfig, DeobfuscationEngine, EngineConfig};
use rayon::prelude::*;

use crate::{
    app::{DecodeOptions, GlobalOptions},
    files::{collect_scripts, file_display_name, mirror_path, write_mirrored},
    output::{print_output, FileReport},
};

pub fn run(opts: &DecodeOptions, global: &GlobalOptions) -> anyhow::Result<()> {
    let files = collect_scripts(&opts.input)?;
    if files.is_empty() {
        if global.json {
            println!("[]");
        } else {
            eprintln!("No .js files found under {}", opts.input.display());
        }
        return Ok(());
    }

    let config = build_config(opts);
    let engine = DeobfuscationEngine::new(config);

    let work = || {
        files
            .par_iter()
            .map(|file| match process_file(&engine, &opts.input, file, &opts.output, global) {
                Ok(report) => report,
                Err(error) => {
                    log::error!("{}: {error:#}", file.display());
                    FileReport::failed(file.display().to_string(), &error)
                }
            })
            .collect::<Vec<_>>()
    };
    let reports = match opts.jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to start worker threads")?
            .install(work),
        None => work(),
    };

    print_output(&reports, global, |reports| {
        let failed = reports.iter().filter(|r| r.error.is_some()).count();
        let changed = reports.iter().filter(|r| r.changed).count();
        eprintln!();
        eprintln!(
            "Processed {} files: {} decoded, {} unchanged, {} failed",
            reports.len(),
            changed,
            reports.len() - changed - failed,
            failed
        );
    })
}

fn build_config(opts: &DecodeOptions) -> EngineConfig {
    let mut config = EngineConfig::default();

    if let Some(rounds) = opts.max_rounds {
        config = config.with_max_rounds(rounds);
    }
    if let Some(ms) = opts.timeout_ms {
        config = config.with_sandbox_timeout(Duration::from_millis(ms));
    }
    if opts.no_cleanup {
        config = config.with_cleanup(CleanupConfig::disabled());
    }

    config
}

fn process_file(
    engine: &DeobfuscationEngine,
    input_root: &Path,
    file: &Path,
    output_root: &Path,
    global: &GlobalOptions,
) -> anyhow::Result<FileReport> {
    if !global.json {
        println!("===> decode: {}", file.display());
    }

    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read input: {}", file.display()))?;
    let source = String::from_utf8(bytes)
        .with_context(|| format!("input is not valid UTF-8: {}", file.display()))?;

    let result = engine.deobfuscate(&source);
    log::info!("{}: {}", file_display_name(file), result.summary());

    let out_path = mirror_path(input_root, file, output_root);
    write_mirrored(&out_path, &result.code)?;
    if !global.json {
        println!(" → saved: {}", out_path.display());
    }

    Ok(FileReport::decoded(
        file.display().to_string(),
        out_path.display().to_string(),
        &result,
    ))
}
