use anyhow::{Context, Result};
use chrono::TimeZone;
use std::env;
use std::fs;
use std::process::Command;
use vergen_gitcl::{Emitter, GitclBuilder};

const LIBRARY: &str = "dtvcc";

fn main() -> Result<()> {
    // Git describe for the long version string
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
        println!("cargo:rustc-env=VERGEN_GIT_DESCRIBE=unknown");
    }

    // Reproducible builds pin the timestamp through SOURCE_DATE_EPOCH
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => {
            let secs = val
                .parse::<i64>()
                .context("SOURCE_DATE_EPOCH is not a number")?;
            chrono::Utc
                .timestamp_opt(secs, 0)
                .single()
                .context("SOURCE_DATE_EPOCH is out of range")?
        }
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let dtvcc_version = library_version_from_metadata().unwrap_or_else(|_| {
        library_version_from_manifest().unwrap_or_else(|_| "unknown".to_string())
    });
    println!("cargo:rustc-env=DTVCC_VERSION={dtvcc_version}");
    println!("cargo:rerun-if-changed={LIBRARY}/Cargo.toml");

    Ok(())
}

/// Looks the library up with `cargo metadata`, as a workspace member or a
/// registry dependency.
fn library_version_from_metadata() -> Result<String> {
    let output = Command::new("cargo")
        .args(["metadata", "--format-version", "1"])
        .output()?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    let from_packages = metadata["packages"].as_array().and_then(|packages| {
        packages
            .iter()
            .find(|package| package["name"].as_str() == Some(LIBRARY))
            .and_then(|package| package["version"].as_str())
    });
    if let Some(version) = from_packages {
        return Ok(version.to_string());
    }

    // Resolve node ids look like "dtvcc 0.3.0 (registry+...)"
    let prefix = format!("{LIBRARY} ");
    let from_resolve = metadata["resolve"]["nodes"].as_array().and_then(|nodes| {
        nodes
            .iter()
            .filter_map(|node| node["id"].as_str())
            .find_map(|id| id.strip_prefix(&prefix))
            .and_then(|rest| rest.split(' ').next())
    });
    if let Some(version) = from_resolve {
        return Ok(version.to_string());
    }

    anyhow::bail!("{LIBRARY} package not found in metadata");
}

fn library_version_from_manifest() -> Result<String> {
    let manifest = fs::read_to_string(format!("{LIBRARY}/Cargo.toml"))?;

    manifest
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("version"))
        .find_map(|line| line.split_once('='))
        .map(|(_, value)| value.trim().trim_matches('"').trim_matches('\'').to_string())
        .with_context(|| format!("Could not find version in {LIBRARY}/Cargo.toml"))
}
