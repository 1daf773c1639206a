//! Implementation of the `relmatrix plan` command.
//!
//! Shows what a run would do: every target in matrix order with its build
//! procedure, artifact and toolchain prerequisites. No side effects.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use relmatrix_lib::matrix::{TargetDescriptor, load_matrix};
use relmatrix_lib::platform;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Serialize)]
struct PlanEntry {
  artifact: String,
  os: String,
  arch: Option<String>,
  command: String,
  cwd: Option<String>,
  requires: Vec<String>,
  runnable_on_host: bool,
}

impl PlanEntry {
  fn from_descriptor(descriptor: &TargetDescriptor) -> Self {
    let mut command = descriptor.script.clone();
    for arg in &descriptor.args {
      command.push(' ');
      command.push_str(arg);
    }

    Self {
      artifact: descriptor.artifact.clone(),
      os: descriptor.os.to_string(),
      arch: descriptor.arch.map(|a| a.to_string()),
      command,
      cwd: descriptor.cwd.as_ref().map(|p| p.display().to_string()),
      requires: descriptor
        .requires
        .iter()
        .filter(|r| r.applies_to(descriptor.os))
        .map(|r| r.to_string())
        .collect(),
      runnable_on_host: platform::host_matches(descriptor.os),
    }
  }
}

pub fn cmd_plan(matrix_path: &Path, format: OutputFormat) -> Result<()> {
  let targets = load_matrix(matrix_path)
    .with_context(|| format!("Failed to load matrix: {}", matrix_path.display()))?;

  let entries: Vec<PlanEntry> = targets.iter().map(PlanEntry::from_descriptor).collect();

  if format.is_json() {
    return print_json(&entries);
  }

  println!("Targets: {}", entries.len());
  for entry in &entries {
    println!();
    let platform = match &entry.arch {
      Some(arch) => format!("{}/{}", entry.os, arch),
      None => entry.os.clone(),
    };
    print_info(&format!("{} ({})", entry.artifact, platform));
    print_stat("command", &entry.command);
    if let Some(cwd) = &entry.cwd {
      print_stat("cwd", cwd);
    }
    if !entry.requires.is_empty() {
      print_stat("requires", &entry.requires.join(", "));
    }
    if !entry.runnable_on_host {
      print_stat("host", "not runnable on this machine");
    }
  }

  Ok(())
}
