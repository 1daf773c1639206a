//! Implementation of the `relmatrix validate` command.
//!
//! Loads the matrix file and reports whether it is well-formed, without
//! touching toolchains, builds or the release API.

use std::path::Path;

use anyhow::Result;

use relmatrix_lib::matrix::load_matrix;

use crate::output::{print_error, print_success};

pub fn cmd_validate(matrix_path: &Path) -> Result<()> {
  match load_matrix(matrix_path) {
    Ok(targets) => {
      print_success(&format!(
        "{} is valid ({} target{})",
        matrix_path.display(),
        targets.len(),
        if targets.len() == 1 { "" } else { "s" }
      ));
      Ok(())
    }
    Err(err) => {
      print_error(&format!("{} is invalid: {}", matrix_path.display(), err));
      std::process::exit(1);
    }
  }
}
