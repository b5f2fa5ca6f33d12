use std::env;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Result};
use tempfile::NamedTempFile;

fn run_slc(args: &[&str]) -> Result<String> {
    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let pkg_dir = env!("CARGO_MANIFEST_DIR");
    let output = Command::new(cargo)
        .current_dir(pkg_dir)
        .stdout(Stdio::piped())
        .args(["run", "-q", "--"])
        .args(args)
        .output()?;
    if !output.status.success() {
        bail!("slc exited with {:?}", output.status);
    }
    Ok(String::from_utf8(output.stdout)?)
}

#[test]
fn print_ir_dumps_a_jump_for_an_if_expression() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(file, "(if 1 2 3)")?;
    let stdout = run_slc(&["--print-ir", file.path().to_str().unwrap()])?;
    assert!(stdout.contains("func0:"));
    assert!(stdout.contains("jmpf"));
    Ok(())
}
