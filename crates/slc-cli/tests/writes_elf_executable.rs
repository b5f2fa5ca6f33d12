use std::env;
use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Result};
use tempfile::{NamedTempFile, TempDir};

fn run_slc(args: &[&str]) -> Result<()> {
    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let pkg_dir = env!("CARGO_MANIFEST_DIR");
    let success = Command::new(cargo)
        .current_dir(pkg_dir)
        .stdout(Stdio::null())
        .args(["run", "-q", "--"])
        .args(args)
        .status()?
        .success();
    if !success {
        bail!("slc exited with a failure status");
    }
    Ok(())
}

#[test]
fn output_flag_writes_an_elf_file() -> Result<()> {
    let mut source = NamedTempFile::new()?;
    write!(source, "(+ 1 2)")?;

    let dir = TempDir::new()?;
    let out_path = dir.path().join("a.out");

    run_slc(&[source.path().to_str().unwrap(), "-o", out_path.to_str().unwrap()])?;

    let bytes = fs::read(&out_path)?;
    assert_eq!(&bytes[0..4], b"\x7fELF");
    Ok(())
}
