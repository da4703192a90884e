//! Renders the `solo-bootstrap(1)` manual page into `OUT_DIR` from the same
//! clap definitions the binary parses.

use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR").map(PathBuf::from).ok_or("OUT_DIR is unset")?;
    let command = cli::Cli::command();
    let page = out_dir.join(format!("{}.1", command.get_name()));

    let mut writer = BufWriter::new(File::create(page)?);
    Man::new(command).render(&mut writer)?;
    writer.flush()?;
    Ok(())
}
