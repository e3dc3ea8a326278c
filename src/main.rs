use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use goterp::{stdlib, Interp, Options};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let mut gopath = PathBuf::new();
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gopath" | "-g" => {
                gopath = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow::anyhow!("Missing directory after {arg}"))?;
            }
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    let source = if let Some(path) = input_path {
        fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let mut interp = Interp::new(Options { gopath });
    interp.use_symbols(stdlib());

    let result = interp.eval(&source)?;
    if let Some(main_fn) = interp.lookup("main") {
        interp.call(&main_fn, &[])?;
    }
    for line in interp.drain_output() {
        println!("{line}");
    }
    if let Some(value) = result {
        println!("{}", value.to_output());
    }
    Ok(())
}
