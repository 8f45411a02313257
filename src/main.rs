//! Run a program attached to a pseudoterminal.
//!
//! Usage: `pty-run program_name [parameters]`
//!
//! Exits with the target's own exit code, 0 if the target died from a
//! signal, and 1 with a diagnostic on stderr for any fatal setup failure.

use std::env;
use std::ffi::{OsStr, OsString};
use std::process;

use pty_run::{Child, PtyPair};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = env::args_os();
    let argv0 = args
        .next()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pty-run".into());
    let Some(program) = args.next() else {
        eprintln!("Usage: {argv0} program_name [parameters]");
        process::exit(1);
    };
    let rest: Vec<OsString> = args.collect();

    match run(&program, &rest) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("pty-run: {err}");
            process::exit(1);
        }
    }
}

fn run(program: &OsStr, args: &[OsString]) -> pty_run::Result<i32> {
    let pair = PtyPair::open()?;
    pair.set_raw()?;
    let mut child = Child::spawn(pair, program, args)?;
    pty_run::relay(&mut child)
}
