// Service daemon: binds the control node and forwards writes to the AOP
// mailbox. Run `aop_fw_sim` (or the real firmware-side owner) first, or
// pass --create to own the region.
//
// Usage: aopqmpd [--create] [--region NAME] [--node PATH]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qmp_aop_client::ServiceConfig;

fn main() -> io::Result<()> {
    env_logger::init();

    let mut conf = ServiceConfig::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--create" => conf = conf.with_create_region(true),
            "--region" => match args.next() {
                Some(name) => conf = conf.with_region_name(&name),
                None => return usage(),
            },
            "--node" => match args.next() {
                Some(path) => conf = conf.with_node_path(&path),
                None => return usage(),
            },
            _ => return usage(),
        }
    }

    let service = conf.probe()?;
    log::info!("serving on {}", service.node_path().display());

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::Relaxed);
        })
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("signal handler: {}", e)))?;
    }

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(200));
    }

    drop(service);
    Ok(())
}

fn usage() -> io::Result<()> {
    eprintln!("usage: aopqmpd [--create] [--region NAME] [--node PATH]");
    std::process::exit(2);
}
