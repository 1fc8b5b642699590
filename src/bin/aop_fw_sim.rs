// Firmware-side simulator: owns the mailbox region and prints every packet
// a client submits. Stands in for the AOP controller during bring-up.
//
// Usage: aop_fw_sim [--attach] [--region NAME]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qmp_aop_client::{MailboxRegion, DEFAULT_RING_DEPTH};

fn main() -> io::Result<()> {
    env_logger::init();

    let mut region_name = "aop_qmp".to_string();
    let mut attach = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--attach" => attach = true,
            "--region" => match args.next() {
                Some(name) => region_name = name,
                None => return usage(),
            },
            _ => return usage(),
        }
    }

    let region = if attach {
        MailboxRegion::attach(&region_name)?
    } else {
        MailboxRegion::create(&region_name, DEFAULT_RING_DEPTH)?
    };
    let rx = region.open_receiver(0)?;
    log::info!("draining channel 0 of region {}", region_name);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::Relaxed);
        })
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("signal handler: {}", e)))?;
    }

    while running.load(Ordering::Relaxed) {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(pkt) => {
                // Strings are NUL-padded to the rounded size; show the text
                // part plus the wire length.
                let text_end = pkt.iter().position(|&b| b == 0).unwrap_or(pkt.len());
                println!(
                    "[{:>3} bytes] {}",
                    pkt.len(),
                    String::from_utf8_lossy(&pkt[..text_end])
                );
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e),
        }
    }

    if !attach {
        MailboxRegion::unlink(&region_name)?;
    }
    Ok(())
}

fn usage() -> io::Result<()> {
    eprintln!("usage: aop_fw_sim [--attach] [--region NAME]");
    std::process::exit(2);
}
