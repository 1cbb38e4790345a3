use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mcl_client::Client;
use mcl_frame::LOCKIN_DATA;
use mcl_params::{callback, catalog::index, LockIn, ParamKey};
use tracing::warn;

use crate::cmd::WatchArgs;
use crate::exit::{client_error, param_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_reading, OutputFormat};

const POLL: Duration = Duration::from_millis(200);

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let lockin = LockIn::try_from(args.lockin).map_err(|err| param_error("watch", err))?;
    let key = ParamKey::new(LOCKIN_DATA, index::LOCKIN_DATA + lockin.offset());

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut client = Client::new(args.connect.config()?);
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let observer = callback(move |_key, value, _ctx| {
        if let Some(readings) = value.as_lockin() {
            let sender = tx.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = sender.send(Arc::clone(readings));
        }
    });
    client
        .registry()
        .register_observer(key, observer, Arc::new(()))
        .map_err(|err| param_error("watch", err))?;

    args.connect.connect(&mut client)?;

    let mut printed = 0usize;
    let mut code = SUCCESS;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL) {
            Ok(readings) => {
                print_reading(key, &readings, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if !client.is_alive() {
                    let reason = client.fault().unwrap_or_else(|| "session ended".into());
                    warn!(%reason, "stream stopped");
                    code = FAILURE;
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    client
        .disconnect()
        .map_err(|err| client_error("disconnect failed", err))?;
    Ok(code)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
