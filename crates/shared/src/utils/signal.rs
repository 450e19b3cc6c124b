use tokio::{
    io,
    signal::unix::{signal, SignalKind},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

// Spawn a task that cancels `cancellation_token` on SIGTERM, SIGINT, SIGHUP or
// SIGQUIT. The block driver stops at the next block boundary once the token
// is cancelled; a job that is already being worked is finished first.
//
// The task also ends if the token is cancelled by someone else, e.g. when
// the keeper exhausts its error budget.
pub fn trigger_cancellation_on_signal(
    cancellation_token: CancellationToken,
) -> io::Result<JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let signal_handle = tokio::spawn(async move {
        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = sighup.recv() => "SIGHUP",
            _ = sigquit.recv() => "SIGQUIT",
            _ = cancellation_token.cancelled() => return,
        };
        log::info!("Received {received}, keeper will stop after the current block");
        cancellation_token.cancel();
    });

    Ok(signal_handle)
}
