//! Backoff for requests that never reached the dossier service.
//!
//! Only transport failures are repeated. A response of any status goes back
//! to the caller as is, and a request that failed to build is not resent.

use std::time::Duration;

/// Sends after the first one before the transport error is surfaced.
const RESENDS: u32 = 3;

/// First pause; each later pause doubles it.
const FIRST_PAUSE: Duration = Duration::from_millis(200);

fn pause_before(resend: u32) -> Duration {
    FIRST_PAUSE * 2u32.pow(resend)
}

/// Call `send` until it yields a response, pausing between transport
/// failures. At most `RESENDS + 1` requests go out.
pub(crate) async fn retry_send<F, Fut>(send: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut resend = 0;
    loop {
        let err = match send().await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_builder() || resend == RESENDS => return Err(err),
            Err(err) => err,
        };
        let pause = pause_before(resend);
        resend += 1;
        tracing::warn!(resend, of = RESENDS, ?pause, error = %err, "dossier service unreachable");
        tokio::time::sleep(pause).await;
    }
}
