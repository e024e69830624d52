use core::future::Future;

/// Run `op` up to `attempts` times, sleeping `delay` between failures and
/// returning the last error if every attempt fails.
pub async fn retry_with_delay<F, Fut, T, E>(
    attempts: usize,
    delay: std::time::Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    assert!(attempts >= 1);
    let mut left = attempts;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(_e) if left > 1 => {
                left -= 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
