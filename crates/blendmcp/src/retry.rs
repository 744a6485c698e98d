use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Number of full rounds. Each round tries every endpoint once.
    pub rounds: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Random jitter (`0..=jitter_max_ms`) added to each backoff sleep.
    pub jitter_max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            // Bounded so a dead endpoint set fails within a few seconds and the
            // tool call stays responsive.
            rounds: 3,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(4),
            jitter_max_ms: 250,
        }
    }
}

fn backoff_delay(cfg: &BackoffConfig, round: usize) -> Duration {
    let shift = u32::try_from(round.min(16)).unwrap_or(16_u32);
    let pow2 = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
    let base_ms = u64::try_from(cfg.base_delay.as_millis()).unwrap_or(u64::MAX);
    let max_ms = u64::try_from(cfg.max_delay.as_millis()).unwrap_or(u64::MAX);
    let ms = base_ms.saturating_mul(pow2).min(max_ms);
    let jitter = if cfg!(test) || cfg.jitter_max_ms == 0 {
        0
    } else {
        // Avoid holding a non-Send RNG across await points.
        rand::random::<u64>() % cfg.jitter_max_ms.saturating_add(1)
    };
    Duration::from_millis(ms.saturating_add(jitter))
}

/// Try `op(item)` across all items in order, for `rounds` rounds. Sleeps with
/// exponential backoff (plus jitter) between rounds, only after every item in
/// the round has failed. Returns the last error when everything fails.
pub async fn try_all_with_backoff<I, T, Fut>(
    items: &[I],
    cfg: &BackoffConfig,
    mut op: impl FnMut(&I) -> Fut + Send,
    context_label: &'static str,
) -> eyre::Result<T>
where
    I: Sync,
    Fut: std::future::Future<Output = eyre::Result<T>> + Send,
{
    if items.is_empty() {
        eyre::bail!("no endpoints configured");
    }
    if cfg.rounds == 0 {
        eyre::bail!("invalid backoff config: rounds=0");
    }

    let mut last_err: Option<eyre::Report> = None;

    for round in 0..cfg.rounds {
        for item in items {
            match op(item).await {
                Ok(v) => return Ok(v),
                Err(e) => last_err = Some(e),
            }
        }
        if round + 1 < cfg.rounds {
            tokio::time::sleep(backoff_delay(cfg, round)).await;
        }
    }

    Err(last_err
        .unwrap_or_else(|| eyre::eyre!("unknown error"))
        .wrap_err(context_label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_cfg(rounds: usize) -> BackoffConfig {
        BackoffConfig {
            rounds,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            jitter_max_ms: 0,
        }
    }

    #[tokio::test]
    async fn returns_first_success_without_further_attempts() -> eyre::Result<()> {
        let items: Vec<&str> = vec!["a", "b", "c"];
        let attempts = AtomicUsize::new(0);
        let out = try_all_with_backoff(
            &items,
            &fast_cfg(3),
            |i| {
                let i = *i;
                attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if i == "b" {
                        Ok(7_i32)
                    } else {
                        eyre::bail!("down")
                    }
                }
            },
            "op",
        )
        .await?;
        assert_eq!(out, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2, "a then b, no more");
        Ok(())
    }

    #[tokio::test]
    async fn exhausts_every_endpoint_each_round() {
        let items: Vec<i32> = vec![1, 2];
        let attempts = AtomicUsize::new(0);
        let res: eyre::Result<()> = try_all_with_backoff(
            &items,
            &fast_cfg(3),
            |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { eyre::bail!("always fails") }
            },
            "op",
        )
        .await;
        assert!(res.is_err(), "all-failing set must error");
        assert_eq!(attempts.load(Ordering::SeqCst), 6, "2 endpoints x 3 rounds");
    }

    #[tokio::test]
    async fn empty_endpoint_set_is_an_error() {
        let items: Vec<String> = vec![];
        let res: eyre::Result<()> =
            try_all_with_backoff(&items, &fast_cfg(1), |_| async { Ok(()) }, "op").await;
        assert!(res.is_err(), "no endpoints should fail fast");
    }

    #[test]
    fn delay_is_capped_at_max() {
        let cfg = BackoffConfig {
            rounds: 10,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(4),
            jitter_max_ms: 0,
        };
        assert_eq!(backoff_delay(&cfg, 0), Duration::from_millis(400));
        assert_eq!(backoff_delay(&cfg, 9), Duration::from_secs(4));
    }
}
