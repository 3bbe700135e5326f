use crate::config::Settings;
use crate::error::{AttemptError, ConfigError, GenError, Result};
use crate::providers::{ProviderRecord, RuntimeProvider, usable_providers};

/// Run `op` against the usable provider chain, first success wins.
///
/// Ordering is deterministic: the default provider first when usable, the
/// rest in their stored order. Attempts are strictly sequential — parallel
/// attempts would multiply external cost and break first-success semantics.
/// On success all accumulated failures are discarded; on exhaustion the last
/// provider's failure is attached as the terminal cause. An empty usable set
/// fails fast without attempting anything.
pub async fn run_with_fallback<T, F, Fut>(
    records: &[ProviderRecord],
    settings: &Settings,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(RuntimeProvider) -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    let chain = usable_providers(records);
    if chain.is_empty() {
        return Err(ConfigError::NoUsableProvider.into());
    }

    let mut last_failure: Option<AttemptError> = None;

    for record in chain {
        let provider = RuntimeProvider::resolve(record, settings);
        let code = provider.code.clone();

        match op(provider).await {
            Ok(value) => {
                tracing::debug!(provider = code.as_str(), operation, "provider succeeded");
                return Ok(value);
            }
            Err(failure) => {
                tracing::warn!(
                    provider = code.as_str(),
                    operation,
                    "provider attempt failed: {failure}"
                );
                last_failure = Some(failure);
            }
        }
    }

    // The chain was non-empty, so at least one failure was recorded.
    let cause = last_failure.expect("non-empty chain recorded a failure");
    Err(GenError::Terminal {
        provider: cause.provider().to_string(),
        cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Driver;
    use crate::providers::registry::test_support::record;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failing(provider: &RuntimeProvider, message: &str) -> AttemptError {
        AttemptError::Transient {
            provider: provider.code.clone(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn first_success_wins_and_prior_failures_are_discarded() {
        let records = vec![
            record("p1", Driver::OpenAi, "sk-1", true),
            record("p2", Driver::Anthropic, "sk-2", true),
            record("p3", Driver::Gemini, "sk-3", true),
        ];
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_ref = Arc::clone(&calls);
        let result = run_with_fallback(&records, &Settings::default(), "generate", |provider| {
            let calls = Arc::clone(&calls_ref);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if provider.code == "p3" {
                    Ok(format!("from {}", provider.code))
                } else {
                    Err(failing(&provider, "boom"))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "from p3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn success_short_circuits_remaining_providers() {
        let records = vec![
            record("p1", Driver::OpenAi, "sk-1", true),
            record("p2", Driver::Anthropic, "sk-2", true),
        ];
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_ref = Arc::clone(&calls);
        let result = run_with_fallback(&records, &Settings::default(), "generate", |provider| {
            let calls = Arc::clone(&calls_ref);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AttemptError>(provider.code)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "p1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_raises_terminal_with_last_cause() {
        let records = vec![
            record("p1", Driver::OpenAi, "sk-1", true),
            record("p2", Driver::Anthropic, "sk-2", true),
            record("p3", Driver::Gemini, "sk-3", true),
        ];

        let err = run_with_fallback(&records, &Settings::default(), "generate", |provider| {
            let message = format!("{} down", provider.code);
            async move { Err::<String, _>(failing(&provider, &message)) }
        })
        .await
        .expect_err("all providers fail");

        match err {
            GenError::Terminal { provider, cause } => {
                assert_eq!(provider, "p3");
                assert!(cause.to_string().contains("p3 down"));
            }
            other => panic!("expected terminal error, got {other}"),
        }
    }

    #[tokio::test]
    async fn uncredentialed_provider_is_never_attempted() {
        let records = vec![
            record("p1", Driver::OpenAi, "", true),
            record("p2", Driver::Anthropic, "sk-2", true),
        ];
        let attempted = Arc::new(std::sync::Mutex::new(Vec::new()));

        let attempted_ref = Arc::clone(&attempted);
        let result = run_with_fallback(&records, &Settings::default(), "generate", |provider| {
            let attempted = Arc::clone(&attempted_ref);
            async move {
                attempted.lock().unwrap().push(provider.code.clone());
                Ok::<_, AttemptError>(provider.code)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "p2");
        assert_eq!(*attempted.lock().unwrap(), vec!["p2".to_string()]);
    }

    #[tokio::test]
    async fn empty_usable_set_fails_fast_without_attempts() {
        let records = vec![
            record("p1", Driver::OpenAi, "", true),
            record("p2", Driver::Anthropic, "sk-2", false),
        ];

        let err = run_with_fallback(&records, &Settings::default(), "generate", |provider| {
            async move { Ok::<_, AttemptError>(provider.code) }
        })
        .await
        .expect_err("no usable provider");

        assert!(matches!(
            err,
            GenError::Config(ConfigError::NoUsableProvider)
        ));
    }
}
