//! Panic containment for test and hook bodies

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Run `body`, turning a panic into an error carrying the panic message.
pub async fn catch_panic<F>(body: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_panic_passes_through_results() {
        assert!(catch_panic(async { Ok(()) }).await.is_ok());

        let err = catch_panic(async { Err(anyhow::anyhow!("boom")) })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_catch_panic_converts_panic() {
        let err = catch_panic(async {
            if true {
                panic!("assertion went sideways");
            }
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "panicked: assertion went sideways");
    }
}
