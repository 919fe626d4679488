//! Domain services
//!
//! Each service composes calls to the providers and reshapes their results into DTOs.

pub mod community;
pub mod gee;
pub mod species;
pub mod zone;

use crate::error::PastizalesError;

use std::future::Future;

use tokio::task::JoinSet;

/// Run futures concurrently and return their results in input order.
///
/// The first error is returned and the remaining tasks are aborted.
pub(crate) async fn join_ordered<T, F, I>(futures: I) -> Result<Vec<T>, PastizalesError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, PastizalesError>> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    for (index, future) in futures.into_iter().enumerate() {
        set.spawn(async move { (index, future.await) });
    }
    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let (index, result) = joined?;
        results.push((index, result?));
    }
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn results_in_input_order() {
        let futures = [30_u64, 10, 20].map(|delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<u64, PastizalesError>(delay)
        });
        assert_eq!(vec![30, 10, 20], join_ordered(futures).await.unwrap());
    }

    #[tokio::test]
    async fn first_error_is_returned() {
        let futures = [1_u32, 2, 3].map(|n| async move {
            if n == 2 {
                Err(PastizalesError::InvalidYear {
                    year: n.to_string(),
                })
            } else {
                Ok(n)
            }
        });
        match join_ordered(futures).await {
            Err(PastizalesError::InvalidYear { year }) => assert_eq!("2", year),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
