use crate::error::ServiceError;
use std::future::Future;
use std::time::Duration;

pub mod api;
pub mod audio;
pub mod captions;
pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod init;
pub mod persona;
pub mod srt;
pub mod status;
pub mod transcript;

/// Run one collaborator call under an optional deadline; an overrun is a
/// plain `ServiceError::Timeout` and feeds the same fallback as any failure.
pub(crate) async fn with_deadline<T, F>(deadline: Option<Duration>, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| Err(ServiceError::Timeout)),
        None => fut.await,
    }
}
