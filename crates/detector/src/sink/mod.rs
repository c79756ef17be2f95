//! 인시던트 전달 대상 (sink)
//!
//! - [`JsonFileStore`]: 추가 전용 JSON 문서 저장소
//! - [`WebhookNotifier`]: HTTP POST 알림
//!
//! [`IncidentSink`]는 RPITIT를 사용하므로 `dyn`으로 쓸 수 없습니다.
//! 이미터는 [`DynIncidentSink`]를 통해 `Box<dyn DynIncidentSink>`로 보관합니다.

pub mod store;
pub mod webhook;

pub use store::{IncidentLog, JsonFileStore};
pub use webhook::WebhookNotifier;

use std::future::Future;
use std::pin::Pin;

use logwarden_core::types::Incident;

use crate::error::DetectorError;

/// Boxed future 타입 별칭 (dyn-compatible trait에서 사용)
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 인시던트 전달 trait
///
/// # 구현 예시
/// ```ignore
/// struct StdoutSink;
///
/// impl IncidentSink for StdoutSink {
///     fn name(&self) -> &str { "stdout" }
///
///     async fn deliver(&self, incident: &Incident) -> Result<(), DetectorError> {
///         tracing::info!(incident_id = %incident.incident_id, "incident");
///         Ok(())
///     }
/// }
/// ```
pub trait IncidentSink: Send + Sync {
    /// sink 이름 (로그, 메트릭 레이블)
    fn name(&self) -> &str;

    /// 인시던트 하나를 전달합니다.
    fn deliver(
        &self,
        incident: &Incident,
    ) -> impl Future<Output = Result<(), DetectorError>> + Send;
}

/// dyn-compatible 인시던트 전달 trait
///
/// `IncidentSink`를 구현하면 blanket impl로 자동 구현됩니다.
pub trait DynIncidentSink: Send + Sync {
    /// sink 이름
    fn name(&self) -> &str;

    /// 인시던트 하나를 전달합니다.
    fn deliver<'a>(&'a self, incident: &'a Incident) -> BoxFuture<'a, Result<(), DetectorError>>;
}

impl<T: IncidentSink> DynIncidentSink for T {
    fn name(&self) -> &str {
        IncidentSink::name(self)
    }

    fn deliver<'a>(&'a self, incident: &'a Incident) -> BoxFuture<'a, Result<(), DetectorError>> {
        Box::pin(IncidentSink::deliver(self, incident))
    }
}
