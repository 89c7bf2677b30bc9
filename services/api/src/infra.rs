use ans_despesas::pipeline::store::Connection;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

/// Shared request-handling state. The store handle is explicit and scoped:
/// handlers lock it for the duration of one query and nothing else holds
/// it open.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) store: Arc<Mutex<Connection>>,
}

impl AppState {
    pub(crate) fn new(metrics: PrometheusHandle, store: Connection) -> Self {
        Self {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(metrics),
            store: Arc::new(Mutex::new(store)),
        }
    }
}
