//! 告警后台队列
//!
//! 编排器把告警放入有界通道后立即返回，由单独的工作任务逐个投递，
//! 并把投递结果（ALERT_DISPATCHED / ALERT_FAILED）写回病例存储。

use golden_core::{AlertTicket, AlertTicketStatus, CaseRecord, CaseStore, GoldenError, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::alert::{AlertRequest, AlertService};
use crate::metrics::WorkflowMetrics;
use crate::state_machine::{CaseEvent, CaseStateMachine};

/// 队列中的告警任务
#[derive(Debug, Clone)]
pub struct AlertJob {
    pub alert_id: Uuid,
    pub request: AlertRequest,
}

/// 告警队列入口
pub struct AlertQueue;

impl AlertQueue {
    /// 启动工作任务，必须在 tokio 运行时内调用
    pub fn start(
        alerts: Arc<dyn AlertService>,
        case_store: Arc<dyn CaseStore>,
        metrics: Arc<WorkflowMetrics>,
        capacity: usize,
    ) -> AlertQueueHandle {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let worker = AlertWorker {
            alerts,
            case_store,
            metrics: metrics.clone(),
            state_machine: CaseStateMachine::new(),
        };
        let join = tokio::spawn(worker.run(receiver, shutdown_rx));

        info!("Alert queue started with capacity {}", capacity);

        AlertQueueHandle {
            sender,
            shutdown_tx,
            worker: Mutex::new(Some(join)),
            metrics,
        }
    }
}

/// 告警队列句柄
pub struct AlertQueueHandle {
    sender: mpsc::Sender<AlertJob>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<WorkflowMetrics>,
}

impl AlertQueueHandle {
    /// 非阻塞入队。队列已满或已关闭时返回 `Dropped`，不向调用方报错。
    pub fn enqueue(&self, request: AlertRequest) -> AlertTicket {
        let alert_id = Uuid::new_v4();
        let case_id = request.case_id;

        let status = match self.sender.try_send(AlertJob { alert_id, request }) {
            Ok(()) => {
                info!("Alert {} queued for case {}", alert_id, case_id);
                AlertTicketStatus::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                error!("Alert queue full, dropping alert {} for case {}", alert_id, case_id);
                self.metrics.record_alert("dropped");
                AlertTicketStatus::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Alert queue closed, dropping alert {} for case {}", alert_id, case_id);
                self.metrics.record_alert("dropped");
                AlertTicketStatus::Dropped
            }
        };

        AlertTicket { alert_id, status }
    }

    /// 停止接收新告警，投递完已排队的告警后等待工作任务退出
    pub async fn shutdown(&self) {
        let Some(join) = self.worker.lock().await.take() else {
            return;
        };

        // 工作任务可能已经退出，此时没有接收者
        let _ = self.shutdown_tx.send(());

        if let Err(e) = join.await {
            error!("Alert worker terminated abnormally: {}", e);
        }
        info!("Alert queue shut down");
    }
}

struct AlertWorker {
    alerts: Arc<dyn AlertService>,
    case_store: Arc<dyn CaseStore>,
    metrics: Arc<WorkflowMetrics>,
    state_machine: CaseStateMachine,
}

impl AlertWorker {
    async fn run(self, mut receiver: mpsc::Receiver<AlertJob>, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                job = receiver.recv() => match job {
                    Some(job) => self.process(job).await,
                    None => break,
                },
                _ = shutdown_rx.recv() => {
                    info!("Alert worker draining pending jobs");
                    receiver.close();
                    while let Some(job) = receiver.recv().await {
                        self.process(job).await;
                    }
                    break;
                }
            }
        }
        info!("Alert worker stopped");
    }

    async fn process(&self, job: AlertJob) {
        let case_id = job.request.case_id;

        // 投递在独立任务中执行，投递实现 panic 不会带走工作任务
        let alerts = self.alerts.clone();
        let request = job.request;
        let outcome = match tokio::spawn(async move { alerts.dispatch(request).await }).await {
            Ok(result) => result,
            Err(e) => Err(GoldenError::Internal(format!("Alert task panicked: {}", e))),
        };

        let (event, token, note) = match outcome {
            Ok(receipt) => {
                self.metrics.record_alert("delivered");
                (CaseEvent::AlertDelivered, Some(receipt.token), None)
            }
            Err(e) => {
                error!("Alert {} for case {} failed: {}", job.alert_id, case_id, e);
                self.metrics.record_alert("failed");
                (CaseEvent::AlertFailed, None, Some(e.to_string()))
            }
        };

        if let Err(e) = self.record_outcome(case_id, event, token, note).await {
            error!("Failed to record alert outcome for case {}: {}", case_id, e);
        }
    }

    async fn record_outcome(
        &self,
        case_id: Uuid,
        event: CaseEvent,
        token: Option<String>,
        note: Option<String>,
    ) -> Result<()> {
        let mut record = match self.case_store.get(case_id).await? {
            Some(record) => record,
            None => {
                warn!("Case {} missing from store while recording alert outcome", case_id);
                CaseRecord::new(case_id)
            }
        };

        let next = self.state_machine.transition(record.status, event)?;
        record.delivery_token = token;
        record.note = note;
        record.advance(next);
        self.case_store.update(record).await?;
        self.metrics.record_case(next);

        Ok(())
    }
}
