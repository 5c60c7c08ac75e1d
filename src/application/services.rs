use std::sync::Arc;

use base64::{prelude::BASE64_STANDARD, Engine};
use tracing::{info, warn};

use crate::{
    application::{
        dto::PredictInstance,
        ports::EndpointPort,
        sessions::Session,
    },
    domain::{
        errors::DomainResult,
        input::InspectionImage,
        verdict::{DefectPolicy, Verdict, VerdictDisplay},
    },
};

/// Runs one inspection: encode, predict, pick the winner, classify, count, display.
#[derive(Clone)]
pub struct InspectionService {
    endpoints: Arc<dyn EndpointPort>,
    policy: DefectPolicy,
}

impl InspectionService {
    pub fn new(endpoints: Arc<dyn EndpointPort>, policy: DefectPolicy) -> Self {
        Self { endpoints, policy }
    }

    pub fn endpoint_ready(&self) -> bool {
        self.endpoints.is_ready()
    }

    /// Counters in `session` only move when every step up to the prediction succeeded.
    #[tracing::instrument(
        name = "InspectionService::inspect",
        skip_all,
        fields(source = ?image.source, file = ?image.filename, bytes = image.bytes.len())
    )]
    pub async fn inspect(&self, session: &Session, image: &InspectionImage) -> DomainResult<VerdictDisplay> {
        let _inflight = session.begin().await;

        let verdict_display = match self.predict(image).await {
            Ok(verdict_display) => verdict_display,
            Err(e) => {
                warn!(kind = e.kind(), "inspection failed: {e}");
                return Err(e);
            }
        };

        let stats = session.record(verdict_display.verdict);
        info!(
            label = %verdict_display.label,
            score = verdict_display.score_percent,
            defect = verdict_display.verdict == Verdict::Defect,
            total = stats.total_inspected,
            "inspection complete"
        );
        Ok(verdict_display)
    }

    async fn predict(&self, image: &InspectionImage) -> DomainResult<VerdictDisplay> {
        let endpoint = self.endpoints.endpoint().await?;
        let instances = [PredictInstance { content: BASE64_STANDARD.encode(&image.bytes) }];
        let prediction = endpoint.predict(&instances).await?;
        Ok(VerdictDisplay::from_prediction(&prediction, &self.policy))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::PredictionPort;
    use crate::domain::{
        errors::InspectError,
        prediction::PredictionResult,
        session::SessionStats,
    };

    /// Scripted classifier: pops one reply per call and remembers what it was sent.
    #[derive(Default)]
    pub(crate) struct FakeEndpoint {
        pub replies: Mutex<Vec<DomainResult<PredictionResult>>>,
        pub seen: Mutex<Vec<PredictInstance>>,
        pub calls: AtomicUsize,
        pub fail_init: bool,
    }

    impl FakeEndpoint {
        pub fn replying(replies: Vec<DomainResult<PredictionResult>>) -> Arc<Self> {
            let mut replies = replies;
            replies.reverse();
            Arc::new(Self { replies: Mutex::new(replies), ..Default::default() })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PredictionPort for FakeEndpoint {
        async fn predict(&self, instances: &[PredictInstance]) -> DomainResult<PredictionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend_from_slice(instances);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(InspectError::MalformedResponse("no scripted reply".into())))
        }
    }

    pub(crate) struct FakeEndpoints(pub Arc<FakeEndpoint>);

    #[async_trait]
    impl EndpointPort for FakeEndpoints {
        async fn endpoint(&self) -> DomainResult<Arc<dyn PredictionPort>> {
            if self.0.fail_init {
                return Err(InspectError::Authentication("no credentials".into()));
            }
            Ok(self.0.clone())
        }

        fn is_ready(&self) -> bool {
            !self.0.fail_init
        }
    }

    pub(crate) fn prediction(labels: &[&str], confidences: &[f64]) -> DomainResult<PredictionResult> {
        PredictionResult::new(labels.iter().map(|s| s.to_string()).collect(), confidences.to_vec())
    }

    fn service(fake: &Arc<FakeEndpoint>) -> InspectionService {
        InspectionService::new(Arc::new(FakeEndpoints(fake.clone())), DefectPolicy::default())
    }

    fn upload(bytes: &[u8]) -> InspectionImage {
        InspectionImage::from_upload("weld.png", bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn sends_base64_single_instance_and_counts_defect() {
        let fake = FakeEndpoint::replying(vec![prediction(&["Normal", "Defect", "Bad Weld"], &[0.2, 0.9, 0.1])]);
        let session = Session::default();

        let display = service(&fake).inspect(&session, &upload(b"weld")).await.unwrap();

        assert_eq!(display.label, "Defect");
        assert_eq!(display.score_text(), "90.0%");
        assert_eq!(display.verdict, Verdict::Defect);
        assert_eq!(*fake.seen.lock().unwrap(), vec![PredictInstance { content: "d2VsZA==".into() }]);
        assert_eq!(
            session.snapshot(),
            SessionStats { total_inspected: 1, defect_count: 1, normal_count: 0 }
        );
    }

    #[tokio::test]
    async fn unrecognised_label_counts_as_normal() {
        let fake = FakeEndpoint::replying(vec![prediction(&["Unknown", "Defect"], &[0.7, 0.3])]);
        let session = Session::default();

        let display = service(&fake).inspect(&session, &upload(b"x")).await.unwrap();

        assert_eq!(display.verdict, Verdict::Normal);
        assert_eq!(session.snapshot().normal_count, 1);
        assert_eq!(session.snapshot().defect_count, 0);
    }

    #[tokio::test]
    async fn n_completed_predictions_give_total_n() {
        let replies = vec![
            prediction(&["DEFECT"], &[1.0]),
            prediction(&["defect", "ok"], &[0.6, 0.4]),
            prediction(&["ok"], &[0.99]),
            Err(InspectError::Transport("timeout".into())),
            prediction(&["bad weld"], &[0.51]),
        ];
        let fake = FakeEndpoint::replying(replies);
        let svc = service(&fake);
        let session = Session::default();

        let mut completed = 0;
        for _ in 0..5 {
            if svc.inspect(&session, &upload(b"x")).await.is_ok() {
                completed += 1;
            }
        }

        let stats = session.snapshot();
        assert_eq!(completed, 4);
        assert_eq!(stats.total_inspected, 4);
        assert_eq!(stats.defect_count, 3);
        assert_eq!(stats.defect_count + stats.normal_count, stats.total_inspected);
    }

    #[tokio::test]
    async fn transport_failure_leaves_counters_alone() {
        let fake = FakeEndpoint::replying(vec![
            prediction(&["Normal"], &[0.8]),
            Err(InspectError::Transport("connection reset".into())),
        ]);
        let svc = service(&fake);
        let session = Session::default();
        svc.inspect(&session, &upload(b"x")).await.unwrap();
        let before = session.snapshot();

        let err = svc.inspect(&session, &upload(b"x")).await.unwrap_err();

        assert!(err.to_string().contains("connection reset"));
        assert!(err.is_retryable());
        assert_eq!(session.snapshot(), before);
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn malformed_reply_leaves_counters_alone() {
        let fake = FakeEndpoint::replying(vec![
            prediction(&["Defect"], &[0.9]),
            Err(InspectError::MalformedResponse("response has no predictions".into())),
        ]);
        let svc = service(&fake);
        let session = Session::default();
        svc.inspect(&session, &upload(b"x")).await.unwrap();
        let before = session.snapshot();

        let err = svc.inspect(&session, &upload(b"x")).await.unwrap_err();

        assert!(matches!(err, InspectError::MalformedResponse(_)));
        assert!(!err.is_retryable());
        assert_eq!(session.snapshot(), before);
        assert_eq!(session.snapshot().total_inspected, 1);
    }

    #[tokio::test]
    async fn init_failure_never_reaches_endpoint() {
        let fake = Arc::new(FakeEndpoint { fail_init: true, ..Default::default() });
        let session = Session::default();

        let err = service(&fake).inspect(&session, &upload(b"x")).await.unwrap_err();

        assert!(matches!(err, InspectError::Authentication(_)));
        assert_eq!(fake.calls(), 0);
        assert_eq!(session.snapshot(), SessionStats::default());
    }
}
