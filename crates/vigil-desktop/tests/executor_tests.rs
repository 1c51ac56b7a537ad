#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use vigil_config::{RestrictedZone, SafetyConfig};
    use vigil_core::{
        Action, ActionOutcome, ActionSource, ActivityLog, LoggedOp, VigilError, WindowInfo,
    };
    use vigil_desktop::mock::{BackendCall, MockBackend, MockCapture};
    use vigil_desktop::{ActionExecutor, ActionOutput};
    use vigil_safety::SafetyGovernor;

    fn safety_config() -> SafetyConfig {
        SafetyConfig {
            max_actions: 100,
            window_secs: 60,
            restricted_zones: vec![RestrictedZone {
                x: 0,
                y: 0,
                width: 50,
                height: 50,
            }],
            forbidden_titles: vec!["bank".into()],
        }
    }

    struct Harness {
        backend: Arc<MockBackend>,
        capture: Arc<MockCapture>,
        log: Arc<ActivityLog>,
        executor: Arc<ActionExecutor>,
    }

    fn harness_with(backend: MockBackend, config: SafetyConfig) -> Harness {
        let backend = Arc::new(backend);
        let capture = Arc::new(MockCapture::new());
        let governor = Arc::new(SafetyGovernor::new(&config));
        let log = Arc::new(ActivityLog::new());
        let executor = Arc::new(ActionExecutor::new(
            backend.clone(),
            capture.clone(),
            governor,
            log.clone(),
        ));
        Harness {
            backend,
            capture,
            log,
            executor,
        }
    }

    fn harness() -> Harness {
        harness_with(MockBackend::new(), safety_config())
    }

    // ── Veto path ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_zone_veto_never_touches_device() {
        let h = harness();
        let result = h
            .executor
            .execute(Action::Move { x: 10, y: 10 }, ActionSource::Api)
            .await;

        match result {
            Err(VigilError::Vetoed { reason }) => assert_eq!(reason, "restricted_zone"),
            other => panic!("expected Vetoed, got {other:?}"),
        }
        assert!(h.backend.calls().is_empty());
        assert_eq!(h.log.len(), 1);
        assert_eq!(
            h.log.snapshot()[0].outcome,
            ActionOutcome::Vetoed {
                reason: "restricted_zone".into()
            }
        );
    }

    #[tokio::test]
    async fn test_allowed_move_executes_and_logs() {
        let h = harness();
        let result = h
            .executor
            .execute(Action::Move { x: 500, y: 500 }, ActionSource::Api)
            .await;

        assert!(matches!(result, Ok(ActionOutput::Ack)));
        assert_eq!(h.backend.calls(), vec![BackendCall::MovePointer { x: 500, y: 500 }]);
        assert_eq!(h.log.len(), 1);
        assert_eq!(h.log.snapshot()[0].outcome, ActionOutcome::Executed);
    }

    #[tokio::test]
    async fn test_forbidden_window_vetoed_after_resolution() {
        let backend = MockBackend::new().with_windows(vec![WindowInfo {
            id: "0x0badbank".into(),
            desktop: "0".into(),
            class: "Navigator.firefox".into(),
            title: "My Bank Login".into(),
        }]);
        let h = harness_with(backend, safety_config());

        let result = h
            .executor
            .execute(
                Action::ActivateWindow {
                    id: "0x0badbank".into(),
                },
                ActionSource::Autonomous,
            )
            .await;

        match result {
            Err(VigilError::Vetoed { reason }) => assert_eq!(reason, "forbidden_window"),
            other => panic!("expected Vetoed, got {other:?}"),
        }
        // Only the read-only resolution query reached the backend.
        assert_eq!(h.backend.calls(), vec![BackendCall::ListWindows]);
        assert_eq!(h.log.len(), 1);
    }

    #[tokio::test]
    async fn test_activate_vanished_window_is_device_failure() {
        let h = harness();
        let result = h
            .executor
            .execute(
                Action::ActivateWindow { id: "0xgone".into() },
                ActionSource::Api,
            )
            .await;

        assert!(matches!(result, Err(VigilError::Device(_))));
        assert_eq!(h.log.len(), 1);
        assert!(matches!(
            h.log.snapshot()[0].outcome,
            ActionOutcome::Failed { .. }
        ));
    }

    // ── Failure path ───────────────────────────────────────────

    #[tokio::test]
    async fn test_device_failure_logged_not_retried() {
        let h = harness();
        h.backend.fail_with("display went away");
        let result = h
            .executor
            .execute(
                Action::TypeText { text: "hello".into() },
                ActionSource::Api,
            )
            .await;

        assert!(matches!(result, Err(VigilError::Device(_))));
        // One attempt, one call, one record — no automatic retry.
        assert_eq!(h.backend.calls().len(), 1);
        assert_eq!(h.log.len(), 1);
    }

    // ── Exactly-one-record property ────────────────────────────

    #[tokio::test]
    async fn test_every_call_appends_exactly_one_record() {
        let h = harness();
        let actions = [
            Action::Move { x: 500, y: 500 },   // executed
            Action::Move { x: 10, y: 10 },     // vetoed: restricted zone
            Action::ListWindows,               // executed
            Action::Screenshot,                // executed, governor bypass
            Action::KeyChord { chord: "Return".into() }, // executed
        ];
        for (i, action) in actions.iter().enumerate() {
            let before = h.log.len();
            let _ = h.executor.execute(action.clone(), ActionSource::Api).await;
            assert_eq!(h.log.len(), before + 1, "action #{i} logged once");
        }
        assert_eq!(h.log.len(), actions.len());
    }

    // ── Screenshot bypass ──────────────────────────────────────

    #[tokio::test]
    async fn test_screenshot_bypasses_governor() {
        // A one-slot window vetoes any second governed action.
        let config = SafetyConfig {
            max_actions: 1,
            window_secs: 60,
            ..Default::default()
        };
        let h = harness_with(MockBackend::new(), config);
        // Exhaust the window.
        h.executor
            .execute(Action::ListWindows, ActionSource::Api)
            .await
            .unwrap();
        // Screenshot still goes through: read-only, not governed.
        let result = h
            .executor
            .execute(Action::Screenshot, ActionSource::Api)
            .await;
        assert!(matches!(result, Ok(ActionOutput::Frame(_))));
        assert_eq!(h.capture.capture_count(), 1);
    }

    #[tokio::test]
    async fn test_capture_failure_surfaces_and_logs() {
        let h = harness();
        h.capture.fail_with("no display");
        let result = h
            .executor
            .execute(Action::Screenshot, ActionSource::Api)
            .await;
        assert!(matches!(result, Err(VigilError::Capture(_))));
        assert_eq!(h.log.len(), 1);
    }

    // ── Concurrency ────────────────────────────────────────────

    #[tokio::test]
    async fn test_concurrent_clicks_serialize_at_device() {
        // MockBackend panics on overlapping device access; latency widens
        // the race window so interleaving would actually be caught.
        let backend = MockBackend::new().with_latency(Duration::from_millis(20));
        let h = harness_with(backend, safety_config());

        let api = {
            let executor = h.executor.clone();
            tokio::spawn(async move {
                executor
                    .execute(
                        Action::Click {
                            button: 1,
                            x: Some(500),
                            y: Some(500),
                        },
                        ActionSource::Api,
                    )
                    .await
            })
        };
        let autonomous = {
            let executor = h.executor.clone();
            tokio::spawn(async move {
                executor
                    .execute(
                        Action::Click {
                            button: 1,
                            x: Some(600),
                            y: Some(600),
                        },
                        ActionSource::Autonomous,
                    )
                    .await
            })
        };

        api.await.unwrap().unwrap();
        autonomous.await.unwrap().unwrap();

        assert_eq!(h.backend.calls().len(), 2);
        // Two sequential records, strictly ordered.
        let records = h.log.snapshot();
        assert_eq!(records.len(), 2);
        assert!(records[0].seq < records[1].seq);
        for record in &records {
            assert!(matches!(record.op, LoggedOp::Action { .. }));
            assert_eq!(record.outcome, ActionOutcome::Executed);
        }
    }
}
