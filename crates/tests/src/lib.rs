//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! Covers:
//! - Contract smoke tests
//! - Config resolution -> orchestrator -> in-process collaborators

#[cfg(test)]
mod contract_tests {
    use contracts::{Phase, StreamerRole};

    #[test]
    fn test_labels_are_stable() {
        // Metric and log labels are part of the operational interface.
        assert_eq!(Phase::Connect.to_string(), "connect");
        assert_eq!(Phase::Disconnect.as_str(), "disconnect");
        assert_eq!(StreamerRole::Dispatch.to_string(), "dispatch");
        assert_eq!(StreamerRole::Registry.as_str(), "registry");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{env, ConfigLoader};
    use contracts::{
        dispatch_channel, BoxError, CancellationToken, ContainerRequest, ContractError, Phase,
        ServiceConfig, StreamerRole,
    };
    use lifecycle::mock::{
        EventLog, LifecycleEvent, MockBrokerConfig, MockBrokerConnection, ScriptedStreamer,
        StreamBehavior,
    };
    use lifecycle::{
        DispatchStreamer, Orchestrator, OrchestratorConfig, RequestHandler, RunError, StopReason,
    };

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (env::REGISTRY_URL, "http://localhost:5000"),
            (env::MQTT_ADDRESS, "tcp://broker.local:1883"),
            (env::MQTT_TIMEOUT, "2s"),
            (env::SHUTDOWN_TIMEOUT, "300ms"),
        ]
    }

    fn identity_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[proxy]\nchannel_id = \"file-channel\"\nclient_id = \"file-client\"\nclient_key = \"file-key\""
        )
        .unwrap();
        file
    }

    fn resolve(path: &Path) -> ServiceConfig {
        ConfigLoader::load_with(lookup(&base_vars()), path).unwrap()
    }

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl RequestHandler for Recorder {
        async fn handle(&mut self, request: ContainerRequest) -> Result<(), BoxError> {
            self.seen.lock().unwrap().push(request.app_name);
            Ok(())
        }
    }

    /// End-to-end: TOML identity fallback -> orchestrator -> dispatch handler
    #[tokio::test]
    async fn test_e2e_config_to_dispatch() {
        let file = identity_file();
        let config = resolve(file.path());
        assert_eq!(config.mqtt.channel_id, "file-channel");
        assert_eq!(config.shutdown_timeout, Duration::from_millis(300));

        let log = EventLog::new();
        let conn = MockBrokerConnection::new(
            MockBrokerConfig {
                address: config.mqtt.address.clone(),
                seed_requests: vec![ContainerRequest::new("hello-wasm")],
                ..Default::default()
            },
            log.clone(),
        );
        let (tx, rx) = dispatch_channel(16);
        let recorder = Recorder::default();
        let seen = Arc::clone(&recorder.seen);
        let dispatch = DispatchStreamer::new("dispatch", rx, recorder);
        let metrics = dispatch.metrics();
        let registry = ScriptedStreamer::new("registry", StreamBehavior::UntilCancelled, log.clone());

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        let watcher = tokio::spawn(async move {
            while metrics.handled_count() < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            canceller.cancel();
        });

        let orchestrator = Orchestrator::new(OrchestratorConfig::from_service(&config));
        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.run(&ctx, conn, tx, dispatch, registry),
        )
        .await
        .unwrap()
        .unwrap();
        watcher.await.unwrap();

        assert_eq!(stats.stop_reason, StopReason::Cancelled);
        assert!(stats.disconnected_cleanly);
        assert_eq!(*seen.lock().unwrap(), vec!["hello-wasm"]);
        assert_eq!(
            log.events().first(),
            Some(&LifecycleEvent::Connect),
            "connect precedes everything"
        );
        assert_eq!(log.events().last(), Some(&LifecycleEvent::Disconnect));
    }

    /// Scenario: A runs indefinitely, B errors
    #[tokio::test]
    async fn test_e2e_registry_failure_tags_registry_streamer() {
        let file = identity_file();
        let config = resolve(file.path());

        let log = EventLog::new();
        let conn = MockBrokerConnection::new(MockBrokerConfig::default(), log.clone());
        let (tx, rx) = dispatch_channel(4);
        let dispatch = DispatchStreamer::new("dispatch", rx, lifecycle::LoggingHandler);
        let registry = ScriptedStreamer::new(
            "registry",
            StreamBehavior::fail_after(Duration::from_millis(20), "chunk fetch failed: 503"),
            log.clone(),
        );

        let err = Orchestrator::new(OrchestratorConfig::from_service(&config))
            .run(&CancellationToken::new(), conn, tx, dispatch, registry)
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Phase::Stream);
        assert_eq!(err.streamer_role(), Some(StreamerRole::Registry));
        assert!(matches!(err, RunError::Stream { ref name, .. } if name == "registry"));
        assert_eq!(log.count(&LifecycleEvent::Disconnect), 1);
    }

    /// Missing identity everywhere never reaches the orchestrator
    #[test]
    fn test_e2e_missing_identity_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let err = ConfigLoader::load_with(lookup(&base_vars()), &missing).unwrap_err();
        assert!(matches!(err, ContractError::ConfigNotFound { .. }));
    }

    /// Environment identity wins; the fallback file is never read
    #[test]
    fn test_e2e_env_identity_skips_fallback() {
        let mut vars = base_vars();
        vars.extend([
            (env::CHANNEL_ID, "env-channel"),
            (env::CLIENT_ID, "env-client"),
            (env::CLIENT_KEY, "env-key"),
        ]);

        let config =
            ConfigLoader::load_with(lookup(&vars), Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.mqtt.client_id, "env-client");
        assert_eq!(
            OrchestratorConfig::from_service(&config).disconnect_timeout,
            Duration::from_secs(2)
        );
    }

    /// Metrics recording works with no exporter installed
    #[tokio::test]
    async fn test_e2e_run_without_recorder() {
        let file = identity_file();
        let config = resolve(file.path());
        observability::record_phase(Phase::Connect, true);

        let log = EventLog::new();
        let conn = MockBrokerConnection::new(
            MockBrokerConfig {
                fail_subscribe: true,
                ..Default::default()
            },
            log.clone(),
        );
        let (tx, rx) = dispatch_channel(1);
        let result = Orchestrator::new(OrchestratorConfig::from_service(&config))
            .run(
                &CancellationToken::new(),
                conn,
                tx,
                DispatchStreamer::new("dispatch", rx, lifecycle::LoggingHandler),
                ScriptedStreamer::new("registry", StreamBehavior::UntilCancelled, log.clone()),
            )
            .await;

        assert!(matches!(result, Err(RunError::Subscribe { .. })));
        assert_eq!(log.count(&LifecycleEvent::Disconnect), 1);
        assert_eq!(log.count(&LifecycleEvent::StreamStarted("registry".into())), 0);
    }
}
