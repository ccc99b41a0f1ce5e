#![allow(missing_docs)]

#[macro_use]
mod common;

use common::{configured_launch, init_test_logging, plain};
use launchspan::sink::zipkin::wire::ZipkinSpan;
use launchspan::{
    CallPhase, Dispatcher, ExportError, TraceSink, Tracer, TracerConfig, ZipkinSink,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type Delivered = Arc<Mutex<Vec<ZipkinSpan>>>;

fn zipkin_tracer(config: &TracerConfig) -> (Arc<ZipkinSink>, Arc<Tracer>, Delivered) {
    let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
    let out = Arc::clone(&delivered);
    let sink = Arc::new(
        ZipkinSink::new(config, move |batch: &[ZipkinSpan]| -> Result<(), ExportError> {
            out.lock().extend_from_slice(batch);
            Ok(())
        })
        .expect("sink"),
    );
    let tracer = Arc::new(Tracer::new(config, sink.clone()));
    (sink, tracer, delivered)
}

#[test]
fn replayed_launch_exports_one_trace() {
    init_test_logging();
    test_phase!("replay");
    let config = TracerConfig::default().with_batch_size(2);
    let (sink, tracer, delivered) = zipkin_tracer(&config);
    let dispatcher = Dispatcher::new(tracer.clone());

    for record in configured_launch("myKernel", &[0xAAAA, 0xBBBB]) {
        assert!(dispatcher.dispatch(&record).is_clean());
    }
    test_phase!("shutdown");
    let drained = tracer.shutdown();
    assert_with_log!(drained, "drained", true, drained);

    let spans = delivered.lock();
    // configure, two binds, launch, root
    assert_with_log!(spans.len() == 5, "exported spans", 5, spans.len());
    let trace_id = sink.trace_id().to_hex();
    assert!(spans.iter().all(|s| s.trace_id == trace_id));

    let root = spans.iter().find(|s| s.name == "global").expect("root");
    assert!(root.parent_id.is_none());
    assert_eq!(root.id, tracer.root().to_hex());
    assert_eq!(spans.last().map(|s| s.name.as_str()), Some("global"));

    let launch = spans.iter().find(|s| s.name == "cudaLaunch").expect("launch");
    assert_eq!(launch.parent_id.as_deref(), Some(root.id.as_str()));
    let tag = |key: &str| {
        launch
            .binary_annotations
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.clone())
    };
    assert_eq!(tag("kernel.symbol").as_deref(), Some("myKernel"));
    assert_eq!(tag("kernel.args").as_deref(), Some("0xaaaa,0xbbbb"));
    let cs = &launch.annotations[0];
    assert_eq!(cs.value, "cs");
    let endpoint = cs.endpoint.as_ref().expect("endpoint");
    assert_eq!(endpoint.service_name, "service_name");
    assert_eq!(endpoint.port, 9411);

    let stats = sink.stats();
    assert_eq!(stats.exported, 5);
    assert_eq!(stats.dropped, 0);
    test_complete!("replayed_launch_exports_one_trace");
}

#[test]
fn wire_json_uses_v1_field_names() {
    init_test_logging();
    let (_sink, tracer, delivered) = zipkin_tracer(&TracerConfig::default());
    let dispatcher = Dispatcher::new(tracer.clone());
    dispatcher.dispatch(&plain(CallPhase::Enter, "cudaMalloc"));
    dispatcher.dispatch(&plain(CallPhase::Exit, "cudaMalloc"));
    tracer.shutdown();

    let spans = delivered.lock();
    let json = serde_json::to_value(&spans[0]).expect("json");
    for field in ["traceId", "id", "parentId", "name", "timestamp", "duration", "annotations", "binaryAnnotations"] {
        assert!(json.get(field).is_some(), "missing {field}");
    }
    assert_eq!(json["annotations"][0]["endpoint"]["serviceName"], "service_name");
    assert_eq!(json["annotations"][0]["endpoint"]["ipv4"], "127.0.0.1");
    test_complete!("wire_json_uses_v1_field_names");
}

#[test]
fn failing_collector_never_reaches_the_caller() {
    init_test_logging();
    let config = TracerConfig::default().with_batch_size(1);
    let sink = Arc::new(
        ZipkinSink::new(&config, |_batch: &[ZipkinSpan]| -> Result<(), ExportError> {
            Err(ExportError::Request("connection refused".into()))
        })
        .expect("sink"),
    );
    let tracer = Arc::new(Tracer::new(&config, sink.clone()));
    let dispatcher = Dispatcher::new(tracer.clone());

    for _ in 0..3 {
        let enter = dispatcher.dispatch(&plain(CallPhase::Enter, "cudaFree"));
        let exit = dispatcher.dispatch(&plain(CallPhase::Exit, "cudaFree"));
        assert!(enter.is_clean() && exit.is_clean());
    }
    tracer.shutdown();

    let stats = sink.stats();
    assert_with_log!(stats.exported == 0, "nothing exported", 0, stats.exported);
    assert_eq!(stats.dropped, 4);
    assert_eq!(stats.failed_batches, 4);
    test_complete!("failing_collector_never_reaches_the_caller");
}

#[test]
fn endpoint_change_applies_to_later_submissions() {
    init_test_logging();
    let (_sink, tracer, delivered) = zipkin_tracer(&TracerConfig::default());
    let dispatcher = Dispatcher::new(tracer.clone());

    dispatcher.dispatch(&plain(CallPhase::Enter, "first"));
    dispatcher.dispatch(&plain(CallPhase::Exit, "first"));
    tracer.set_endpoint(launchspan::ServiceEndpoint::new(
        "renamed",
        std::net::Ipv4Addr::new(10, 0, 0, 1),
        9000,
    ));
    dispatcher.dispatch(&plain(CallPhase::Enter, "second"));
    dispatcher.dispatch(&plain(CallPhase::Exit, "second"));
    assert!(tracer.sink().flush(Duration::from_secs(5)));

    let spans = delivered.lock();
    let service = |name: &str| {
        spans
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.annotations[0].endpoint.as_ref())
            .map(|e| e.service_name.clone())
    };
    assert_eq!(service("first").as_deref(), Some("service_name"));
    assert_eq!(service("second").as_deref(), Some("renamed"));
    test_complete!("endpoint_change_applies_to_later_submissions");
}
