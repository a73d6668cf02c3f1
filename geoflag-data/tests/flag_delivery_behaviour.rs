//! Behavioural tests for batching flags to files and uploading them as tasks.

use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use geo::Coord;
use geoflag_core::{CompleteEntity, Flag};
use geoflag_data::upload::test_support::RecordingLoader;
use geoflag_data::{
    EventService, FeatureBatcher, FileSink, FileStore, FlagEvent, MetricEvent, PipelineConfig,
    RetryPolicy, TaskBatchClient, UploadProcessor,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;
use tempfile::TempDir;

const CHECK: &str = "GapsCheck";

/// World state for delivery scenarios.
#[derive(Default)]
struct DeliveryWorld {
    service: RefCell<EventService>,
    output: RefCell<Option<(TempDir, FileStore)>>,
    loader: RefCell<Option<RecordingLoader>>,
    published: Cell<i64>,
}

impl DeliveryWorld {
    fn publish(&self, count: i64) {
        let service = self.service.borrow();
        for _ in 0..count {
            let index = self.published.get();
            self.published.set(index + 1);
            let node = CompleteEntity::node(
                (index + 1) * 1_000_000,
                Coord {
                    x: 174.0,
                    y: -41.0,
                },
            )
            .with_tag("iso_country_code", "NZL");
            let mut flag = Flag::new(format!("F{index}"));
            flag.add_object(&node);
            flag.add_instruction("Close the gap");
            service.publish_flag(&FlagEvent::new(CHECK, flag));
        }
    }

    fn batch_features(&self) -> Vec<usize> {
        let output = self.output.borrow();
        let (_, store) = output.as_ref().expect("file pipeline should be configured");
        let mut counts: Vec<usize> = store
            .list(FileSink::EXTENSION)
            .expect("list batch files")
            .iter()
            .map(|name| {
                let text = store.read_to_string(name).expect("read batch file");
                let value: Value = serde_json::from_str(&text).expect("batch file is JSON");
                value["features"].as_array().map_or(0, Vec::len)
            })
            .collect();
        counts.sort_unstable();
        counts
    }

    fn uploaded(&self) -> usize {
        self.loader
            .borrow()
            .as_ref()
            .expect("upload processor should be configured")
            .uploaded_identifiers()
            .len()
    }
}

#[fixture]
fn world() -> DeliveryWorld {
    DeliveryWorld::default()
}

// --- Given steps ---

#[given("a file pipeline with a batch size of three")]
fn given_file_pipeline(world: &DeliveryWorld) {
    let temp = TempDir::new().expect("create temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    let store = FileStore::new(root).with_retry(RetryPolicy::new(1, Duration::ZERO));
    let config = PipelineConfig::default().with_batch_size_override(3);
    world
        .service
        .borrow_mut()
        .register(FeatureBatcher::new(FileSink::new(store.clone()), &config));
    world.output.replace(Some((temp, store)));
}

#[given("an upload processor for the gaps check")]
fn given_upload_processor(world: &DeliveryWorld) {
    let loader = RecordingLoader::default();
    let processor = UploadProcessor::new([(
        CHECK.to_owned(),
        Arc::new(TaskBatchClient::new(loader.clone())) as _,
    )])
    .expect("processor should build");
    world.service.borrow_mut().register(processor);
    world.loader.replace(Some(loader));
}

// --- When steps ---

#[when("two flags are published")]
fn when_two_published(world: &DeliveryWorld) {
    world.publish(2);
}

#[when("four flags are published")]
fn when_four_published(world: &DeliveryWorld) {
    world.publish(4);
}

#[when("seven flags are published")]
fn when_seven_published(world: &DeliveryWorld) {
    world.publish(7);
}

#[when("the gaps check reports its run time")]
fn when_check_reports(world: &DeliveryWorld) {
    world
        .service
        .borrow()
        .publish_metric(&MetricEvent::timer(CHECK, Duration::from_secs(12)));
}

#[when("the service shuts down")]
fn when_shutdown(world: &DeliveryWorld) {
    assert!(world.service.borrow().complete(), "first shutdown should run");
}

// --- Then steps ---

#[then("one batch file holds two features")]
fn then_one_batch_of_two(world: &DeliveryWorld) {
    assert_eq!(world.batch_features(), vec![2]);
}

#[then("three batch files hold seven features")]
fn then_three_batches_of_seven(world: &DeliveryWorld) {
    assert_eq!(world.batch_features(), vec![1, 3, 3]);
}

#[then("no batch files are written")]
fn then_no_batches(world: &DeliveryWorld) {
    assert!(world.batch_features().is_empty());
}

#[then("two tasks are uploaded")]
fn then_two_uploaded(world: &DeliveryWorld) {
    assert_eq!(world.uploaded(), 2);
}

#[then("four tasks are uploaded")]
fn then_four_uploaded(world: &DeliveryWorld) {
    assert_eq!(world.uploaded(), 4);
}

#[then("no tasks are uploaded")]
fn then_none_uploaded(world: &DeliveryWorld) {
    assert_eq!(world.uploaded(), 0);
}

#[scenario(path = "tests/features/flag_delivery.feature", index = 0)]
fn below_batch_size(world: DeliveryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/flag_delivery.feature", index = 1)]
fn full_batches(world: DeliveryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/flag_delivery.feature", index = 2)]
fn empty_shutdown(world: DeliveryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/flag_delivery.feature", index = 3)]
fn finished_check_uploaded(world: DeliveryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/flag_delivery.feature", index = 4)]
fn shutdown_upload(world: DeliveryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/flag_delivery.feature", index = 5)]
fn late_flags_dropped(world: DeliveryWorld) {
    let _ = world;
}
