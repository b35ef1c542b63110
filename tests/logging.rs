use spark_collections::{Backpressure, ChangeEvent, ObservableList, ObservableOptions, ObservableSet};
use std::fmt;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Debug, Clone)]
struct Record {
    level: Level,
    message: String,
    collection: String,
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    collection: String,
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "collection" {
            self.collection = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "collection" => self.collection = format!("{value:?}").trim_matches('"').to_string(),
            _ => {}
        }
    }
}

#[derive(Clone, Default)]
struct Capture {
    records: Arc<Mutex<Vec<Record>>>,
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);
        self.records.lock().unwrap().push(Record {
            level: *event.metadata().level(),
            message: visitor.message,
            collection: visitor.collection,
        });
    }
}

fn captured<F: FnOnce()>(f: F) -> Vec<Record> {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    tracing::subscriber::with_default(subscriber, f);
    let records = capture.records.lock().unwrap().clone();
    records
}

#[test]
fn test_failing_listener_is_logged_as_warning() {
    let records = captured(|| {
        let set = ObservableSet::with_options(ObservableOptions::named("tags")).unwrap();
        set.listen(|_: &ChangeEvent<&str>| panic!("boom")).unwrap();
        set.insert("rust").unwrap();
        assert_eq!(set.subscriber_failures(), 1);
    });

    let warning = records
        .iter()
        .find(|r| r.level == Level::WARN)
        .expect("a warning for the failed callback");
    assert_eq!(warning.message, "subscriber callback failed");
    assert_eq!(warning.collection, "tags");
}

#[test]
fn test_dropped_event_is_logged_as_warning() {
    let records = captured(|| {
        let options = ObservableOptions::named("queue")
            .with_backpressure(Backpressure::DropNewest { capacity: 1 });
        let list = ObservableList::with_options(options).unwrap();
        let events = list.subscribe().unwrap();
        list.push(1).unwrap();
        list.push(2).unwrap();
        assert_eq!(events.dropped_events(), 1);
    });

    assert!(records
        .iter()
        .any(|r| r.level == Level::WARN && r.message == "subscriber queue full, event dropped"));
}

#[test]
fn test_listener_queue_overflow_is_logged_as_warning() {
    let options =
        ObservableOptions::named("alerts").with_backpressure(Backpressure::DropNewest { capacity: 1 });
    let list = Arc::new(ObservableList::with_options(options).unwrap());
    let turnstile = Arc::new(Barrier::new(2));

    let inside = turnstile.clone();
    list.listen(move |event: &ChangeEvent<u32>| {
        if event.sequence() == 1 {
            inside.wait();
            inside.wait();
        }
    })
    .unwrap();

    // Another thread delivers the first event and stays inside the listener
    let writer = {
        let list = list.clone();
        thread::spawn(move || list.push(0).unwrap())
    };
    turnstile.wait();

    let records = captured(|| {
        list.push(1).unwrap();
        list.push(2).unwrap();
    });
    turnstile.wait();
    writer.join().unwrap();
    list.flush();

    assert_eq!(list.dropped_events(), 1);
    let warning = records
        .iter()
        .find(|r| r.message == "listener queue full, event dropped")
        .expect("a warning for the dropped event");
    assert_eq!(warning.level, Level::WARN);
    assert_eq!(warning.collection, "alerts");
}

#[test]
fn test_lifecycle_is_logged_at_debug() {
    let records = captured(|| {
        let list: ObservableList<u8> = ObservableList::with_options(ObservableOptions::named("jobs")).unwrap();
        let _events = list.subscribe().unwrap();
        list.dispose();
    });

    let debug: Vec<&str> = records
        .iter()
        .filter(|r| r.level == Level::DEBUG && r.collection == "jobs")
        .map(|r| r.message.as_str())
        .collect();
    assert!(debug.contains(&"subscriber registered"));
    assert!(debug.contains(&"disposing collection"));
    assert!(debug.contains(&"registry closed"));
}
