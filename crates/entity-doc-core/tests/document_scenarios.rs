mod common;

use common::fixtures::{content_type, entry, locales, open, open_ready, service_with};
use common::{init_tracing, wait_until, TIMEOUT};
use entity_doc_core::normalizer::{normalize, Repair};
use entity_doc_core::remote::memory::OpKind;
use entity_doc_core::{path, DocumentApi, DocumentError, DocumentState, Path};
use serde_json::json;

#[tokio::test]
async fn load_then_normalize_drops_inactive_locales() {
    init_tracing();
    let service = service_with(json!({"fields": {"title": {"en": "x", "de": "y"}}}));
    let doc = open_ready(&service).await;

    let snapshot = doc.get_value_at(&Path::root()).unwrap();
    let repairs = normalize(&doc, &snapshot, &content_type(&["title"]), &locales(&["en"]))
        .await
        .unwrap();

    assert_eq!(
        repairs,
        vec![Repair::RemoveLocale {
            field: "title".into(),
            locale: "de".into()
        }]
    );
    assert_eq!(doc.get_value_at(&path!["fields"]), Some(json!({"title": {"en": "x"}})));
    let remote = service.document(&entry()).unwrap();
    assert_eq!(remote["fields"], json!({"title": {"en": "x"}}));
}

#[tokio::test]
async fn normalize_resets_malformed_fields_through_the_document() {
    init_tracing();
    let service = service_with(json!({"fields": "garbage"}));
    let doc = open_ready(&service).await;
    let snapshot = doc.get_value_at(&Path::root()).unwrap();

    normalize(&doc, &snapshot, &content_type(&[]), &locales(&["en"]))
        .await
        .unwrap();

    assert_eq!(doc.get_value_at(&path!["fields"]), Some(json!({})));
    let log = service.log(&entry());
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, OpKind::Set);
    assert_eq!(log[0].path, path!["fields"]);
}

#[tokio::test]
async fn set_updates_property_before_resolving() {
    init_tracing();
    let service = service_with(json!({"sys": {"version": 5}, "fields": {"title": {"en": "x"}}}));
    let doc = open_ready(&service).await;
    let mut title = doc.value_property_at(&path!["fields", "title"]);
    assert_eq!(*title.borrow_and_update(), Some(json!({"en": "x"})));

    let version = doc
        .set_value_at(path!["fields", "title", "en"], json!("new"))
        .await
        .unwrap();

    assert_eq!(version, 6);
    // The update is visible without yielding to the runtime again.
    assert!(title.has_changed().unwrap());
    assert_eq!(*title.borrow_and_update(), Some(json!({"en": "new"})));
    assert_eq!(doc.get_value_at(&path!["fields", "title", "en"]), Some(json!("new")));
    assert_eq!(doc.version(), 6);
    assert_eq!(doc.sys_property().borrow().version, 6);
}

#[tokio::test]
async fn writes_issued_before_ready_apply_in_call_order() {
    init_tracing();
    let service = service_with(json!({"fields": {"title": {"en": "x"}}}));
    service.pause_opens();
    let doc = open(&service);

    let first = doc.set_value_at(path!["fields", "title", "en"], json!("first"));
    let second = doc.set_value_at(path!["fields", "title", "en"], json!("second"));
    assert_ne!(doc.state(), DocumentState::Ready);
    service.resume_opens();

    let (first, second) = tokio::time::timeout(TIMEOUT, async { (first.await, second.await) })
        .await
        .unwrap();
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(first < second);

    let log = service.log(&entry());
    let versions: Vec<_> = log.iter().map(|op| op.version).collect();
    assert_eq!(versions, vec![first, second]);
    assert_eq!(doc.get_value_at(&path!["fields", "title", "en"]), Some(json!("second")));
    assert_eq!(service.document(&entry()).unwrap()["fields"]["title"]["en"], json!("second"));
}

#[tokio::test]
async fn set_under_missing_parent_creates_the_path() {
    init_tracing();
    let service = service_with(json!({"fields": {}}));
    let doc = open_ready(&service).await;

    let version = doc
        .set_value_at(path!["fields", "body", "en"], json!("hello"))
        .await
        .unwrap();

    assert_eq!(doc.get_value_at(&path!["fields", "body", "en"]), Some(json!("hello")));
    assert_eq!(doc.version(), version);
    let log = service.log(&entry());
    let paths: Vec<_> = log.iter().map(|op| op.path.clone()).collect();
    assert_eq!(paths, vec![path!["fields", "body"], path!["fields", "body", "en"]]);
}

#[tokio::test]
async fn insert_under_missing_parent_is_not_retried() {
    init_tracing();
    let service = service_with(json!({"fields": {}}));
    let doc = open_ready(&service).await;

    let err = doc
        .insert_value_at(path!["fields", "tags", "en", 0usize], json!("a"))
        .await
        .unwrap_err();

    assert!(err.is_missing_parent());
    assert!(service.log(&entry()).is_empty());
}

#[tokio::test]
async fn set_past_the_end_of_a_missing_array_is_refused() {
    init_tracing();
    let service = service_with(json!({"fields": {}}));
    let doc = open_ready(&service).await;

    let err = doc
        .set_value_at(path!["fields", "list", 2usize, "x"], json!(1))
        .await
        .unwrap_err();

    assert!(err.is_missing_parent());
    assert!(service.log(&entry()).is_empty());
    assert_eq!(doc.get_value_at(&path!["fields"]), Some(json!({})));
}

#[tokio::test]
async fn array_mutations_round_trip() {
    init_tracing();
    let service = service_with(json!({"fields": {"tags": {"en": ["a", "c"]}}}));
    let doc = open_ready(&service).await;
    let tags = path!["fields", "tags", "en"];

    doc.insert_value_at(tags.child(1usize), json!("b")).await.unwrap();
    doc.push_value_at(tags.clone(), json!("d")).await.unwrap();
    doc.move_value_at(tags.clone(), 3, 0).await.unwrap();
    doc.remove_value_at(tags.child(1usize)).await.unwrap();

    let expected = json!(["d", "b", "c"]);
    assert_eq!(doc.get_value_at(&tags), Some(expected.clone()));
    assert_eq!(service.document(&entry()).unwrap()["fields"]["tags"]["en"], expected);
}

#[tokio::test]
async fn rejected_write_leaves_cache_unchanged() {
    init_tracing();
    let service = service_with(json!({"fields": {"title": {"en": "x"}}}));
    let doc = open_ready(&service).await;
    let mut title = doc.value_property_at(&path!["fields", "title", "en"]);
    title.borrow_and_update();
    service.deny_writes(&entry(), true);

    let err = doc
        .set_value_at(path!["fields", "title", "en"], json!("y"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DocumentError::Remote(entity_doc_core::RemoteError::PermissionDenied)
    );
    assert_eq!(doc.get_value_at(&path!["fields", "title", "en"]), Some(json!("x")));
    assert!(!title.has_changed().unwrap());
}

#[tokio::test]
async fn properties_are_hot_from_first_subscription() {
    init_tracing();
    let service = service_with(json!({"fields": {"title": {"en": "x"}}}));
    let doc = open(&service);
    // Subscribed before load: receives the loaded value once ready.
    let mut early = doc.value_property_at(&path!["fields", "title", "en"]);
    doc.ready().await.unwrap();
    assert_eq!(wait_until(&mut early, Option::is_some).await, Some(json!("x")));

    let late = doc.value_property_at(&path!["fields", "title", "en"]);
    assert_eq!(*late.borrow(), Some(json!("x")));
}
