//! FILENAME: tests/test_cancellation.rs
//! Integration tests for cancellation and teardown.

mod common;

use common::{expect_rejected, groups, sales_query, TestHarness};
use pivot_loader::{LoadOptions, PivotError, TransportMessage};

/// Page size 20 with three 8-row groups: 16 rows loaded, request pending.
fn half_loaded() -> (TestHarness, pivot_loader::Deferred<pivot_loader::PageResult>) {
    let mut harness = TestHarness::new();
    let page = harness
        .service
        .load_data(Some(sales_query()), LoadOptions::with_page_size(20));
    harness.send_rows(groups(3, 8));
    assert_eq!(harness.service.loaded_rows_count(), 16);
    assert!(page.is_pending());
    (harness, page)
}

#[test]
fn test_cancel_rejects_pending_requests() {
    let (mut harness, page) = half_loaded();
    let all = harness.service.load_all_data();

    harness.service.cancel_loading();

    assert_eq!(expect_rejected(&page), PivotError::LoadingCanceled);
    assert_eq!(expect_rejected(&all), PivotError::LoadingCanceled);
    assert!(!harness.service.is_loading());
}

#[test]
fn test_cancel_detaches_from_stream() {
    let (mut harness, _page) = half_loaded();
    let chunks = harness.record_chunks();
    let before = chunks.borrow().len();

    harness.service.cancel_loading();
    assert!(!harness.service.transport().subscribed);

    harness.send_rows(groups(4, 8));
    harness.finish_data(56);

    assert_eq!(chunks.borrow().len(), before);
    assert_eq!(harness.service.loaded_rows_count(), 16);
    assert!(!harness.service.is_fully_loaded());
}

#[test]
fn test_cancel_keeps_buffered_rows() {
    let (mut harness, _page) = half_loaded();
    harness.service.cancel_loading();

    let page = harness.service.get_selected_page_data(0, None).unwrap();
    assert_eq!(page.row_range, 0..16);
    assert!(page.is_last_page);
}

#[test]
fn test_requests_after_cancel_fail_instead_of_hanging() {
    let (mut harness, _page) = half_loaded();
    harness.service.cancel_loading();

    let page = harness.service.load_data(None, LoadOptions::with_page_size(20));
    assert_eq!(expect_rejected(&page), PivotError::LoadingCanceled);

    // Enough rows are buffered for a smaller page.
    let small = harness.service.load_data(None, LoadOptions::with_page_size(10));
    assert_eq!(common::expect_resolved(&small).row_range, 0..10);

    let all = harness.service.load_all_data();
    assert_eq!(expect_rejected(&all), PivotError::LoadingCanceled);
}

#[test]
fn test_new_query_after_cancel_reattaches() {
    let (mut harness, _page) = half_loaded();
    harness.service.cancel_loading();

    let page = harness
        .service
        .load_data(Some(common::other_query()), LoadOptions::with_page_size(5));
    assert!(harness.service.is_attached());
    assert_eq!(harness.service.transport().subscribe_calls, 2);

    harness.send_rows(groups(2, 5));
    assert_eq!(common::expect_resolved(&page).loaded_rows_count, 5);
}

#[test]
fn test_same_query_after_cancel_restarts_stream() {
    let (mut harness, _page) = half_loaded();
    harness.service.cancel_loading();

    let page = harness
        .service
        .load_data(Some(sales_query()), LoadOptions::with_page_size(20));
    assert!(harness.service.is_attached());
    assert_eq!(harness.service.transport().issue_count(), 2);
    assert_eq!(harness.service.loaded_rows_count(), 0);
    assert!(page.is_pending());

    harness.send_rows(groups(3, 8));
    assert!(page.is_pending());
    harness.finish_data(24);
    let page = common::expect_resolved(&page);
    assert_eq!(page.row_range, 0..20);
    assert_eq!(page.loaded_rows_count, 24);
}

#[test]
fn test_scheduled_tick_after_cancel_settles_nothing() {
    let mut harness = TestHarness::throttled();
    let page = harness
        .service
        .load_data(Some(sales_query()), LoadOptions::with_page_size(10));
    harness.send_rows(groups(3, 5));
    assert!(harness.service.next_deadline().is_some());

    harness.service.cancel_loading();
    let chunks = harness.record_chunks();

    // The tick still normalizes the closed chunk but reports nothing.
    assert!(harness.advance(100));
    assert_eq!(harness.service.loaded_rows_count(), 10);
    assert!(chunks.borrow().is_empty());
    assert_eq!(expect_rejected(&page), PivotError::LoadingCanceled);
}

#[test]
fn test_destroy_clears_subscribers_and_data() {
    let (mut harness, page) = half_loaded();
    let chunks = harness.record_chunks();
    let before = chunks.borrow().len();

    harness.service.destroy();
    assert_eq!(expect_rejected(&page), PivotError::LoadingCanceled);
    assert!(!harness.service.events_mut().data_chunk_loaded.has_subscribers());
    assert_eq!(harness.service.loaded_rows_count(), 0);

    harness.send_rows(groups(3, 8));
    harness.send(TransportMessage::Finish);
    assert_eq!(chunks.borrow().len(), before);
    assert_eq!(
        harness.service.get_indexed_page_data(0, 10, false).unwrap_err(),
        PivotError::Destroyed
    );
}
