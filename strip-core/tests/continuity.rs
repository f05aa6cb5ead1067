//! End-to-end continuity scenarios against scripted collaborators.

use strip_core::error::AdvanceError;
use strip_core::store::EpisodeStore;
use strip_core::sweep::{run_sweep, SweepPolicy};
use strip_core::testing::TestHarness;

const PREMISE: &str = "A banana detective solving a mystery in space";

#[tokio::test]
async fn end_to_end_two_issues_with_continuity() {
    let harness = TestHarness::new();

    // Admission from origin A.
    harness.queue_admission("Banana Detective");
    let admission = harness
        .gate
        .admit(PREMISE, "203.0.113.7")
        .await
        .expect("admission should run");
    assert!(admission.accepted);
    let comic_id = admission.comic_id.unwrap();

    // Registration with a valid email.
    harness
        .registrar
        .register(
            &comic_id,
            &admission.fingerprint,
            PREMISE,
            "reader@example.com",
            "203.0.113.7",
        )
        .await
        .expect("registration should succeed");

    // First cycle: no reference image, issue number 1.
    harness.queue_cycle("1) Panel 1 - VISUAL: banana at desk. DIALOG: \"Another case.\"");
    let first = harness.engine.advance(&comic_id).await.unwrap();
    assert_eq!(first.issue_number, 1);
    assert!(
        harness.bucket.fetched().is_empty(),
        "first episode must not fetch a reference artifact"
    );
    let render_requests = harness.image.requests();
    assert!(render_requests[0].reference.is_none());

    // Second cycle, simulating the next day: the previous direction is the
    // continuity context and the previous artifact is the visual reference.
    harness.queue_cycle("1) Panel 1 - VISUAL: banana finds clue. DIALOG: \"Peel slowly.\"");
    let second = harness.engine.advance(&comic_id).await.unwrap();
    assert_eq!(second.issue_number, 2);
    assert_ne!(second.artifact_url, first.artifact_url);

    let text_requests = harness.text.requests();
    let second_direction_request = &text_requests[3];
    assert!(second_direction_request
        .instruction
        .contains("Another case."));
    assert!(second_direction_request
        .instruction
        .contains("Previous episode directions"));

    let render_requests = harness.image.requests();
    assert!(render_requests[1].reference.is_some());
    assert_eq!(harness.bucket.fetched(), vec![first.artifact_url.clone()]);

    // Both issues were delivered, each carrying an unsubscribe capability.
    let sent = harness.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].subject, "Daily Comic #1 - Banana Detective");
    assert_eq!(sent[1].subject, "Daily Comic #2 - Banana Detective");
    let sig = harness.signer.issue(&comic_id);
    assert!(sent[1].html.contains(&sig));
}

#[tokio::test]
async fn advance_requires_owner_email() {
    let harness = TestHarness::new();
    harness.queue_admission("Banana Detective");
    let admission = harness.gate.admit(PREMISE, "203.0.113.7").await.unwrap();
    let comic_id = admission.comic_id.unwrap();

    let result = harness.engine.advance(&comic_id).await;
    assert!(matches!(result, Err(AdvanceError::NotEligible(_))));
    assert!(harness.mailer.sent().is_empty());
}

#[tokio::test]
async fn failed_image_generation_writes_no_episode() {
    let harness = TestHarness::new();
    harness.queue_admission("Banana Detective");
    let admission = harness.gate.admit(PREMISE, "203.0.113.7").await.unwrap();
    let comic_id = admission.comic_id.unwrap();
    harness
        .registrar
        .register(
            &comic_id,
            &admission.fingerprint,
            PREMISE,
            "reader@example.com",
            "203.0.113.7",
        )
        .await
        .unwrap();

    harness.text.queue("1) Panel 1 - VISUAL: x. DIALOG: \"y\"");
    harness.image.queue_error(strip_core::error::ProviderError::Unusable(
        "model did not return an image file".to_string(),
    ));

    let result = harness.engine.advance(&comic_id).await;
    assert!(matches!(result, Err(AdvanceError::Generation(_))));
    assert_eq!(harness.store.episode_count(&comic_id).await.unwrap(), 0);
    assert!(harness.mailer.sent().is_empty());
    assert_eq!(harness.bucket.object_count(), 0);
}

#[tokio::test]
async fn unreachable_reference_artifact_fails_the_cycle() {
    let harness = TestHarness::new();
    harness.queue_admission("Banana Detective");
    let admission = harness.gate.admit(PREMISE, "203.0.113.7").await.unwrap();
    let comic_id = admission.comic_id.unwrap();
    harness
        .registrar
        .register(
            &comic_id,
            &admission.fingerprint,
            PREMISE,
            "reader@example.com",
            "203.0.113.7",
        )
        .await
        .unwrap();

    harness.queue_cycle("1) Panel 1 - VISUAL: x. DIALOG: \"y\"");
    harness.engine.advance(&comic_id).await.unwrap();

    // Second cycle cannot silently continue without its reference.
    harness.bucket.fail_gets();
    harness.queue_cycle("1) Panel 1 - VISUAL: z. DIALOG: \"w\"");
    let result = harness.engine.advance(&comic_id).await;
    assert!(matches!(result, Err(AdvanceError::ArtifactFetch { .. })));
    assert_eq!(harness.store.episode_count(&comic_id).await.unwrap(), 1);
}

#[tokio::test]
async fn delivery_failure_does_not_roll_back_the_episode() {
    let harness = TestHarness::new();
    harness.queue_admission("Banana Detective");
    let admission = harness.gate.admit(PREMISE, "203.0.113.7").await.unwrap();
    let comic_id = admission.comic_id.unwrap();
    harness
        .registrar
        .register(
            &comic_id,
            &admission.fingerprint,
            PREMISE,
            "reader@example.com",
            "203.0.113.7",
        )
        .await
        .unwrap();

    harness.mailer.fail_sends();
    harness.queue_cycle("1) Panel 1 - VISUAL: x. DIALOG: \"y\"");

    let advanced = harness
        .engine
        .advance(&comic_id)
        .await
        .expect("the cycle commits before notification");
    assert_eq!(advanced.issue_number, 1);
    assert_eq!(harness.store.episode_count(&comic_id).await.unwrap(), 1);
}

#[tokio::test]
async fn sweep_isolates_per_series_failures() {
    let harness = TestHarness::new();

    for (premise, email) in [
        ("A banana detective solving a mystery in space", "a@example.com"),
        ("A shy robot learning to garden", "b@example.com"),
    ] {
        harness.queue_admission("Some Title");
        let admission = harness.gate.admit(premise, "203.0.113.7").await.unwrap();
        harness
            .registrar
            .register(
                &admission.comic_id.unwrap(),
                &admission.fingerprint,
                premise,
                email,
                "203.0.113.7",
            )
            .await
            .unwrap();
    }

    // Only one cycle's worth of responses: the second series fails.
    harness.queue_cycle("1) Panel 1 - VISUAL: x. DIALOG: \"y\"");

    let report = run_sweep(&harness.engine, harness.store.as_ref(), &SweepPolicy::default())
        .await
        .unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.processed, 1);
}

#[tokio::test]
async fn sweep_retries_a_failed_series_within_its_attempt_budget() {
    let harness = TestHarness::new();
    harness.queue_admission("Banana Detective");
    let admission = harness.gate.admit(PREMISE, "203.0.113.7").await.unwrap();
    let comic_id = admission.comic_id.unwrap();
    harness
        .registrar
        .register(
            &comic_id,
            &admission.fingerprint,
            PREMISE,
            "reader@example.com",
            "203.0.113.7",
        )
        .await
        .unwrap();

    // First attempt fails at direction generation; the second succeeds.
    harness.text.queue_error(strip_core::error::ProviderError::Network(
        "connection reset".to_string(),
    ));
    harness.queue_cycle("1) Panel 1 - VISUAL: x. DIALOG: \"y\"");

    let policy = SweepPolicy { max_attempts: 2 };
    let report = run_sweep(&harness.engine, harness.store.as_ref(), &policy)
        .await
        .unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(harness.store.episode_count(&comic_id).await.unwrap(), 1);
}

#[tokio::test]
async fn unsubscribe_removes_series_and_history() {
    let harness = TestHarness::new();
    harness.queue_admission("Banana Detective");
    let admission = harness.gate.admit(PREMISE, "203.0.113.7").await.unwrap();
    let comic_id = admission.comic_id.unwrap();
    harness
        .registrar
        .register(
            &comic_id,
            &admission.fingerprint,
            PREMISE,
            "reader@example.com",
            "203.0.113.7",
        )
        .await
        .unwrap();
    harness.queue_cycle("1) Panel 1 - VISUAL: x. DIALOG: \"y\"");
    harness.engine.advance(&comic_id).await.unwrap();

    // A forged signature never deletes.
    let forged = harness.signer.issue(&strip_core::ComicId::new());
    let result = harness
        .signer
        .unsubscribe(harness.store.as_ref(), &comic_id.to_string(), &forged)
        .await;
    assert!(result.is_err());
    assert_eq!(harness.store.episode_count(&comic_id).await.unwrap(), 1);

    // The genuine capability removes the series and its episodes.
    let sig = harness.signer.issue(&comic_id);
    harness
        .signer
        .unsubscribe(harness.store.as_ref(), &comic_id.to_string(), &sig)
        .await
        .unwrap();
    assert_eq!(harness.store.episode_count(&comic_id).await.unwrap(), 0);
}
