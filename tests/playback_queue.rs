use std::time::Duration;

mod common;

use common::{eventually, tracks, Harness, Options};
use vibe_rs::model::{Notice, PlaybackSource, RepeatMode, Track};
use vibe_rs::session::{AudioSession, NativeRepeatMode, NativeState, SessionEvent};
use vibe_rs::PlayerError;

#[tokio::test]
async fn starts_at_the_tapped_song_and_prefetches_ahead() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b", "c", "d"]), 1, PlaybackSource::Search)
        .await
        .unwrap();

    let now = h.controller.now_playing();
    assert_eq!(now.current_id(), Some("b"));
    assert_eq!(now.index, 0);
    assert_eq!(now.queue_len, 3);
    assert_eq!(now.source, Some(PlaybackSource::Search));
    let upcoming: Vec<&str> = now.upcoming.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(upcoming, ["c", "d"]);

    assert_eq!(h.session.active_id().as_deref(), Some("b"));
    assert_eq!(h.session.native_state(), NativeState::Playing);
    assert!(eventually(|| h.session.queued_ids() == ["b", "c", "d"]).await);

    let recents = h.controller.recently_played().await.unwrap();
    assert_eq!(recents[0].id, "b");
}

#[tokio::test]
async fn invalid_start_leaves_the_session_alone() {
    let h = Harness::start().await;

    let empty = h.controller.start_queue(vec![], 0, PlaybackSource::Home).await;
    assert!(matches!(empty, Err(PlayerError::EmptyQueue)));

    let out_of_range = h
        .controller
        .start_queue(tracks(&["a", "b"]), 5, PlaybackSource::Home)
        .await;
    assert!(matches!(
        out_of_range,
        Err(PlayerError::StartIndexOutOfRange { index: 5, len: 2 })
    ));

    assert_eq!(h.count_calls("reset"), 0);
    assert!(h.controller.now_playing().is_idle());
}

#[tokio::test]
async fn resolver_failure_keeps_the_previous_queue() {
    let mut h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b"]), 0, PlaybackSource::Home)
        .await
        .unwrap();
    h.drain_notices();

    h.resolver.fail("x");
    let result = h
        .controller
        .start_queue(tracks(&["x", "y"]), 0, PlaybackSource::Search)
        .await;

    assert!(matches!(result, Err(PlayerError::Resolve { ref track_id, .. }) if track_id == "x"));
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(h.session.active_id().as_deref(), Some("a"));
    assert_eq!(h.count_calls("reset"), 1);
    assert_eq!(
        h.drain_notices(),
        [Notice::Toast("Playback failed. Check your connection.".to_string())]
    );
}

#[tokio::test]
async fn session_failure_while_starting_leaves_nothing_half_loaded() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b", "c"]), 0, PlaybackSource::Home)
        .await
        .unwrap();
    assert!(eventually(|| h.session.queued_ids().len() == 3).await);

    h.session.fail_on("play");
    let result = h
        .controller
        .start_queue(tracks(&["x", "y"]), 0, PlaybackSource::Search)
        .await;
    assert!(matches!(result, Err(PlayerError::Session { operation: "play", .. })));

    h.settle().await;
    assert!(h.controller.now_playing().is_idle());
    assert!(h.session.queued_ids().is_empty());

    h.session.recover("play");
    h.controller.next().await.unwrap();
    assert!(h.session.queued_ids().is_empty());
    assert!(h.controller.now_playing().is_idle());
}

#[tokio::test]
async fn next_past_the_last_track_goes_idle() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b", "c"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    h.controller.next().await.unwrap();
    assert_eq!(h.current_id().as_deref(), Some("b"));
    h.controller.next().await.unwrap();
    assert_eq!(h.current_id().as_deref(), Some("c"));
    assert_eq!(h.controller.now_playing().index, 2);

    h.controller.next().await.unwrap();
    h.settle().await;
    let now = h.controller.now_playing();
    assert!(now.is_idle());
    assert_eq!(now.index, 0);
    assert!(h.session.queued_ids().is_empty());
}

#[tokio::test]
async fn previous_at_the_start_does_nothing() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    let skips = h.count_calls("skip");
    h.controller.previous().await.unwrap();

    assert_eq!(h.count_calls("skip"), skips);
    assert_eq!(h.current_id().as_deref(), Some("a"));
}

#[tokio::test]
async fn next_then_previous_returns_to_the_same_track() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b", "c"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    h.controller.next().await.unwrap();
    h.controller.previous().await.unwrap();

    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(h.session.active_id().as_deref(), Some("a"));
}

#[tokio::test]
async fn repeat_cycles_through_every_mode() {
    let h = Harness::start().await;

    assert_eq!(h.controller.toggle_repeat().await.unwrap(), RepeatMode::Queue);
    assert_eq!(h.session.repeat_mode(), NativeRepeatMode::Queue);
    assert_eq!(h.controller.toggle_repeat().await.unwrap(), RepeatMode::Track);
    assert_eq!(h.session.repeat_mode(), NativeRepeatMode::Track);
    assert_eq!(h.controller.toggle_repeat().await.unwrap(), RepeatMode::Off);
    assert_eq!(h.session.repeat_mode(), NativeRepeatMode::Off);
    assert_eq!(h.controller.now_playing().status.repeat, RepeatMode::Off);
}

#[tokio::test]
async fn repeat_mode_survives_a_new_queue() {
    let h = Harness::start().await;
    h.controller.toggle_repeat().await.unwrap();
    h.controller
        .start_queue(tracks(&["a"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    assert_eq!(h.session.repeat_mode(), NativeRepeatMode::Queue);
}

#[tokio::test]
async fn queue_end_with_repeat_queue_restarts_at_the_top() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b"]), 0, PlaybackSource::Home)
        .await
        .unwrap();
    h.controller.toggle_repeat().await.unwrap();
    h.controller.next().await.unwrap();

    h.session.emit(SessionEvent::QueueEnded { track_index: Some(1) });
    h.settle().await;

    assert_eq!(h.controller.now_playing().index, 0);
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(h.session.active_id().as_deref(), Some("a"));
}

#[tokio::test]
async fn repeat_queue_plays_tracks_beyond_the_loaded_window() {
    let h = Harness::with(Options {
        lookahead: 1,
        ..Options::default()
    })
    .await;
    h.resolver.stall("c", Duration::from_millis(150));
    h.controller.toggle_repeat().await.unwrap();
    h.controller
        .start_queue(tracks(&["a", "b", "c", "d"]), 0, PlaybackSource::Home)
        .await
        .unwrap();
    assert!(eventually(|| h.session.queued_ids() == ["a", "b"]).await);

    h.session.finish_track();
    h.settle().await;
    assert_eq!(h.current_id().as_deref(), Some("b"));

    // "c" is still resolving, so the native player wraps back to "a".
    h.session.finish_track();
    h.settle().await;

    assert_eq!(h.current_id().as_deref(), Some("c"));
    assert_eq!(h.controller.now_playing().index, 2);
    assert_eq!(h.session.active_id().as_deref(), Some("c"));
    assert_eq!(h.session.queued_ids()[..3], ["a", "b", "c"]);
}

#[tokio::test]
async fn explicit_next_wraps_only_with_repeat_queue() {
    let h = Harness::start().await;
    h.controller.toggle_repeat().await.unwrap();
    h.controller
        .start_queue(tracks(&["a", "b"]), 0, PlaybackSource::Home)
        .await
        .unwrap();
    h.controller.next().await.unwrap();
    h.controller.next().await.unwrap();
    assert_eq!(h.current_id().as_deref(), Some("a"));

    // Track repeat only applies when a track finishes on its own.
    assert_eq!(h.controller.toggle_repeat().await.unwrap(), RepeatMode::Track);
    h.controller.next().await.unwrap();
    h.controller.next().await.unwrap();
    assert!(h.controller.now_playing().is_idle());
}

#[tokio::test]
async fn native_advance_is_reconciled_once() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b", "c"]), 0, PlaybackSource::Home)
        .await
        .unwrap();
    assert!(eventually(|| h.session.queued_ids().len() == 3).await);

    h.session.finish_track();
    h.settle().await;
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert_eq!(h.controller.now_playing().index, 1);

    // The same notification delivered twice.
    h.session.emit(SessionEvent::ActiveTrackChanged {
        index: Some(1),
        track_id: Some("b".to_string()),
    });
    h.settle().await;

    assert_eq!(h.controller.now_playing().index, 1);
    let recents: Vec<String> = h
        .controller
        .recently_played()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(recents, ["b", "a"]);
}

#[tokio::test]
async fn unknown_active_track_is_ignored() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    let stranger = Track::new("zzz", "Stranger", "Nobody").with_stream_url("https://cdn.test/zzz.m4a");
    h.session.set_queue(vec![stranger]).await.unwrap();
    h.settle().await;

    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(h.controller.now_playing().index, 0);
}

#[tokio::test]
async fn queue_end_without_repeat_goes_idle_and_play_restarts() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    h.session.finish_track();
    h.settle().await;
    assert!(h.controller.now_playing().is_idle());
    assert!(h.session.queued_ids().is_empty());

    h.controller.play_pause().await.unwrap();
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(h.session.native_state(), NativeState::Playing);
}

#[tokio::test]
async fn queue_end_still_stops_when_the_session_cannot_be_queried() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    h.session.fail_on("active_track_index");
    h.session.finish_track();
    h.settle().await;

    assert!(h.count_calls("active_track_index") > 0);
    assert!(h.controller.now_playing().is_idle());
    assert!(h.session.queued_ids().is_empty());
}

#[tokio::test]
async fn native_queue_running_out_early_continues_the_logical_queue() {
    let h = Harness::with(Options {
        lookahead: 0,
        ..Options::default()
    })
    .await;
    h.controller
        .start_queue(tracks(&["a", "b"]), 0, PlaybackSource::Home)
        .await
        .unwrap();
    assert_eq!(h.session.queued_ids(), ["a"]);

    h.session.finish_track();
    h.settle().await;

    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert_eq!(h.session.queued_ids(), ["a", "b"]);
    assert_eq!(h.session.native_state(), NativeState::Playing);
}

#[tokio::test]
async fn failed_prefetch_is_skipped() {
    let h = Harness::start().await;
    h.resolver.fail("b");
    h.controller
        .start_queue(tracks(&["a", "b", "c"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    assert!(eventually(|| h.session.queued_ids() == ["a", "c"]).await);
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(h.session.active_id().as_deref(), Some("a"));
    assert_eq!(h.session.native_state(), NativeState::Playing);

    h.controller.next().await.unwrap();
    assert_eq!(h.current_id().as_deref(), Some("c"));
    assert_eq!(h.controller.now_playing().index, 2);
    assert_eq!(h.session.active_id().as_deref(), Some("c"));
}

#[tokio::test]
async fn seek_is_validated_against_the_track() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    for bad in [f64::NAN, -1.0, 250.0] {
        let result = h.controller.seek_to(bad).await;
        assert!(matches!(result, Err(PlayerError::InvalidSeek(_))), "{bad} accepted");
    }
    assert_eq!(h.count_calls("seek_to"), 0);

    h.controller.seek_to(30.0).await.unwrap();
    h.settle().await;
    assert_eq!(h.controller.now_playing().status.position.as_secs(), 30);
    assert_eq!(h.count_calls("seek_to"), 1);
}

#[tokio::test]
async fn play_pause_follows_the_native_state() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    h.controller.play_pause().await.unwrap();
    assert_eq!(h.session.native_state(), NativeState::Paused);
    h.controller.play_pause().await.unwrap();
    assert_eq!(h.session.native_state(), NativeState::Playing);
}

#[tokio::test]
async fn remote_controls_drive_the_same_transport() {
    let h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b", "c"]), 0, PlaybackSource::Home)
        .await
        .unwrap();

    h.session.emit(SessionEvent::RemotePause);
    h.settle().await;
    assert_eq!(h.session.native_state(), NativeState::Paused);

    h.session.emit(SessionEvent::RemotePlay);
    h.settle().await;
    assert_eq!(h.session.native_state(), NativeState::Playing);

    h.session.emit(SessionEvent::RemoteNext);
    h.settle().await;
    assert_eq!(h.current_id().as_deref(), Some("b"));

    h.session.emit(SessionEvent::RemotePrevious);
    h.settle().await;
    assert_eq!(h.current_id().as_deref(), Some("a"));

    // Seeking from the lock screen resumes a paused track.
    h.session.emit(SessionEvent::RemotePause);
    h.session.emit(SessionEvent::RemoteSeek(10.0));
    h.settle().await;
    assert_eq!(h.session.native_state(), NativeState::Playing);
    assert!(h.session.calls().contains(&"seek_to(10.0)".to_string()));
}

#[tokio::test]
async fn session_failure_is_reported_and_changes_nothing() {
    let mut h = Harness::start().await;
    h.controller
        .start_queue(tracks(&["a", "b"]), 0, PlaybackSource::Home)
        .await
        .unwrap();
    assert!(eventually(|| h.session.queued_ids().len() == 2).await);
    h.drain_notices();

    h.session.fail_on("skip");
    let result = h.controller.next().await;
    assert!(matches!(result, Err(PlayerError::Session { operation: "skip", .. })));
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(
        h.drain_notices(),
        [Notice::Toast("Player is not responding. Try again.".to_string())]
    );

    h.session.recover("skip");
    h.controller.next().await.unwrap();
    assert_eq!(h.current_id().as_deref(), Some("b"));
}

#[tokio::test]
async fn playback_errors_become_toasts() {
    let mut h = Harness::start().await;
    h.session.emit(SessionEvent::PlaybackError {
        message: "decoder failure".to_string(),
    });
    h.settle().await;

    assert_eq!(h.drain_notices(), [Notice::Toast("Error playing song".to_string())]);
}

#[tokio::test]
async fn handles_stop_working_after_shutdown() {
    let h = Harness::start().await;
    h.controller.shutdown().await;

    let result = h.controller.next().await;
    assert!(matches!(result, Err(PlayerError::Closed)));
}
