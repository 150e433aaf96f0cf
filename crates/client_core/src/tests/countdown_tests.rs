use super::*;

const IMAGE: &str = "https://img.example/q1.jpg";

fn orchestrator() -> CountdownOrchestrator {
    CountdownOrchestrator::new(CountdownTimings {
        skip_threshold: Duration::from_millis(200),
        preload_cap: Duration::from_millis(1200),
        fallback_buffer: Duration::from_millis(400),
    })
}

fn round(started_at: Timestamp, question_at: Option<Timestamp>) -> RoundInfo {
    RoundInfo {
        started_at,
        question_at,
        deadline: None,
        finished: false,
        countdown_sec: Some(3.0),
    }
}

fn shown(effects: &[CountdownEffect]) -> Vec<u64> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            CountdownEffect::ShowCountdown { seconds_left } => Some(*seconds_left),
            _ => None,
        })
        .collect()
}

#[test]
fn counts_down_on_second_boundaries_of_the_authority_clock() {
    let mut countdown = orchestrator();
    let effects = countdown.begin(100.0, 3.0, Some(IMAGE.to_string()), 100.0);
    assert_eq!(
        effects,
        vec![
            CountdownEffect::ResetBackground,
            CountdownEffect::Preload {
                started_at: 100.0,
                url: IMAGE.to_string(),
            },
            CountdownEffect::ScheduleFallback {
                started_at: 100.0,
                after: Duration::from_millis(4600),
            },
            CountdownEffect::ShowCountdown { seconds_left: 3 },
            CountdownEffect::ScheduleTick {
                started_at: 100.0,
                after: Duration::from_secs(1),
            },
        ]
    );
    assert_eq!(countdown.phase(), CountdownPhase::CountingDown);
    assert_eq!(countdown.state().target_end, Some(103.0));

    assert_eq!(shown(&countdown.tick(100.0, 101.0)), vec![2]);
    assert_eq!(shown(&countdown.tick(100.0, 102.0)), vec![1]);

    let at_zero = countdown.tick(100.0, 103.0);
    assert_eq!(
        at_zero,
        vec![
            CountdownEffect::ShowCountdown { seconds_left: 0 },
            CountdownEffect::SchedulePreloadCap {
                started_at: 100.0,
                after: Duration::from_millis(1200),
            },
        ]
    );
    assert_eq!(countdown.phase(), CountdownPhase::Finishing);

    assert_eq!(
        countdown.image_loaded(100.0, true),
        vec![
            CountdownEffect::ApplyBackground {
                url: IMAGE.to_string(),
            },
            CountdownEffect::RoundReady,
            CountdownEffect::CancelTimers,
        ]
    );
    assert!(!countdown.is_active());
    assert_eq!(countdown.phase(), CountdownPhase::Idle);
}

#[test]
fn late_join_mid_countdown_realigns_first_tick() {
    let mut countdown = orchestrator();
    let effects = countdown.begin(100.0, 3.0, None, 101.4);
    assert_eq!(shown(&effects), vec![2]);
    assert!(effects.contains(&CountdownEffect::ScheduleTick {
        started_at: 100.0,
        after: Duration::from_millis(600),
    }));
}

#[test]
fn skips_visible_countdown_when_nearly_over() {
    let mut countdown = orchestrator();
    let effects = countdown.begin(100.0, 3.0, Some(IMAGE.to_string()), 102.9);
    assert_eq!(
        effects,
        vec![
            CountdownEffect::PreloadAndApply {
                started_at: 100.0,
                url: IMAGE.to_string(),
            },
            CountdownEffect::RoundReady,
        ]
    );
    assert!(!countdown.is_active());
    assert!(shown(&effects).is_empty());
}

#[test]
fn skip_without_image_only_signals_ready() {
    let mut countdown = orchestrator();
    let effects = countdown.begin(100.0, 3.0, None, 110.0);
    assert_eq!(effects, vec![CountdownEffect::RoundReady]);
}

#[test]
fn repeated_begin_for_same_question_is_ignored() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, None, 100.0);
    assert!(countdown.begin(100.0, 3.0, None, 100.5).is_empty());
}

#[test]
fn newer_question_supersedes_running_countdown() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, None, 100.0);
    let effects = countdown.begin(110.0, 3.0, None, 110.0);
    assert_eq!(effects.first(), Some(&CountdownEffect::CancelTimers));
    assert_eq!(countdown.state().for_started_at, Some(110.0));
    assert_eq!(shown(&effects), vec![3]);
}

#[test]
fn inputs_for_another_question_are_ignored() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, Some(IMAGE.to_string()), 100.0);

    assert!(countdown.tick(90.0, 101.0).is_empty());
    assert!(countdown.fallback(90.0).is_empty());
    assert!(countdown.preload_cap_expired(90.0).is_empty());
    assert!(countdown.image_loaded(90.0, true).is_empty());
    assert!(!countdown.state().image_ready);
    assert_eq!(countdown.seconds_shown(), Some(3));
}

#[test]
fn dismissal_defers_background_until_image_had_a_chance() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, Some(IMAGE.to_string()), 100.0);

    let live = round(100.0, Some(102.0));
    assert!(countdown.dismiss_if_live(&live, 101.0).is_empty());

    let effects = countdown.dismiss_if_live(&live, 102.0);
    assert_eq!(
        effects,
        vec![
            CountdownEffect::ApplyBackgroundDeferred {
                url: IMAGE.to_string(),
            },
            CountdownEffect::CancelTimers,
        ]
    );
    assert!(!countdown.is_active());
    assert!(countdown.dismiss_if_live(&live, 102.0).is_empty());
}

#[test]
fn dismissal_applies_loaded_image_immediately() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, Some(IMAGE.to_string()), 100.0);
    countdown.image_loaded(100.0, true);

    let finished = RoundInfo {
        finished: true,
        ..round(100.0, None)
    };
    assert_eq!(
        countdown.dismiss_if_live(&finished, 100.5).first(),
        Some(&CountdownEffect::ApplyBackground {
            url: IMAGE.to_string(),
        })
    );
}

#[test]
fn dismissal_requires_same_question() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, None, 100.0);
    assert!(countdown
        .dismiss_if_live(&round(90.0, Some(95.0)), 101.0)
        .is_empty());
    assert!(countdown.is_active());
}

#[test]
fn preload_cap_proceeds_without_waiting_for_image() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, Some(IMAGE.to_string()), 100.0);
    countdown.tick(100.0, 103.0);

    assert_eq!(
        countdown.preload_cap_expired(100.0),
        vec![
            CountdownEffect::ApplyBackground {
                url: IMAGE.to_string(),
            },
            CountdownEffect::RoundReady,
            CountdownEffect::CancelTimers,
        ]
    );
    assert!(countdown.image_loaded(100.0, true).is_empty());
}

#[test]
fn failed_preload_proceeds_without_background() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, Some(IMAGE.to_string()), 100.0);
    assert!(countdown.image_loaded(100.0, false).is_empty());

    assert_eq!(
        countdown.tick(100.0, 103.0),
        vec![
            CountdownEffect::ShowCountdown { seconds_left: 0 },
            CountdownEffect::RoundReady,
            CountdownEffect::CancelTimers,
        ]
    );
}

#[test]
fn fallback_finishes_a_stalled_countdown() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, Some(IMAGE.to_string()), 100.0);

    let effects = countdown.fallback(100.0);
    assert_eq!(shown(&effects), vec![0]);
    assert_eq!(countdown.phase(), CountdownPhase::Finishing);

    let effects = countdown.fallback(100.0);
    assert!(effects.contains(&CountdownEffect::RoundReady));
    assert!(!countdown.is_active());
}

#[test]
fn cancel_stops_without_signalling_ready() {
    let mut countdown = orchestrator();
    countdown.begin(100.0, 3.0, None, 100.0);
    assert_eq!(countdown.cancel(), vec![CountdownEffect::CancelTimers]);
    assert!(countdown.cancel().is_empty());
    assert!(countdown.tick(100.0, 101.0).is_empty());
}

#[test]
fn oversized_countdown_length_saturates_the_fallback() {
    let mut countdown = orchestrator();
    let effects = countdown.begin(100.0, 1e20, None, 100.0);

    assert!(countdown.is_active());
    assert!(effects.contains(&CountdownEffect::ScheduleFallback {
        started_at: 100.0,
        after: Duration::MAX,
    }));
}
