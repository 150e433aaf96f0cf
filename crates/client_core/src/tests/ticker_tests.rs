use super::*;
use std::time::Duration;
use tokio::sync::mpsc;

#[test]
fn progress_reports_elapsed_share() {
    let progress = Progress::at(130.0, 30.0, 115.0);
    assert_eq!(progress.remaining, 15.0);
    assert_eq!(progress.percent, 50);
    assert!(!progress.is_done());
}

#[test]
fn progress_is_clamped_at_both_ends() {
    let late = Progress::at(130.0, 30.0, 140.0);
    assert_eq!(late.remaining, 0.0);
    assert_eq!(late.percent, 100);
    assert!(late.is_done());

    // Deadline further away than the nominal duration.
    let early = Progress::at(200.0, 30.0, 100.0);
    assert_eq!(early.percent, 0);
}

#[test]
fn zero_duration_is_treated_as_one_second() {
    let progress = Progress::at(100.5, 0.0, 100.0);
    assert_eq!(progress.percent, 50);
}

#[test]
fn label_switches_to_minutes() {
    assert_eq!(Progress::at(109.4, 30.0, 100.0).label(), "9s");
    assert_eq!(Progress::at(175.0, 90.0, 100.0).label(), "1:15");
    assert_eq!(Progress::at(100.0, 30.0, 100.0).label(), "0s");
}

#[tokio::test(start_paused = true)]
async fn ticks_until_deadline_then_stops() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = LocalProgressTicker::new(Duration::from_millis(250));
    assert!(ticker.start(100.5, 30.0, &tx, |token| token));

    let mut now = 100.0;
    let mut ticks = Vec::new();
    while ticker.is_running() {
        let token = rx.recv().await.expect("tick");
        now += 0.25;
        if let Some(progress) = ticker.tick(token, now) {
            ticks.push(progress.remaining);
        }
    }
    assert_eq!(ticks, vec![0.25, 0.0]);
}

#[tokio::test(start_paused = true)]
async fn same_target_keeps_running_ticker() {
    let (tx, _rx) = mpsc::unbounded_channel::<TimerToken>();
    let mut ticker = LocalProgressTicker::new(Duration::from_millis(250));
    assert!(ticker.start(130.0, 30.0, &tx, |token| token));
    assert!(!ticker.start(130.0, 30.0, &tx, |token| token));
    assert!(ticker.start(131.0, 30.0, &tx, |token| token));
    ticker.stop();
    assert!(!ticker.is_running());
    assert_eq!(ticker.current(120.0), None);
}

#[tokio::test(start_paused = true)]
async fn ticks_from_a_replaced_ticker_are_ignored() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = LocalProgressTicker::new(Duration::from_millis(250));
    ticker.start(130.0, 30.0, &tx, |token| token);
    tokio::time::sleep(Duration::from_millis(260)).await;
    let stale = rx.recv().await.expect("tick");

    ticker.start(160.0, 30.0, &tx, |token| token);
    assert_eq!(ticker.tick(stale, 131.0), None);
}
