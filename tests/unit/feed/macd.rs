//! Unit tests for the streaming MACD tracker

use macdrix::feed::macd::{detect_crossover, MacdParams, MacdPoint, MacdTracker};
use macdrix::models::signal::CrossoverKind;

fn point(macd_line: f64, signal_line: f64) -> MacdPoint {
    MacdPoint {
        macd_line,
        signal_line,
        histogram: macd_line - signal_line,
    }
}

fn short_params() -> MacdParams {
    MacdParams {
        fast: 3,
        slow: 5,
        signal: 3,
    }
}

#[test]
fn stays_silent_until_both_emas_seed() {
    let params = short_params();
    let mut tracker = MacdTracker::new(params);

    // Slow EMA seeds on bar 5, the signal EMA after 3 MACD samples: the
    // first full point lands on bar 7.
    for bar in 1..=6 {
        assert!(
            tracker.update(100.0 + bar as f64).is_none(),
            "bar {} should still be warming up",
            bar
        );
        assert!(!tracker.is_ready());
    }
    let update = tracker.update(107.0);
    assert!(update.is_some(), "bar 7 should produce the first point");
    assert!(tracker.is_ready());
    assert!(tracker.last_point().is_some());
}

#[test]
fn first_point_never_reports_a_crossover() {
    let mut tracker = MacdTracker::new(short_params());
    let mut first = None;
    for bar in 1..=7 {
        first = tracker.update(100.0 + bar as f64);
    }
    assert_eq!(first.unwrap().crossover, None);
}

#[test]
fn accelerating_uptrend_produces_no_crossovers() {
    let mut tracker = MacdTracker::new(short_params());
    let mut close = 100.0;
    let mut step = 1.0;
    for bar in 0..40 {
        close += step;
        step += 0.5;
        if let Some(update) = tracker.update(close) {
            assert_eq!(update.crossover, None, "bar {}", bar);
            assert!(update.point.macd_line > update.point.signal_line);
        }
    }
}

#[test]
fn recovery_after_decline_fires_one_bullish_crossover() {
    let mut tracker = MacdTracker::new(short_params());
    let mut crossovers = Vec::new();

    // 25 falling closes push the MACD well below its signal line, then a
    // steep recovery drives exactly one upward cross.
    let mut closes: Vec<f64> = (0..25).map(|i| 200.0 - i as f64 * 2.0).collect();
    closes.extend((0..20).map(|i| 150.0 + i as f64 * 5.0));

    for close in closes {
        if let Some(update) = tracker.update(close) {
            if let Some(kind) = update.crossover {
                crossovers.push(kind);
            }
        }
    }
    assert_eq!(crossovers, vec![CrossoverKind::Bullish]);
}

#[test]
fn peak_and_fall_fires_a_bearish_crossover() {
    let mut tracker = MacdTracker::new(short_params());
    let mut crossovers = Vec::new();

    let mut closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64 * 2.0).collect();
    closes.extend((0..20).map(|i| 148.0 - i as f64 * 5.0));

    for close in closes {
        if let Some(update) = tracker.update(close) {
            if let Some(kind) = update.crossover {
                crossovers.push(kind);
            }
        }
    }
    assert_eq!(crossovers, vec![CrossoverKind::Bearish]);
}

#[test]
fn crossover_requires_a_sign_flip_of_the_spread() {
    assert_eq!(
        detect_crossover(point(-1.0, 0.0), point(1.0, 0.0)),
        Some(CrossoverKind::Bullish)
    );
    assert_eq!(
        detect_crossover(point(1.0, 0.0), point(-1.0, 0.0)),
        Some(CrossoverKind::Bearish)
    );
    assert_eq!(detect_crossover(point(1.0, 0.0), point(2.0, 0.0)), None);
    assert_eq!(detect_crossover(point(-2.0, 0.0), point(-1.0, 0.0)), None);
}

#[test]
fn touching_the_signal_line_counts_as_crossing_from_it() {
    // Landing exactly on the line is not a cross; leaving it is.
    assert_eq!(detect_crossover(point(0.5, 0.5), point(1.0, 0.5)), Some(CrossoverKind::Bullish));
    assert_eq!(detect_crossover(point(0.5, 0.5), point(0.0, 0.5)), Some(CrossoverKind::Bearish));
    assert_eq!(detect_crossover(point(1.0, 0.5), point(0.5, 0.5)), None);
}

#[test]
fn warmup_bar_count_covers_slow_and_signal_seeding() {
    assert_eq!(MacdParams::default().warmup_bars(), 35);
    assert_eq!(short_params().warmup_bars(), 8);
}

#[test]
fn rejects_degenerate_period_configurations() {
    assert!(MacdParams { fast: 0, slow: 26, signal: 9 }.validate().is_err());
    assert!(MacdParams { fast: 26, slow: 12, signal: 9 }.validate().is_err());
    assert!(MacdParams { fast: 12, slow: 12, signal: 9 }.validate().is_err());
    assert!(MacdParams::default().validate().is_ok());
}
