//! Unit tests for base-candle aggregation into decision bars

use chrono::{DateTime, Duration, TimeZone, Utc};
use macdrix::feed::aggregator::CandleAggregator;
use macdrix::models::candle::Candle;
use macdrix::models::timeframe::Timeframe;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, hour, minute, 0).unwrap()
}

fn base(start: DateTime<Utc>, minutes: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(
        open,
        high,
        low,
        close,
        10.0,
        start,
        start + Duration::minutes(minutes),
    )
}

#[test]
fn native_frame_passes_candles_through() {
    let mut agg = CandleAggregator::new(Timeframe::M15);
    let candle = base(at(9, 0), 15, 100.0, 101.0, 99.0, 100.5);
    let bar = agg.push(candle.clone()).expect("native bar emitted");
    assert_eq!(bar, candle);
    assert!(agg.pending().is_none());
}

#[test]
fn merges_three_quarters_into_a_forty_five_minute_bar() {
    let mut agg = CandleAggregator::new(Timeframe::M45);

    assert!(agg.push(base(at(1, 30), 15, 100.0, 104.0, 99.0, 101.0)).is_none());
    assert!(agg.push(base(at(1, 45), 15, 101.0, 102.0, 95.0, 96.0)).is_none());
    let bar = agg
        .push(base(at(2, 0), 15, 96.0, 98.0, 96.0, 97.5))
        .expect("third candle completes the bar");

    assert_eq!(bar.start, at(1, 30));
    assert_eq!(bar.end, at(2, 15));
    assert_eq!(bar.open, 100.0);
    assert_eq!(bar.high, 104.0);
    assert_eq!(bar.low, 95.0);
    assert_eq!(bar.close, 97.5);
    assert_eq!(bar.volume, 30.0);
    assert!(agg.pending().is_none());
}

#[test]
fn drops_duplicate_and_out_of_order_candles() {
    let mut agg = CandleAggregator::new(Timeframe::M45);

    assert!(agg.push(base(at(1, 45), 15, 101.0, 102.0, 100.0, 101.5)).is_none());
    // Same candle again and an older one: both ignored.
    assert!(agg.push(base(at(1, 45), 15, 101.0, 102.0, 100.0, 101.5)).is_none());
    assert!(agg.push(base(at(1, 30), 15, 100.0, 101.0, 99.0, 100.5)).is_none());

    let pending = agg.pending().expect("bar still under construction");
    assert_eq!(pending.volume, 10.0);
}

#[test]
fn gap_in_the_stream_discards_the_partial_bar() {
    let mut agg = CandleAggregator::new(Timeframe::M45);

    // One candle of the 01:30 bucket, then the stream jumps to 02:15.
    assert!(agg.push(base(at(1, 30), 15, 100.0, 101.0, 99.0, 100.5)).is_none());
    assert!(agg.push(base(at(2, 15), 15, 98.0, 99.0, 97.0, 98.5)).is_none());

    // The new bucket completes normally.
    assert!(agg.push(base(at(2, 30), 15, 98.5, 100.0, 98.0, 99.0)).is_none());
    let bar = agg
        .push(base(at(2, 45), 15, 99.0, 99.5, 98.5, 99.2))
        .expect("complete bar after the gap");
    assert_eq!(bar.start, at(2, 15));
    assert_eq!(bar.open, 98.0);
}

#[test]
fn day_end_bucket_of_fifty_minute_frame_closes_early() {
    let mut agg = CandleAggregator::new(Timeframe::M50);

    // The 23:20 bucket is truncated at midnight: eight 5m candles fill it.
    for i in 0..7 {
        let start = at(23, 20) + Duration::minutes(5 * i);
        assert!(agg.push(base(start, 5, 100.0, 101.0, 99.0, 100.0)).is_none());
    }
    let bar = agg
        .push(base(at(23, 55), 5, 100.0, 101.0, 99.0, 100.4))
        .expect("truncated bucket closes at midnight");
    assert_eq!(bar.start, at(23, 20));
    assert_eq!(bar.end, Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap());
    assert_eq!(bar.close, 100.4);
    assert_eq!(bar.volume, 80.0);
}

#[test]
fn two_hour_bars_span_two_hourly_candles() {
    let mut agg = CandleAggregator::new(Timeframe::H2);

    assert!(agg.push(base(at(14, 0), 60, 100.0, 105.0, 99.0, 104.0)).is_none());
    let bar = agg
        .push(base(at(15, 0), 60, 104.0, 106.0, 103.0, 105.5))
        .expect("second hour completes the bar");
    assert_eq!(bar.start, at(14, 0));
    assert_eq!(bar.end, at(16, 0));
    assert_eq!(bar.high, 106.0);
    assert_eq!(bar.low, 99.0);
}

#[test]
fn mid_bucket_startup_emits_a_partial_first_bar_at_the_bucket_end() {
    let mut agg = CandleAggregator::new(Timeframe::H2);

    // First candle lands in the second half of its bucket. The bar still
    // closes at the bucket end with the data seen, carrying the
    // bucket-aligned start; only its close matters downstream.
    let bar = agg
        .push(base(at(15, 0), 60, 104.0, 106.0, 103.0, 105.5))
        .expect("bucket end reached");
    assert_eq!(bar.start, at(14, 0));
    assert_eq!(bar.open, 104.0);
}
