//! Unit tests for timeframe parsing and aggregation mapping

use macdrix::models::timeframe::{BaseInterval, Timeframe};

#[test]
fn parses_every_supported_label() {
    for tf in Timeframe::all() {
        let label = tf.to_string();
        assert_eq!(label.parse::<Timeframe>().unwrap(), *tf, "label {}", label);
    }
}

#[test]
fn accepts_sixty_minute_alias_for_one_hour() {
    assert_eq!("60m".parse::<Timeframe>().unwrap(), Timeframe::H1);
    assert_eq!(" 1H ".parse::<Timeframe>().unwrap(), Timeframe::H1);
}

#[test]
fn rejects_unknown_labels() {
    assert!("7m".parse::<Timeframe>().is_err());
    assert!("1d".parse::<Timeframe>().is_err());
    assert!("".parse::<Timeframe>().is_err());
}

#[test]
fn native_frames_pass_through_unaggregated() {
    for tf in [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
    ] {
        assert!(tf.is_native(), "{} should be native", tf);
        assert_eq!(tf.aggregation_factor(), 1);
    }
}

#[test]
fn custom_frames_map_to_divisible_base_intervals() {
    assert_eq!(Timeframe::M45.base_interval(), BaseInterval::M15);
    assert_eq!(Timeframe::M45.aggregation_factor(), 3);

    assert_eq!(Timeframe::M50.base_interval(), BaseInterval::M5);
    assert_eq!(Timeframe::M50.aggregation_factor(), 10);

    assert_eq!(Timeframe::M55.base_interval(), BaseInterval::M5);
    assert_eq!(Timeframe::M55.aggregation_factor(), 11);

    assert_eq!(Timeframe::H2.base_interval(), BaseInterval::H1);
    assert_eq!(Timeframe::H2.aggregation_factor(), 2);
    assert_eq!(Timeframe::H3.aggregation_factor(), 3);
    assert_eq!(Timeframe::H4.aggregation_factor(), 4);
}

#[test]
fn base_interval_codes_match_bybit_kline_api() {
    assert_eq!(BaseInterval::M1.code(), "1");
    assert_eq!(BaseInterval::M5.code(), "5");
    assert_eq!(BaseInterval::M15.code(), "15");
    assert_eq!(BaseInterval::M30.code(), "30");
    assert_eq!(BaseInterval::H1.code(), "60");
}

#[test]
fn serializes_with_short_labels() {
    let json = serde_json::to_string(&Timeframe::M45).unwrap();
    assert_eq!(json, "\"45m\"");
    let back: Timeframe = serde_json::from_str("\"2h\"").unwrap();
    assert_eq!(back, Timeframe::H2);
}
