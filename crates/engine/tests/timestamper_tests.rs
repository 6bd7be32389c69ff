use trueshot_engine as ts;

#[test]
fn parse_timestamper() {
    let t: ts::Timestamper = "system".parse().unwrap();
    assert_eq!(t, ts::Timestamper::System);

    let t2: ts::Timestamper = "fixed:2026-01-26T15:30:00.123Z".parse().unwrap();
    assert_eq!(
        ts::domain::record::format_timestamp(&t2.now()),
        "2026-01-26T15:30:00.123Z"
    );
}

#[test]
fn parse_timestamper_invalid() {
    let err = "bogus".parse::<ts::Timestamper>().unwrap_err();
    assert!(err.to_string().contains("Invalid timestamper"));

    let err = "fixed:yesterday".parse::<ts::Timestamper>().unwrap_err();
    assert!(err.to_string().contains("Invalid fixed timestamp"));
}

#[test]
fn instants_are_truncated_to_millis() {
    let t: ts::Timestamper = "fixed:2026-01-26T15:30:00.123456789+02:00".parse().unwrap();
    let now = t.now();
    assert_eq!(now.timestamp_subsec_nanos(), 123_000_000);
    assert_eq!(ts::domain::record::format_timestamp(&now), "2026-01-26T13:30:00.123Z");
}

#[test]
fn system_clock_has_millisecond_precision() {
    let now = ts::Timestamper::System.now();
    assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
}
