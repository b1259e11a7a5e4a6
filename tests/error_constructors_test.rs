use heliotrope::error::HeliotropeError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        HeliotropeError::config("x"),
        HeliotropeError::Config { .. }
    ));
    assert!(matches!(
        HeliotropeError::meter("x"),
        HeliotropeError::Meter { .. }
    ));
    assert!(matches!(
        HeliotropeError::vehicle("x"),
        HeliotropeError::Vehicle { .. }
    ));
    assert!(matches!(
        HeliotropeError::mqtt("x"),
        HeliotropeError::Mqtt { .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    let ser = HeliotropeError::Serialization {
        message: "s".into(),
    };
    assert!(matches!(ser, HeliotropeError::Serialization { .. }));
    assert!(matches!(HeliotropeError::io("x"), HeliotropeError::Io { .. }));
    assert!(matches!(
        HeliotropeError::network("x"),
        HeliotropeError::Network { .. }
    ));
    assert!(matches!(
        HeliotropeError::validation("f", "m"),
        HeliotropeError::Validation { .. }
    ));
    assert!(matches!(
        HeliotropeError::timeout("x"),
        HeliotropeError::Timeout { .. }
    ));
    assert!(matches!(
        HeliotropeError::generic("x"),
        HeliotropeError::Generic { .. }
    ));
}

#[test]
fn std_conversions_pick_sensible_variants() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(
        HeliotropeError::from(io),
        HeliotropeError::Io { .. }
    ));

    let yaml = serde_yaml::from_str::<u32>("[oops").unwrap_err();
    assert!(matches!(
        HeliotropeError::from(yaml),
        HeliotropeError::Serialization { .. }
    ));

    let when = chrono::DateTime::parse_from_rfc3339("never").unwrap_err();
    assert!(matches!(
        HeliotropeError::from(when),
        HeliotropeError::Validation { .. }
    ));
}
