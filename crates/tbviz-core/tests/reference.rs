use tbviz_core::error::ReferenceError;
use tbviz_core::reference::{clean_name, ReferenceData};
use tbviz_core::types::{Development, WhoRegion};

#[test]
fn builtin_tables_resolve_aliases_and_codes() {
    let reference = ReferenceData::builtin();
    assert!(reference.countries().len() > 50);

    let vietnam = reference.lookup_name("  vietnam ").expect("alias");
    assert_eq!(vietnam.iso3, "VNM");
    assert_eq!(vietnam.region, WhoRegion::WesternPacific);

    assert_eq!(
        reference.lookup_iso3("rus").map(|c| c.name.as_str()),
        Some("Russian Federation")
    );
    assert!(reference.is_developed("deu"));
    assert!(!reference.is_developed("IND"));
}

#[test]
fn builtin_table_covers_every_member_state() {
    let reference = ReferenceData::builtin();
    assert_eq!(reference.countries().len(), 194);

    let per_region = |region: WhoRegion| {
        reference
            .countries()
            .iter()
            .filter(|c| c.region == region)
            .count()
    };
    let counts: Vec<usize> = WhoRegion::ALL.into_iter().map(per_region).collect();
    assert_eq!(counts, vec![47, 35, 11, 53, 21, 27]);

    let cases = [
        ("TUR", WhoRegion::Europe),
        ("POL", WhoRegion::Europe),
        ("CHL", WhoRegion::Americas),
        ("SAU", WhoRegion::EasternMediterranean),
        ("IRQ", WhoRegion::EasternMediterranean),
        ("MYS", WhoRegion::WesternPacific),
        ("LKA", WhoRegion::SouthEastAsia),
        ("SEN", WhoRegion::Africa),
        ("BFA", WhoRegion::Africa),
    ];
    for (iso3, region) in cases {
        assert_eq!(reference.lookup_iso3(iso3).map(|c| c.region), Some(region), "{iso3}");
    }
    assert_eq!(reference.lookup_name("Turkey").map(|c| c.iso3.as_str()), Some("TUR"));
}

#[test]
fn iso3_wins_over_a_conflicting_name() {
    let resolution = ReferenceData::builtin()
        .resolve(Some("KEN"), Some("Brazil"))
        .expect("resolved");
    assert_eq!(resolution.key.id, "KEN");
    assert_eq!(resolution.key.name, "Kenya");
    assert!(resolution.is_mapped());
}

#[test]
fn unknown_countries_keep_a_stable_identity() {
    let reference = ReferenceData::builtin();

    let by_name = reference.resolve(None, Some("  Atlantis ")).expect("named");
    assert_eq!(by_name.key.id, "Atlantis");
    assert_eq!(by_name.region, None);
    assert_eq!(by_name.development, Development::Developing);

    let by_code = reference.resolve(Some("xyz"), None).expect("coded");
    assert_eq!(by_code.key.id, "XYZ");
    assert_eq!(by_code.key.iso3.as_deref(), Some("XYZ"));

    assert!(reference.resolve(None, None).is_none());
    assert!(reference.resolve(Some(" "), Some("")).is_none());
}

#[test]
fn names_are_cleaned_before_lookup() {
    assert_eq!(clean_name("  Côte   d\u{2019}Ivoire "), "Côte d'Ivoire");
}

#[test]
fn malformed_tables_are_rejected() {
    let unknown_region = ReferenceData::from_toml_str(
        "[[countries]]\niso3 = \"AAA\"\nname = \"A\"\nregion = \"MARS\"\n",
    );
    assert!(matches!(unknown_region, Err(ReferenceError::UnknownRegion { .. })));

    let duplicate = ReferenceData::from_toml_str(
        "[[countries]]\niso3 = \"AAA\"\nname = \"A\"\nregion = \"AFR\"\n\n[[countries]]\niso3 = \"aaa\"\nname = \"B\"\nregion = \"AFR\"\n",
    );
    assert!(matches!(duplicate, Err(ReferenceError::DuplicateIso3(code)) if code == "AAA"));

    let ambiguous = ReferenceData::from_toml_str(
        "[[countries]]\niso3 = \"AAA\"\nname = \"Same\"\nregion = \"AFR\"\n\n[[countries]]\niso3 = \"BBB\"\nname = \"same\"\nregion = \"EUR\"\n",
    );
    assert!(matches!(ambiguous, Err(ReferenceError::AmbiguousName { .. })));

    let developed = ReferenceData::from_toml_str("developed = [\"ZZZ\"]\n");
    assert!(matches!(developed, Err(ReferenceError::UnknownDeveloped(code)) if code == "ZZZ"));

    assert!(matches!(
        ReferenceData::from_toml_str("countries = 3"),
        Err(ReferenceError::Toml(_))
    ));
}
