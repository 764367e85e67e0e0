use super::*;

#[test]
fn builtin_profiles_are_valid() {
    for source in Source::ALL {
        SourceProfile::builtin(source)
            .validate()
            .unwrap_or_else(|e| panic!("{source} profile invalid: {e}"));
    }
}

#[test]
fn offset_page_url_encodes_city_and_offset() {
    let profile = SourceProfile::builtin(Source::Booking);
    let url = profile.page_url("New York", 2);
    assert!(url.contains("ss=New%20York"), "{url}");
    assert!(url.ends_with("offset=50"), "{url}");
}

#[test]
fn interactive_page_url_ignores_index() {
    let profile = SourceProfile::builtin(Source::Ctrip);
    assert_eq!(profile.page_url("17", 0), profile.page_url("17", 4));
    assert!(profile.page_url("17", 0).contains("city=17"));
}

#[test]
fn non_ascii_city_is_percent_encoded() {
    let profile = SourceProfile::builtin(Source::Booking);
    let url = profile.page_url("杭州", 0);
    assert!(url.contains("ss=%E6%9D%AD%E5%B7%9E"), "{url}");
}

#[test]
fn absolutize_resolves_relative_links() {
    let profile = SourceProfile::builtin(Source::Booking);
    assert_eq!(
        profile.absolutize("/hotel/us/grand.html").as_deref(),
        Some("https://www.booking.com/hotel/us/grand.html")
    );
    assert_eq!(
        profile.absolutize("https://cdn.example.com/a.jpg").as_deref(),
        Some("https://cdn.example.com/a.jpg")
    );
}

#[test]
fn rewrites_apply_in_order() {
    let rewrites = vec![UrlRewrite::new("200w", "800w"), UrlRewrite::new("_R_", "")];
    assert_eq!(
        apply_rewrites("https://img.test/a_R_200w.jpg", &rewrites),
        "https://img.test/a800w.jpg"
    );
}

#[test]
fn offset_profile_without_offset_placeholder_is_invalid() {
    let mut profile = SourceProfile::builtin(Source::Booking);
    profile.search_url = "https://www.booking.com/searchresults.html?ss={city}".to_owned();
    assert!(matches!(
        profile.validate(),
        Err(ScraperError::InvalidProfile { .. })
    ));
}

#[test]
fn empty_field_candidates_fail_validation() {
    let mut profile = SourceProfile::builtin(Source::Ctrip);
    profile.listing.price.candidate_selectors.clear();
    assert!(matches!(
        profile.validate(),
        Err(ScraperError::EmptyFieldSpec { ref field }) if field == "price"
    ));
}

#[test]
fn yaml_round_trip_of_builtins_is_accepted_as_override() {
    let set = ProfileSet::builtin();
    let yaml = set.to_yaml(&Source::ALL).unwrap();
    let reloaded = ProfileSet::with_overrides(&yaml).unwrap();
    assert_eq!(reloaded, set);
}

#[test]
fn override_replaces_only_named_source() {
    let mut custom = SourceProfile::builtin(Source::Ctrip);
    custom.listing.name.candidate_selectors = vec![".hotel-title".to_owned()];
    let yaml = serde_yaml::to_string(&serde_json::json!({ "profiles": [custom] })).unwrap();

    let set = ProfileSet::with_overrides(&yaml).unwrap();
    assert_eq!(
        set.get(Source::Ctrip).listing.name.candidate_selectors,
        vec![".hotel-title"]
    );
    assert_eq!(
        set.get(Source::Booking),
        &SourceProfile::builtin(Source::Booking)
    );
}

#[test]
fn load_without_path_uses_builtins() {
    assert_eq!(ProfileSet::load(None).unwrap(), ProfileSet::builtin());
}

#[test]
fn load_reports_missing_file() {
    let err = ProfileSet::load(Some(Path::new("/nonexistent/profiles.yaml"))).unwrap_err();
    assert!(matches!(err, ScraperError::ProfileIo { .. }));
}
