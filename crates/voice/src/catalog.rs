//! The provider's named voice catalog, surfaced read-only through the admin
//! API's `GET /api/voices` (§6). Static because the provider does not expose
//! a voices-listing endpoint of its own.

/// `(voice_id, display_name)` pairs, in the provider's own ordering.
pub const VOICE_CATALOG: &[(&str, &str)] = &[
    ("Wise_Woman", "Wise Woman"),
    ("Friendly_Person", "Friendly Person"),
    ("Deep_Voice_Man", "Deep Voice Man"),
    ("Calm_Woman", "Calm Woman"),
    ("Casual_Guy", "Casual Guy"),
    ("Lively_Girl", "Lively Girl"),
    ("Patient_Man", "Patient Man"),
    ("Young_Knight", "Young Knight"),
    ("Determined_Man", "Determined Man"),
    ("Lovely_Girl", "Lovely Girl"),
    ("Decent_Boy", "Decent Boy"),
    ("Imposing_Manner", "Imposing Manner"),
    ("Elegant_Man", "Elegant Man"),
    ("Abbess", "Abbess"),
    ("Sweet_Girl_2", "Sweet Girl"),
    ("Exuberant_Girl", "Exuberant Girl"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_default_voice_is_in_the_catalog() {
        assert!(VOICE_CATALOG.iter().any(|(id, _)| *id == "Wise_Woman"));
    }

    #[test]
    fn catalog_has_no_duplicate_ids() {
        let mut ids: Vec<&str> = VOICE_CATALOG.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), VOICE_CATALOG.len());
    }
}
