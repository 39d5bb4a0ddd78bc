use ensemble_separator_core::{classify, ClassificationRule, Role};
use std::path::PathBuf;

fn roles(names: &[&str]) -> Vec<Role> {
    classify(names).into_iter().map(|c| c.role).collect()
}

#[test]
fn instrumental_markers_win_at_any_position() {
    for marker in ["(Instrumental)", "(inst)", "(ACCOMPANIMENT)"] {
        let name = format!("song_{marker}_model.wav");
        assert_eq!(roles(&[name.as_str()]), vec![Role::Instrumental]);
        assert_eq!(
            roles(&[name.as_str(), "other_(vocals).wav"]),
            vec![Role::Instrumental, Role::Vocal]
        );
        assert_eq!(
            roles(&["a.wav", "b.wav", name.as_str()]),
            vec![Role::Vocal, Role::Instrumental, Role::Instrumental]
        );
    }
}

#[test]
fn vocal_markers_win_at_any_position() {
    for marker in ["(Vocals)", "(vocal)", "(Voice)"] {
        let name = format!("song_{marker}.flac");
        assert_eq!(roles(&[name.as_str()]), vec![Role::Vocal]);
        // index 1 would otherwise fall back to instrumental
        assert_eq!(
            roles(&["first.wav", name.as_str()]),
            vec![Role::Vocal, Role::Vocal]
        );
    }
}

#[test]
fn instrumental_marker_beats_vocal_marker() {
    let classified = classify(&["mix_(vocals)_(instrumental).wav"]);
    assert_eq!(classified[0].role, Role::Instrumental);
    assert_eq!(classified[0].rule, ClassificationRule::InstrumentalMarker);
}

#[test]
fn two_unlabeled_stems_use_position() {
    let classified = classify(&["out_0.wav", "out_1.wav"]);
    assert_eq!(classified[0].role, Role::Vocal);
    assert_eq!(classified[0].rule, ClassificationRule::DefaultFallback);
    assert_eq!(classified[1].role, Role::Instrumental);
    assert_eq!(classified[1].rule, ClassificationRule::PositionalFallback);
}

#[test]
fn single_unlabeled_stem_is_vocal() {
    let classified = classify(&["out_0.wav"]);
    assert_eq!(classified[0].role, Role::Vocal);
    assert_eq!(classified[0].rule, ClassificationRule::DefaultFallback);
}

#[test]
fn only_index_one_gets_positional_fallback() {
    assert_eq!(
        roles(&["a.wav", "b.wav", "c.wav", "d.wav"]),
        vec![Role::Vocal, Role::Instrumental, Role::Vocal, Role::Vocal]
    );
}

#[test]
fn directory_names_are_ignored() {
    let stems = vec![PathBuf::from("/tmp/(instrumental)/take.wav")];
    let classified = classify(&stems);
    assert_eq!(classified[0].role, Role::Vocal);
    assert_eq!(classified[0].path, stems[0]);
}

#[test]
fn empty_input_yields_nothing() {
    let none: [&str; 0] = [];
    assert!(classify(&none).is_empty());
}
