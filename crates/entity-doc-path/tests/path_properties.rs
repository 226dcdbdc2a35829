use entity_doc_path::{find_common_prefix, is_affecting, is_prefix, path, Path, PathStep};
use proptest::prelude::*;

fn arb_step() -> impl Strategy<Value = PathStep> {
    prop_oneof![
        prop::sample::select(vec!["fields", "sys", "title", "en", "de", "a~b", "x/y", ""])
            .prop_map(PathStep::from),
        (0usize..4).prop_map(PathStep::Index),
    ]
}

fn arb_path() -> impl Strategy<Value = Path> {
    prop::collection::vec(arb_step(), 0..5).prop_map(Path::from)
}

proptest! {
    #[test]
    fn affecting_is_symmetric(a in arb_path(), b in arb_path()) {
        prop_assert_eq!(is_affecting(&a, &b), is_affecting(&b, &a));
    }

    #[test]
    fn root_affects_everything(p in arb_path()) {
        prop_assert!(is_affecting(&Path::root(), &p));
        prop_assert!(is_affecting(&p, &Path::root()));
    }

    #[test]
    fn affecting_matches_prefix_definition(a in arb_path(), b in arb_path()) {
        prop_assert_eq!(is_affecting(&a, &b), is_prefix(&a, &b) || is_prefix(&b, &a));
    }

    #[test]
    fn common_prefix_prefixes_every_input(paths in prop::collection::vec(arb_path(), 1..6)) {
        let common = find_common_prefix(&paths);
        for p in &paths {
            prop_assert!(is_prefix(&common, p));
        }
        // Maximal: one more step from the first path is not shared by all.
        if common.len() < paths[0].len() {
            let longer = paths[0].truncate(common.len() + 1);
            prop_assert!(paths.iter().any(|p| !is_prefix(&longer, p)));
        }
    }

    #[test]
    fn pointer_text_roundtrips(p in arb_path()) {
        let parsed: Path = p.to_string().parse().unwrap();
        prop_assert_eq!(parsed, p);
    }
}

#[test]
fn common_prefix_of_nothing_or_root_is_root() {
    let none: [Path; 0] = [];
    assert_eq!(find_common_prefix(&none), Path::root());
    assert_eq!(find_common_prefix(&[Path::root()]), Path::root());
    assert_eq!(
        find_common_prefix(&[path!["fields"], Path::root(), path!["fields", "a"]]),
        Path::root()
    );
}

#[test]
fn common_prefix_of_nested_paths() {
    let paths = [path!["a", "b"], path!["a", "b", "c"]];
    assert_eq!(find_common_prefix(&paths), path!["a", "b"]);
}

#[test]
fn common_prefix_diverging_at_first_key() {
    let paths = [path!["fields", "a"], path!["sys", "version"]];
    assert_eq!(find_common_prefix(&paths), Path::root());
}

#[test]
fn pointer_parsing_distinguishes_root_from_empty_key() {
    assert_eq!("".parse::<Path>().unwrap(), Path::root());
    assert_eq!("/".parse::<Path>().unwrap(), path![""]);
    assert_eq!(path![""].to_string(), "/");
    assert_eq!(
        "/fields/title/en".parse::<Path>().unwrap(),
        path!["fields", "title", "en"]
    );
}
