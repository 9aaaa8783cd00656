use pretty_assertions::assert_eq;
use std::path::Path;

/// Assert `dir` holds exactly `chunk_0001.wav..` with the given contents.
pub fn assert_chunk_files(dir: &Path, expected: &[&[u8]]) {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("output directory should exist")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let expected_names: Vec<String> = (1..=expected.len())
        .map(|i| format!("chunk_{:04}.wav", i))
        .collect();
    assert_eq!(names, expected_names);

    for (name, bytes) in expected_names.iter().zip(expected) {
        let actual = std::fs::read(dir.join(name)).unwrap();
        assert_eq!(&actual[..], *bytes, "contents of {name}");
    }
}

pub fn assert_dir_empty(dir: &Path) {
    let count = std::fs::read_dir(dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(count, 0, "expected {} to be empty", dir.display());
}
