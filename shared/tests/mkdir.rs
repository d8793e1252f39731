use shared::{ToolError, mkdir};

#[test]
fn creates_nested_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("a").join("b").join("c");
    mkdir(&target).unwrap();
    assert!(target.is_dir());
}

#[test]
fn existing_directory_is_fine() {
    let tmp = tempfile::tempdir().unwrap();
    mkdir(tmp.path()).unwrap();
    mkdir(tmp.path()).unwrap();
}

#[test]
fn file_in_the_way_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("taken");
    std::fs::write(&file, b"x").unwrap();
    let err = mkdir(&file).unwrap_err();
    assert!(matches!(err, ToolError::FileInTheWay(_)));
    assert!(err.to_string().contains("already exists"));
}
