//! Integration tests for the local object store.

use rill_store::{LocalStore, Store};
use std::fs;

#[test]
fn directories_are_copied_recursively() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("pkg");
    fs::create_dir_all(src.join("nested")).unwrap();
    fs::write(src.join("top.txt"), b"top").unwrap();
    fs::write(src.join("nested/inner.txt"), b"inner").unwrap();

    let store = LocalStore::new(dir.path().join("store"));
    let dest = store.add_to_store(&src).unwrap();

    assert!(dest.is_dir());
    assert_eq!(fs::read(dest.join("top.txt")).unwrap(), b"top");
    assert_eq!(fs::read(dest.join("nested/inner.txt")).unwrap(), b"inner");
}

#[test]
fn store_paths_depend_on_name_and_content() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"same").unwrap();
    fs::write(dir.path().join("b.txt"), b"same").unwrap();
    fs::write(dir.path().join("c.txt"), b"different").unwrap();

    let store = LocalStore::new(dir.path().join("store"));
    let (a, hash_a) = store.compute_store_path(&dir.path().join("a.txt")).unwrap();
    let (b, hash_b) = store.compute_store_path(&dir.path().join("b.txt")).unwrap();
    let (c, hash_c) = store.compute_store_path(&dir.path().join("c.txt")).unwrap();

    // Same content: same hash, but the name keeps the paths apart.
    assert_eq!(hash_a, hash_b);
    assert_ne!(a, b);
    assert_ne!(hash_a, hash_c);
    assert_ne!(a, c);
}

#[test]
fn identical_sources_land_on_the_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("one");
    let second = dir.path().join("two");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    fs::write(first.join("data.txt"), b"payload").unwrap();
    fs::write(second.join("data.txt"), b"payload").unwrap();

    let store = LocalStore::new(dir.path().join("store"));
    let a = store.add_to_store(&first.join("data.txt")).unwrap();
    let b = store.add_to_store(&second.join("data.txt")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn directory_hash_ignores_readdir_order_but_not_names() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("one");
    let second = dir.path().join("two");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    fs::write(first.join("x"), b"1").unwrap();
    fs::write(first.join("y"), b"2").unwrap();
    // Same contents under different entry names.
    fs::write(second.join("x"), b"1").unwrap();
    fs::write(second.join("z"), b"2").unwrap();

    let store = LocalStore::new(dir.path().join("store"));
    let (_, hash_one) = store.compute_store_path(&first).unwrap();
    let (_, hash_two) = store.compute_store_path(&second).unwrap();
    assert_ne!(hash_one, hash_two);
}

#[test]
fn store_copies_are_read_only() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("data.txt"), b"payload").unwrap();

    let store = LocalStore::new(dir.path().join("store"));
    let dest = store.add_to_store(&dir.path().join("data.txt")).unwrap();
    assert!(fs::metadata(&dest).unwrap().permissions().readonly());
}
