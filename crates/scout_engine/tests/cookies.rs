use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use rusqlite::{params, Connection};
use scout_engine::{
    harvest_cookies, ChromiumCookieStore, CookieSource, CookieStoreError, FirefoxCookieStore,
};
use tempfile::TempDir;

fn firefox_profile(root: &Path, profile: &str, rows: &[(&str, &str, &str)]) {
    let dir = root.join(profile);
    fs::create_dir_all(&dir).unwrap();
    let conn = Connection::open(dir.join("cookies.sqlite")).unwrap();
    conn.execute_batch(
        "CREATE TABLE moz_cookies (
            id INTEGER PRIMARY KEY, host TEXT, name TEXT, value TEXT, path TEXT,
            isSecure INTEGER, expiry INTEGER
        )",
    )
    .unwrap();
    for (host, name, value) in rows {
        conn.execute(
            "INSERT INTO moz_cookies (host, name, value, path, isSecure, expiry)
             VALUES (?1, ?2, ?3, '/', 1, 1900000000)",
            params![host, name, value],
        )
        .unwrap();
    }
}

fn chromium_db(path: &Path, rows: &[(&str, &str, &str)]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE cookies (
            host_key TEXT, name TEXT, value TEXT, encrypted_value BLOB, path TEXT,
            is_secure INTEGER, expires_utc INTEGER
        )",
    )
    .unwrap();
    for (host, name, value) in rows {
        conn.execute(
            "INSERT INTO cookies (host_key, name, value, encrypted_value, path, is_secure, expires_utc)
             VALUES (?1, ?2, ?3, x'00', '/', 1, 13300000000000000)",
            params![host, name, value],
        )
        .unwrap();
    }
}

#[test]
fn firefox_store_reads_matching_hosts_across_profiles() {
    let root = TempDir::new().unwrap();
    firefox_profile(
        root.path(),
        "abc.default",
        &[
            (".instagram.com", "sessionid", "one"),
            (".other.test", "sid", "nope"),
        ],
    );
    firefox_profile(root.path(), "def.work", &[("www.instagram.com", "csrftoken", "two")]);

    let store = FirefoxCookieStore::with_profile_root(root.path().to_path_buf());
    let cookies = store.load(".instagram.com").unwrap();

    let mut names: Vec<&str> = cookies.iter().map(|c| c.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["csrftoken", "sessionid"]);
    assert!(cookies.iter().all(|c| c.secure && c.expires == 1_900_000_000));
}

#[test]
fn chromium_store_skips_encrypted_only_rows() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("Cookies");
    chromium_db(
        &db,
        &[(".instagram.com", "sessionid", "plain"), (".instagram.com", "ds_user_id", "")],
    );

    let store = ChromiumCookieStore::with_database("Chromium", db);
    let cookies = store.load(".instagram.com").unwrap();

    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies.header_value().as_deref(), Some("sessionid=plain"));
    assert!(cookies.iter().all(|c| c.expires > 0));
}

#[test]
fn lookalike_hosts_are_not_matched() {
    let root = TempDir::new().unwrap();
    firefox_profile(
        root.path(),
        "abc.default",
        &[
            ("instagram.com", "sessionid", "bare"),
            ("evilinstagram.com", "sessionid", "stolen"),
        ],
    );
    let firefox = FirefoxCookieStore::with_profile_root(root.path().to_path_buf());
    let values: Vec<String> = firefox
        .load(".instagram.com")
        .unwrap()
        .iter()
        .map(|c| c.value.clone())
        .collect();
    assert_eq!(values, vec!["bare".to_string()]);

    let db = root.path().join("Cookies");
    chromium_db(
        &db,
        &[(".Instagram.com", "sessionid", "mixed"), (".notinstagram.com", "sid", "stolen")],
    );
    let chromium = ChromiumCookieStore::with_database("Chromium", db);
    let cookies = chromium.load("instagram.com").unwrap();
    assert_eq!(cookies.header_value().as_deref(), Some("sessionid=mixed"));
}

#[test]
fn missing_stores_report_not_found() {
    let temp = TempDir::new().unwrap();
    let store = FirefoxCookieStore::with_profile_root(temp.path().join("absent"));
    assert!(matches!(
        store.load(".instagram.com"),
        Err(CookieStoreError::NotFound)
    ));
}

#[test]
fn harvesting_takes_the_first_non_empty_source() {
    let temp = TempDir::new().unwrap();
    let empty_db = temp.path().join("Empty");
    chromium_db(&empty_db, &[]);
    let ff_root = temp.path().join("firefox");
    firefox_profile(&ff_root, "p", &[(".instagram.com", "sessionid", "from-firefox")]);

    let sources: Vec<Box<dyn CookieSource>> = vec![
        Box::new(ChromiumCookieStore::with_database(
            "Missing",
            temp.path().join("nothing-here"),
        )),
        Box::new(ChromiumCookieStore::with_database("Empty", empty_db)),
        Box::new(FirefoxCookieStore::with_profile_root(ff_root)),
    ];
    let cookies = harvest_cookies(&sources, ".instagram.com");

    assert_eq!(cookies.header_value().as_deref(), Some("sessionid=from-firefox"));
}

#[test]
fn jar_file_is_removed_on_drop() {
    let root = TempDir::new().unwrap();
    firefox_profile(root.path(), "p", &[(".instagram.com", "sessionid", "v")]);
    let cookies = FirefoxCookieStore::with_profile_root(root.path().to_path_buf())
        .load(".instagram.com")
        .unwrap();

    let jar = cookies.write_cookie_jar().unwrap();
    let path = jar.path().to_path_buf();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# Netscape HTTP Cookie File\n"));
    assert!(text.contains(".instagram.com\tTRUE\t/\tTRUE\t1900000000\tsessionid\tv"));

    drop(jar);
    assert!(!path.exists());
}
