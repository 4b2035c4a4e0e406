//! Whitelist Integration Tests
//!
//! Persists the whitelist to disk and gates page activation with it.

use std::sync::Arc;

use smartsight::adapters::ScriptedModel;
use smartsight::config::Tuning;
use smartsight::core::gate::{HomescreenRule, WhitelistError};
use smartsight::core::{Activation, Companion, Rejection, WhitelistStore};
use smartsight::page::StaticDocument;
use tempfile::TempDir;

fn document() -> Arc<StaticDocument> {
    Arc::new(StaticDocument::from_paragraphs(vec![
        "The council approved the annual budget on Tuesday evening.",
        "Residents voiced concerns about rising rents in the city centre.",
    ]))
}

fn activate(
    url: &str,
    store: &WhitelistStore,
    activation: Activation,
) -> Result<Companion, Rejection> {
    Companion::activate(
        document(),
        url,
        store.domains(),
        activation,
        Arc::new(ScriptedModel::new()),
        Tuning::default(),
    )
}

#[test]
fn test_added_site_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("whitelist.json");

    let mut store = WhitelistStore::open(&path).unwrap();
    assert!(store.domains().is_empty());
    assert_eq!(
        store.add_site("https://News.Example.com/2024/05/budget").unwrap(),
        "news.example.com"
    );
    store.save().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("aiWhitelistedDomains"));

    let store = WhitelistStore::open(&path).unwrap();
    assert_eq!(store.domains(), &["news.example.com".to_string()]);
    assert!(store.contains_host("news.example.com"));
}

#[test]
fn test_edits_report_errors() {
    let dir = TempDir::new().unwrap();
    let mut store = WhitelistStore::open(dir.path().join("whitelist.json")).unwrap();

    store.add("example.com").unwrap();
    assert_eq!(
        store.add(" Example.COM "),
        Err(WhitelistError::Duplicate("example.com".to_string()))
    );
    assert_eq!(store.add("   "), Err(WhitelistError::Empty));
    assert!(matches!(store.add_site("not a url"), Err(WhitelistError::NoHost(_))));
    assert_eq!(
        store.remove("other.org"),
        Err(WhitelistError::Missing("other.org".to_string()))
    );
    store.remove("EXAMPLE.com").unwrap();
    assert!(store.domains().is_empty());
}

#[test]
fn test_activation_follows_store() {
    let dir = TempDir::new().unwrap();
    let mut store = WhitelistStore::open(dir.path().join("whitelist.json")).unwrap();
    let article = "https://www.example.com/2024/05/council-approves-budget";

    assert!(matches!(
        activate(article, &store, Activation::Normal),
        Err(Rejection::NotWhitelisted(host)) if host == "www.example.com"
    ));

    store.add("example.com").unwrap();
    let companion = activate(article, &store, Activation::Normal).unwrap();
    assert_eq!(companion.article().host, "www.example.com");
    assert_eq!(companion.article().len(), 2);

    assert!(matches!(
        activate("https://www.example.com/latest", &store, Activation::Normal),
        Err(Rejection::Homescreen(HomescreenRule::Feed))
    ));
    assert!(activate("https://www.example.com/latest", &store, Activation::Forced).is_ok());
}
