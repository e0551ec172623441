//! End-to-end rotation tests
//!
//! These tests drive the rotator the way `rota-send` does:
//! - configuration loaded from a TOML file
//! - ledger reloaded across simulated restarts
//! - content added and removed between cycles
//! - overlapping triggers from several tasks

use anyhow::Result;
use librotacast::config::Config;
use librotacast::ledger::Ledger;
use librotacast::platforms::mock::{MockConfig, MockPlatform};
use librotacast::{CycleOutcome, Rotator, Selector};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn path_str(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Write a config file pointing into `temp_dir` and load it
fn load_config(temp_dir: &TempDir, format_section: &str) -> Result<Config> {
    let content_dir = temp_dir.path().join("content");
    let ledger_path = temp_dir.path().join("state").join("history.json");
    let config_path = temp_dir.path().join("config.toml");

    fs::write(
        &config_path,
        format!(
            r#"
[content]
dir = "{}"

[ledger]
path = "{}"

{}

[schedule]
interval = "30m"
"#,
            path_str(&content_dir),
            path_str(&ledger_path),
            format_section
        ),
    )?;

    let config = Config::load_from_path(&config_path)?;
    config.validate()?;
    Ok(config)
}

fn add_content(config: &Config, name: &str, body: &str) -> Result<()> {
    let dir = config.content_dir()?;
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(name), body)?;
    Ok(())
}

/// Build a rotator the way the daemon does, reloading the ledger from disk
fn start(config: &Config, mock: &MockConfig) -> Result<Rotator> {
    let ledger = Ledger::load(config.ledger_path()?)?;
    let rotator = Rotator::from_config(
        config,
        ledger,
        Box::new(MockPlatform::authenticated(mock.clone())),
    )?;
    Ok(rotator.with_selector(Selector::seeded(11)))
}

#[tokio::test]
async fn test_rotation_survives_restarts() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = load_config(&temp_dir, "[format]\nmax_length = 40\ntags = [\"#rust\"]")?;
    for (name, body) in [("a.md", "alpha"), ("b.md", "bravo"), ("c.md", "charlie")] {
        add_content(&config, name, body)?;
    }
    let mock = MockConfig::default();

    // First process posts one item
    {
        let rotator = start(&config, &mock)?;
        assert!(matches!(
            rotator.run_cycle().await,
            CycleOutcome::Committed { .. }
        ));
    }

    // Second process posts the remaining two, then runs dry
    {
        let rotator = start(&config, &mock)?;
        for _ in 0..2 {
            assert!(matches!(
                rotator.run_cycle().await,
                CycleOutcome::Committed { .. }
            ));
        }
        assert_eq!(rotator.run_cycle().await, CycleOutcome::Skipped);
    }

    // Third process has nothing to do
    let rotator = start(&config, &mock)?;
    assert_eq!(rotator.run_cycle().await, CycleOutcome::Skipped);

    let mut posted = mock.posted();
    posted.sort();
    assert_eq!(
        posted,
        vec!["alpha\n#rust", "bravo\n#rust", "charlie\n#rust"]
    );

    let ledger = Ledger::load(config.ledger_path()?)?;
    assert_eq!(ledger.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_new_content_is_picked_up_and_deleted_content_stays_recorded() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = load_config(&temp_dir, "[format]\nmax_length = 100")?;
    add_content(&config, "first.md", "first")?;
    let mock = MockConfig::default();
    let rotator = start(&config, &mock)?;

    assert!(matches!(
        rotator.run_cycle().await,
        CycleOutcome::Committed { ref item, .. } if item == "first.md"
    ));
    assert_eq!(rotator.run_cycle().await, CycleOutcome::Skipped);

    // Removing a posted file and re-adding it later must not repost it
    fs::remove_file(config.content_dir()?.join("first.md"))?;
    add_content(&config, "second.md", "second")?;
    assert!(matches!(
        rotator.run_cycle().await,
        CycleOutcome::Committed { ref item, .. } if item == "second.md"
    ));

    add_content(&config, "first.md", "first, edited")?;
    assert_eq!(rotator.run_cycle().await, CycleOutcome::Skipped);

    assert_eq!(mock.posted(), vec!["first", "second"]);
    Ok(())
}

#[tokio::test]
async fn test_legacy_history_is_honoured_and_upgraded() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = load_config(&temp_dir, "[format]\nmax_length = 100")?;
    add_content(&config, "a.md", "already posted by the old bot")?;
    add_content(&config, "b.md", "fresh")?;

    let ledger_path = config.ledger_path()?;
    fs::create_dir_all(ledger_path.parent().unwrap())?;
    fs::write(&ledger_path, r#"{"posted_files": ["xfile/a.md"]}"#)?;

    let mock = MockConfig::default();
    let rotator = start(&config, &mock)?;

    assert!(matches!(
        rotator.run_cycle().await,
        CycleOutcome::Committed { ref item, .. } if item == "b.md"
    ));
    assert_eq!(rotator.run_cycle().await, CycleOutcome::Skipped);

    let on_disk: serde_json::Value = serde_json::from_str(&fs::read_to_string(&ledger_path)?)?;
    assert_eq!(on_disk["version"], 1);
    assert_eq!(on_disk["posted_ids"], serde_json::json!(["a.md", "b.md"]));
    Ok(())
}

#[tokio::test]
async fn test_timestamped_posts_respect_the_budget() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = load_config(
        &temp_dir,
        "[format]\nmax_length = 60\ntags = [\"#a\", \"#b\"]\nadd_timestamp = true\ntimezone = \"+08:00\"",
    )?;
    add_content(&config, "long.md", &"word ".repeat(40))?;
    let mock = MockConfig::default();
    let rotator = start(&config, &mock)?;

    rotator.run_cycle().await;

    let posted = mock.posted();
    let text = &posted[0];
    assert!(text.chars().count() <= 60);

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("..."));
    assert!(lines[1].starts_with('[') && lines[1].ends_with(']'));
    assert_eq!(lines[1].chars().count(), 21);
    assert_eq!(lines[2], "#a #b");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_triggers_publish_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = load_config(&temp_dir, "[format]\nmax_length = 100")?;
    for i in 0..5 {
        add_content(&config, &format!("{}.md", i), &format!("item {}", i))?;
    }
    let mock = MockConfig {
        delay: Duration::from_millis(300),
        ..Default::default()
    };
    let rotator = Arc::new(start(&config, &mock)?);

    let first = {
        let rotator = Arc::clone(&rotator);
        tokio::spawn(async move { rotator.run_cycle().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut overlapping = Vec::new();
    for _ in 0..8 {
        let rotator = Arc::clone(&rotator);
        overlapping.push(tokio::spawn(async move { rotator.run_cycle().await }));
    }

    for handle in overlapping {
        assert_eq!(handle.await?, CycleOutcome::Busy);
    }
    assert!(matches!(first.await?, CycleOutcome::Committed { .. }));

    assert_eq!(mock.post_calls(), 1);
    assert_eq!(rotator.posted_ids().await.len(), 1);
    let stats = rotator.stats();
    assert_eq!(stats.busy, 8);
    assert_eq!(stats.committed, 1);
    Ok(())
}
