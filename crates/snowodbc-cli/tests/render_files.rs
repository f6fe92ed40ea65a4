use std::fs;

use anyhow::Result;
use snowodbc::ConnectionConfig;
use snowodbc_cli::render::{parse_blueprint, parse_query, Renderer};

fn renderer() -> Renderer {
    let config = ConnectionConfig {
        prefix: "app_".into(),
        ..ConnectionConfig::default()
    };
    Renderer::from_config(&config)
}

#[test]
fn renders_an_update_description_from_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("update.json");
    fs::write(
        &path,
        r#"{
            "operation": "update",
            "query": {
                "from": "users",
                "wheres": [{"type": "basic", "column": "id", "operator": "=", "value": 3}]
            },
            "values": {"name": "Zoë", "active": false}
        }"#,
    )?;

    let request = parse_query(&fs::read_to_string(&path)?)?;
    let lines = renderer().render_query(&request, true)?;
    assert_eq!(
        lines,
        vec!["update APP_USERS set ACTIVE = FALSE, NAME = 'Zoë' where ID = 3;"]
    );
    Ok(())
}

#[test]
fn renders_an_alter_blueprint_from_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("alter.json");
    fs::write(
        &path,
        r#"{
            "table": "logs",
            "commands": [{"name": "drop_column", "columns": ["legacy", "notes"]}, {"name": "drop_if_exists"}]
        }"#,
    )?;

    let blueprint = parse_blueprint(&fs::read_to_string(&path)?)?;
    let lines = renderer().render_schema(&blueprint)?;
    assert_eq!(
        lines,
        vec![
            "alter table APP_LOGS drop column LEGACY, drop column NOTES;",
            "drop table if exists APP_LOGS;",
        ]
    );
    Ok(())
}

#[test]
fn bindings_comment_follows_the_terminator() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("delete.json");
    fs::write(
        &path,
        r#"{
            "operation": "delete",
            "query": {
                "from": "users",
                "wheres": [{"type": "basic", "column": "id", "operator": "=", "value": 9}]
            }
        }"#,
    )?;

    let request = parse_query(&fs::read_to_string(&path)?)?;
    let lines = renderer().render_query(&request, false)?;
    assert_eq!(lines, vec!["delete from APP_USERS where ID = ?; -- bindings: [9]"]);
    Ok(())
}

#[test]
fn unknown_operations_are_rejected() {
    assert!(parse_query(r#"{"operation": "explode", "query": {}}"#).is_err());
    assert!(parse_blueprint("not json").is_err());
}
