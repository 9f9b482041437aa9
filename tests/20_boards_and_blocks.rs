mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn create_assigns_server_ids_and_links_references() -> Result<()> {
    let server = common::ensure_server().await?;
    let created = common::create_sample(server, "team-create").await?;

    let board_id = created["boards"][0]["id"].as_str().unwrap_or_default().to_string();
    assert!(board_id.starts_with('b'));
    assert_ne!(board_id, "board-1");

    let blocks = &created["blocks"];
    assert_eq!(blocks.as_array().map(Vec::len), Some(3));
    for block in blocks.as_array().into_iter().flatten() {
        assert_eq!(block["boardId"], board_id.as_str());
        assert!(block["updateAt"].as_i64().unwrap_or_default() > 1);
        assert_eq!(block["modifiedBy"], "");
    }

    let card_id = common::block_id_of_type(blocks, "card").expect("card");
    let text_id = common::block_id_of_type(blocks, "text").expect("text");
    let view = blocks
        .as_array()
        .and_then(|all| all.iter().find(|b| b["type"] == "view"))
        .expect("view");
    assert!(card_id.starts_with('c'));
    assert_eq!(view["parentId"], board_id.as_str());
    assert_eq!(view["fields"]["cardOrder"], json!([card_id.clone()]));

    let text = blocks
        .as_array()
        .and_then(|all| all.iter().find(|b| b["type"] == "text"))
        .expect("text");
    assert_eq!(text["id"], text_id.as_str());
    assert_eq!(text["parentId"], card_id.as_str());
    Ok(())
}

#[tokio::test]
async fn create_rejects_blocks_outside_the_bundle() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = common::api_client()?;

    let bundle = json!({
        "boards": [{ "id": "board-1", "teamId": "team-reject", "type": "O" }],
        "blocks": [{ "id": "card-1", "boardId": "somewhere-else", "parentId": "board-1", "type": "card",
                     "createAt": 1, "updateAt": 1 }]
    });
    let res = client.post(server.url("/api/v1/boards-and-blocks")).json(&bundle).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Nothing from the failed request is visible
    let boards: Value = client
        .get(server.url("/api/v1/teams/team-reject/boards"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(boards, json!([]));
    Ok(())
}

#[tokio::test]
async fn create_requires_boards_and_blocks() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = common::api_client()?;

    let res = client
        .post(server.url("/api/v1/boards-and-blocks"))
        .json(&json!({ "boards": [], "blocks": [] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await?;
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn patch_updates_boards_and_blocks_together() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = common::api_client()?;
    let created = common::create_sample(server, "team-patch").await?;

    let board_id = created["boards"][0]["id"].as_str().unwrap_or_default().to_string();
    let card_id = common::block_id_of_type(&created["blocks"], "card").expect("card");

    let patch = json!({
        "boardIDs": [board_id],
        "boardPatches": [{ "title": "Renamed", "updatedProperties": { "color": "blue" } }],
        "blockIDs": [card_id],
        "blockPatches": [{ "title": "Renamed card", "updatedFields": { "icon": "x" } }]
    });
    let res = client.patch(server.url("/api/v1/boards-and-blocks")).json(&patch).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let patched: Value = res.json().await?;
    assert_eq!(patched["boards"][0]["title"], "Renamed");
    assert_eq!(patched["boards"][0]["properties"]["color"], "blue");
    assert_eq!(patched["blocks"][0]["title"], "Renamed card");
    assert_eq!(patched["blocks"][0]["fields"]["icon"], "x");
    assert_eq!(patched["blocks"][0]["fields"]["contentOrder"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn patch_of_unknown_block_changes_nothing() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = common::api_client()?;
    let created = common::create_sample(server, "team-patch-missing").await?;
    let board_id = created["boards"][0]["id"].as_str().unwrap_or_default().to_string();

    let patch = json!({
        "boardIDs": [board_id],
        "boardPatches": [{ "title": "Should not stick" }],
        "blockIDs": ["missing-block"],
        "blockPatches": [{ "title": "nope" }]
    });
    let res = client.patch(server.url("/api/v1/boards-and-blocks")).json(&patch).send().await?;
    assert!(res.status().is_client_error());

    let board: Value = client
        .get(server.url(&format!("/api/v1/boards/{}", board_id)))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(board["title"], "Roadmap");
    Ok(())
}

#[tokio::test]
async fn delete_removes_boards_and_blocks() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = common::api_client()?;
    let created = common::create_sample(server, "team-delete").await?;

    let board_id = created["boards"][0]["id"].as_str().unwrap_or_default().to_string();
    let card_id = common::block_id_of_type(&created["blocks"], "card").expect("card");

    let res = client
        .delete(server.url("/api/v1/boards-and-blocks"))
        .json(&json!({ "boards": [board_id], "blocks": [card_id] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({}));

    let res = client
        .get(server.url(&format!("/api/v1/boards/{}", board_id)))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_of_unknown_board_is_not_found() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = common::api_client()?
        .delete(server.url("/api/v1/boards-and-blocks"))
        .json(&json!({ "boards": ["no-such-board"], "blocks": [] }))
        .send()
        .await?;
    assert!(res.status().is_client_error());
    Ok(())
}
