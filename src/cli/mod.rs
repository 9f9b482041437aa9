pub mod client;
pub mod utils;

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::model::DeleteBoardsAndBlocks;
use client::ApiClient;
use utils::{count_items, output_success, read_json_input, write_json_output};

#[derive(Parser)]
#[command(name = "boardsctl")]
#[command(about = "Boards CLI - export, import and composite edits against a Boards API server")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, env = "BOARDS_SERVER", default_value = "http://localhost:3000", help = "Server base URL")]
    pub server: String,

    #[arg(long, global = true, env = "BOARDS_TOKEN", help = "Bearer token (JWT or single-user token)")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check server health")]
    Health,

    #[command(about = "Export the blocks of a board, or of one tree on it")]
    Export {
        #[arg(help = "Board ID")]
        board_id: String,
        #[arg(long, help = "Export only the tree under this block")]
        root_id: Option<String>,
        #[arg(long, short, help = "Output file path (stdout when omitted)")]
        output: Option<String>,
    },

    #[command(about = "Fetch a block and its descendants")]
    Subtree {
        #[arg(help = "Board ID")]
        board_id: String,
        #[arg(help = "Block ID")]
        block_id: String,
        #[arg(long, short, help = "Depth, 2 or 3")]
        levels: Option<u8>,
    },

    #[command(about = "Import previously exported blocks onto a board")]
    Import {
        #[arg(help = "Board ID")]
        board_id: String,
        #[arg(help = "Input file path, - for stdin")]
        input: String,
    },

    #[command(about = "Create boards and blocks from a JSON document")]
    Create {
        #[arg(help = "Input file path, - for stdin")]
        input: String,
    },

    #[command(about = "Delete boards and blocks as one unit")]
    Delete {
        #[arg(long = "board", required = true, help = "Board ID (repeatable)")]
        boards: Vec<String>,
        #[arg(long = "block", help = "Block ID (repeatable)")]
        blocks: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let client = ApiClient::new(&cli.server, cli.token.clone())?;

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            output_success(&output_format, "Server is healthy", Some(health))
        }
        Commands::Export { board_id, root_id, output } => {
            let mut query = Vec::new();
            if let Some(root_id) = root_id.as_deref() {
                query.push(("root_id", root_id));
            }
            let blocks = client
                .get(&format!("/api/v1/boards/{}/blocks/export", board_id), &query)
                .await?;
            write_json_output(output.as_deref(), &blocks)?;
            if output.is_some() {
                output_success(
                    &output_format,
                    &format!("Exported {} blocks from board {}", count_items(&blocks), board_id),
                    None,
                )?;
            }
            Ok(())
        }
        Commands::Subtree { board_id, block_id, levels } => {
            let levels = levels.map(|l| l.to_string());
            let mut query = Vec::new();
            if let Some(levels) = levels.as_deref() {
                query.push(("l", levels));
            }
            let blocks = client
                .get(&format!("/api/v1/boards/{}/blocks/{}/subtree", board_id, block_id), &query)
                .await?;
            write_json_output(None, &blocks)
        }
        Commands::Import { board_id, input } => {
            let blocks = read_json_input(&input)?;
            client
                .send_json(Method::POST, &format!("/api/v1/boards/{}/blocks/import", board_id), &blocks)
                .await?;
            output_success(
                &output_format,
                &format!("Imported {} blocks into board {}", count_items(&blocks), board_id),
                None,
            )
        }
        Commands::Create { input } => {
            let bundle = read_json_input(&input)?;
            let created = client
                .send_json(Method::POST, "/api/v1/boards-and-blocks", &bundle)
                .await?;
            let message = format!(
                "Created {} boards and {} blocks",
                count_items(&created["boards"]),
                count_items(&created["blocks"])
            );
            output_success(&output_format, &message, Some(created))
        }
        Commands::Delete { boards, blocks } => {
            let delete = DeleteBoardsAndBlocks { boards, blocks };
            client
                .send_json(Method::DELETE, "/api/v1/boards-and-blocks", &delete)
                .await?;
            output_success(
                &output_format,
                &format!("Deleted {} boards and {} blocks", delete.boards.len(), delete.blocks.len()),
                Some(json!(delete)),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delete_command() {
        let cli = Cli::try_parse_from([
            "boardsctl", "--server", "http://example:4000", "delete", "--board", "b1", "--block", "c1", "--block", "c2",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://example:4000");
        match cli.command {
            Commands::Delete { boards, blocks } => {
                assert_eq!(boards, vec!["b1"]);
                assert_eq!(blocks, vec!["c1", "c2"]);
            }
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn test_delete_requires_a_board() {
        assert!(Cli::try_parse_from(["boardsctl", "delete", "--block", "c1"]).is_err());
    }

    #[test]
    fn test_json_flag_selects_output() {
        let cli = Cli::try_parse_from(["boardsctl", "--json", "health"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
    }
}
